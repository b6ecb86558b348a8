// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::TorrentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickModifiers {
    pub shift: bool,
    /// Ctrl on most platforms, Cmd on macOS.
    pub toggle: bool,
}

/// Id-based selection. Every operation takes the currently displayed order;
/// ids missing from it are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionModel {
    selected: BTreeSet<TorrentId>,
    last_clicked: Option<TorrentId>,
    shift_anchor: Option<TorrentId>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_selected(&self, id: TorrentId) -> bool {
        self.selected.contains(&id)
    }

    pub fn selected_ids(&self) -> Vec<TorrentId> {
        self.selected.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn last_clicked(&self) -> Option<TorrentId> {
        self.last_clicked
    }

    pub fn shift_anchor(&self) -> Option<TorrentId> {
        self.shift_anchor
    }

    pub fn select(&mut self, id: TorrentId, order: &[TorrentId]) -> bool {
        order.contains(&id) && self.selected.insert(id)
    }

    pub fn deselect(&mut self, id: TorrentId) -> bool {
        self.selected.remove(&id)
    }

    /// Selects only `id` and makes it the anchor for range selection.
    pub fn set_selected(&mut self, id: TorrentId, order: &[TorrentId]) -> bool {
        if !order.contains(&id) {
            return false;
        }
        self.last_clicked = Some(id);
        self.replace(BTreeSet::from([id]))
    }

    pub fn select_all(&mut self, order: &[TorrentId]) -> bool {
        self.replace(order.iter().copied().collect())
    }

    pub fn deselect_all(&mut self) -> bool {
        self.last_clicked = None;
        self.replace(BTreeSet::new())
    }

    /// Replaces the selection with every row between the last clicked row and
    /// `target`, inclusive. The last clicked row stays the anchor.
    pub fn select_range(&mut self, target: TorrentId, order: &[TorrentId]) -> bool {
        let Some(target_index) = index_of(order, target) else {
            return false;
        };
        let Some(anchor_index) = self.last_clicked.and_then(|id| index_of(order, id)) else {
            return self.set_selected(target, order);
        };
        let (low, high) = if target_index < anchor_index {
            (target_index, anchor_index)
        } else {
            (anchor_index, target_index)
        };
        self.replace(order[low..=high].iter().copied().collect())
    }

    /// Mouse click on a row. Range clicks keep the previous anchor; every
    /// other click makes `id` the new one.
    pub fn click(&mut self, id: TorrentId, modifiers: ClickModifiers, order: &[TorrentId]) -> bool {
        if !order.contains(&id) {
            return false;
        }
        if modifiers.shift {
            return self.select_range(id, order);
        }
        let changed = match (modifiers.toggle, self.is_selected(id)) {
            (true, false) => self.select(id, order),
            (true, true) => self.deselect(id),
            (false, _) => self.set_selected(id, order),
        };
        self.last_clicked = Some(id);
        changed
    }

    pub fn shift_pressed(&mut self) {
        if self.shift_anchor.is_none() {
            self.shift_anchor = self.last_clicked;
        }
    }

    pub fn shift_released(&mut self) {
        self.shift_anchor = None;
    }

    /// Moves the cursor one row and returns the row it lands on. While a
    /// shift anchor is set, moving away from it selects the row reached and
    /// moving back toward it deselects the row left behind.
    pub fn extend_by_keyboard(
        &mut self,
        direction: CursorDirection,
        shift_held: bool,
        order: &[TorrentId],
    ) -> Option<TorrentId> {
        let max = order.len().checked_sub(1)?;
        let last = self.last_clicked.and_then(|id| index_of(order, id));
        let next = match (last, direction) {
            (Some(last), CursorDirection::Down) => (last + 1).min(max),
            (Some(last), CursorDirection::Up) => last.saturating_sub(1),
            (None, CursorDirection::Down) => 0,
            (None, CursorDirection::Up) => max,
        };
        let target = order[next];
        let anchor = self.shift_anchor.and_then(|id| index_of(order, id));

        match (anchor, last) {
            (Some(anchor), Some(last)) => {
                let away_down = anchor <= last && last < next;
                let away_up = anchor >= last && last > next;
                let back_down = anchor >= last && next > last;
                let back_up = anchor <= last && last > next;
                if away_down || away_up {
                    self.selected.insert(target);
                } else if back_down || back_up {
                    self.selected.remove(&order[last]);
                }
            }
            _ if shift_held => {
                self.select_range(target, order);
            }
            _ => {
                self.set_selected(target, order);
            }
        }

        self.last_clicked = Some(target);
        Some(target)
    }

    /// Drops selected ids that are no longer displayed.
    pub fn reconcile(&mut self, order: &[TorrentId]) -> bool {
        let visible: BTreeSet<TorrentId> = order.iter().copied().collect();
        let before = self.selected.len();
        self.selected.retain(|id| visible.contains(id));
        before != self.selected.len()
    }

    fn replace(&mut self, next: BTreeSet<TorrentId>) -> bool {
        if self.selected == next {
            return false;
        }
        self.selected = next;
        true
    }
}

fn index_of(order: &[TorrentId], id: TorrentId) -> Option<usize> {
    order.iter().position(|candidate| *candidate == id)
}
