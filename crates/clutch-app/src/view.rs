// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::{
    FilterCriteria, RowKey, SelectionModel, SortDirection, SortMethod, SortSpec, Torrent,
    TorrentId, TorrentStore, TrackerIndex, TrackerSummary,
};

/// A materialized, visible torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Row {
    pub torrent_id: TorrentId,
    pub key: RowKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowInsertion {
    pub row: Row,
    /// Insert before this torrent's row; `None` appends.
    pub before: Option<TorrentId>,
}

/// Edits that turn the previously displayed list into the current one.
/// Consumers apply `removed` first, then `inserted` in order; inserting a row
/// that is already present moves it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDiff {
    pub inserted: Vec<RowInsertion>,
    pub removed: Vec<Row>,
}

impl ListDiff {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty()
    }

    pub fn apply_to(&self, rows: &mut Vec<Row>) {
        let removed: HashSet<RowKey> = self.removed.iter().map(|row| row.key).collect();
        rows.retain(|row| !removed.contains(&row.key));

        for insertion in &self.inserted {
            if let Some(index) = rows
                .iter()
                .position(|row| row.torrent_id == insertion.row.torrent_id)
            {
                rows.remove(index);
            }
            let anchor = insertion
                .before
                .and_then(|before| rows.iter().position(|row| row.torrent_id == before));
            match anchor {
                Some(index) => rows.insert(index, insertion.row),
                None => rows.push(insertion.row),
            }
        }
    }
}

/// Counts that drive toolbar state and the status bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub total_visible: usize,
    pub active_count: usize,
    pub paused_count: usize,
    pub selected_count: usize,
    pub active_selected_count: usize,
    pub paused_selected_count: usize,
    pub queued_selected_count: usize,
    pub upload_speed: i64,
    pub download_speed: i64,
}

pub fn compare_torrents(left: &Torrent, right: &Torrent, sort: SortSpec) -> Ordering {
    let order = match sort.method {
        SortMethod::Name => by_name(left, right),
        SortMethod::Queue => by_queue(left, right),
        SortMethod::Size => left
            .total_size()
            .cmp(&right.total_size())
            .then_with(|| by_name(left, right)),
        SortMethod::Progress => cmp_optional_f64(left.percent_done(), right.percent_done())
            .then_with(|| by_ratio(left, right)),
        SortMethod::Ratio => by_ratio(left, right),
        SortMethod::State => by_state(left, right),
        SortMethod::Activity => {
            let left_rate = left.upload_speed() + left.download_speed();
            let right_rate = right.upload_speed() + right.download_speed();
            right_rate
                .cmp(&left_rate)
                .then_with(|| by_state(left, right))
        }
        SortMethod::Age => right
            .added_date()
            .cmp(&left.added_date())
            .then_with(|| by_queue(left, right)),
    };

    match sort.direction {
        SortDirection::Ascending => order,
        SortDirection::Descending => order.reverse(),
    }
}

fn by_id(left: &Torrent, right: &Torrent) -> Ordering {
    left.id().cmp(&right.id())
}

fn by_name(left: &Torrent, right: &Torrent) -> Ordering {
    let left_name = left.name().chars().flat_map(char::to_lowercase);
    let right_name = right.name().chars().flat_map(char::to_lowercase);
    left_name
        .cmp(right_name)
        .then_with(|| by_id(left, right))
}

fn by_queue(left: &Torrent, right: &Torrent) -> Ordering {
    left.queue_position()
        .cmp(&right.queue_position())
        .then_with(|| by_id(left, right))
}

fn by_state(left: &Torrent, right: &Torrent) -> Ordering {
    right
        .status()
        .cmp(&left.status())
        .then_with(|| by_queue(left, right))
}

fn by_ratio(left: &Torrent, right: &Torrent) -> Ordering {
    cmp_optional_f64(right.upload_ratio(), left.upload_ratio())
        .then_with(|| by_state(left, right))
}

fn cmp_optional_f64(left: Option<f64>, right: Option<f64>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => left.total_cmp(&right),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Owns the displayed row list and brings it back in line with the store.
#[derive(Debug, Clone, Default)]
pub struct ViewEngine {
    rows: Vec<Row>,
    next_key: u64,
    trackers: TrackerIndex,
}

impl ViewEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn visible_ids(&self) -> Vec<TorrentId> {
        self.rows.iter().map(|row| row.torrent_id).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_for(&self, id: TorrentId) -> Option<Row> {
        self.rows.iter().copied().find(|row| row.torrent_id == id)
    }

    pub fn tracker_summary(&mut self, store: &TorrentStore) -> Vec<TrackerSummary> {
        self.trackers.summarize(store.all())
    }

    pub fn passes(&mut self, torrent: &Torrent, criteria: &FilterCriteria) -> bool {
        if !criteria.mode.admits(torrent) {
            return false;
        }
        if !criteria.text.is_empty()
            && !torrent
                .collated_name()
                .contains(&criteria.text.to_lowercase())
        {
            return false;
        }
        match &criteria.tracker_domain {
            Some(domain) => self.trackers.torrent_has_domain(torrent, domain),
            None => true,
        }
    }

    /// Recomputes the visible rows. Rows whose torrent is not dirty keep their
    /// relative order; dirty torrents are re-tested, sorted, and merged in.
    /// Clears the store's dirty set.
    pub fn refilter(
        &mut self,
        store: &mut TorrentStore,
        criteria: &FilterCriteria,
        sort: SortSpec,
        full_rebuild: bool,
    ) -> ListDiff {
        let mut diff = ListDiff::default();
        let previous = std::mem::take(&mut self.rows);
        let previous = if full_rebuild {
            store.mark_all_dirty();
            diff.removed.extend(previous);
            Vec::new()
        } else {
            previous
        };

        let store_view: &TorrentStore = store;
        let mut clean: Vec<(Row, &Torrent)> = Vec::new();
        let mut dirty: Vec<(Row, &Torrent)> = Vec::new();
        let mut had_row: HashSet<TorrentId> = HashSet::new();
        for row in &previous {
            had_row.insert(row.torrent_id);
            let torrent = store_view.get(row.torrent_id);
            match torrent {
                Some(torrent) if !store_view.is_dirty(row.torrent_id) => {
                    clean.push((*row, torrent));
                }
                Some(torrent) if self.passes(torrent, criteria) => dirty.push((*row, torrent)),
                _ => diff.removed.push(*row),
            }
        }
        let kept: HashSet<RowKey> = dirty.iter().map(|(row, _)| row.key).collect();

        for id in store_view.dirty() {
            if had_row.contains(id) {
                continue;
            }
            let Some(torrent) = store_view.get(*id) else {
                continue;
            };
            if self.passes(torrent, criteria) {
                let row = Row {
                    torrent_id: *id,
                    key: self.allocate_key(),
                };
                dirty.push((row, torrent));
            }
        }

        dirty.sort_by(|(_, left), (_, right)| compare_torrents(left, right, sort));

        let mut merged = Vec::with_capacity(clean.len() + dirty.len());
        let mut new_groups: Vec<(Option<TorrentId>, Vec<Row>)> = Vec::new();
        let (mut ci, mut di) = (0, 0);
        while ci < clean.len() || di < dirty.len() {
            let take_clean = if ci == clean.len() {
                false
            } else if di == dirty.len() {
                true
            } else {
                compare_torrents(clean[ci].1, dirty[di].1, sort) == Ordering::Less
            };

            if take_clean {
                merged.push(clean[ci].0);
                ci += 1;
                continue;
            }

            let row = dirty[di].0;
            di += 1;
            merged.push(row);
            let anchor = clean.get(ci).map(|(clean_row, _)| clean_row.torrent_id);
            match new_groups.last_mut() {
                Some((group_anchor, rows)) if *group_anchor == anchor => rows.push(row),
                _ => new_groups.push((anchor, vec![row])),
            }
        }

        let old_groups = previous_groups(&previous, &clean, &kept);
        for (anchor, rows) in new_groups {
            if old_groups.get(&anchor) == Some(&rows) {
                continue;
            }
            diff.inserted.extend(rows.into_iter().map(|row| RowInsertion {
                row,
                before: anchor,
            }));
        }

        debug!(
            full_rebuild,
            clean = clean.len(),
            dirty = dirty.len(),
            inserted = diff.inserted.len(),
            removed = diff.removed.len(),
            "refilter pass"
        );

        self.rows = merged;
        store.clear_dirty();
        diff
    }

    pub fn status_summary(
        &self,
        store: &TorrentStore,
        selection: &SelectionModel,
    ) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for row in &self.rows {
            let Some(torrent) = store.get(row.torrent_id) else {
                continue;
            };
            let stopped = torrent.is_stopped();
            let selected = selection.is_selected(row.torrent_id);
            summary.total_visible += 1;
            if stopped {
                summary.paused_count += 1;
            } else {
                summary.active_count += 1;
            }
            if selected {
                summary.selected_count += 1;
                if stopped {
                    summary.paused_selected_count += 1;
                } else {
                    summary.active_selected_count += 1;
                }
                if torrent.is_queued() {
                    summary.queued_selected_count += 1;
                }
            }
        }
        for torrent in store.all() {
            summary.upload_speed += torrent.upload_speed();
            summary.download_speed += torrent.download_speed();
        }
        summary
    }

    fn allocate_key(&mut self) -> RowKey {
        self.next_key += 1;
        RowKey::new(self.next_key)
    }
}

/// Surviving dirty rows of the previous list, grouped by the clean row that
/// followed them (`None` for the tail).
fn previous_groups(
    previous: &[Row],
    clean: &[(Row, &Torrent)],
    kept: &HashSet<RowKey>,
) -> HashMap<Option<TorrentId>, Vec<Row>> {
    let clean_keys: HashSet<RowKey> = clean.iter().map(|(row, _)| row.key).collect();
    let mut groups = HashMap::new();
    let mut pending = Vec::new();
    for row in previous {
        if clean_keys.contains(&row.key) {
            if !pending.is_empty() {
                groups.insert(Some(row.torrent_id), std::mem::take(&mut pending));
            }
        } else if kept.contains(&row.key) {
            pending.push(*row);
        }
    }
    if !pending.is_empty() {
        groups.insert(None, pending);
    }
    groups
}
