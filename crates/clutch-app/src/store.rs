// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeMap, BTreeSet};

use crate::{Torrent, TorrentId, TorrentStatus, TorrentUpdate, is_metadata_complete};

/// Status change worth surfacing to the user, derived from one upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    DownloadComplete,
    SeedingComplete,
    StatusChanged {
        from: TorrentStatus,
        to: TorrentStatus,
    },
}

impl Transition {
    fn between(from: Option<TorrentStatus>, to: Option<TorrentStatus>, finished: bool) -> Self {
        let (Some(from), Some(to)) = (from, to) else {
            return Self::Unchanged;
        };
        if from == to {
            return Self::Unchanged;
        }
        match (from, to) {
            (TorrentStatus::Download, TorrentStatus::Seed | TorrentStatus::SeedWait) => {
                Self::DownloadComplete
            }
            (TorrentStatus::Seed, TorrentStatus::Stopped) if finished => Self::SeedingComplete,
            _ => Self::StatusChanged { from, to },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub created: bool,
    pub changed: bool,
    /// The torrent was missing required fields before and has them now.
    pub became_complete: bool,
    pub transition: Transition,
}

impl UpsertOutcome {
    pub fn needs_full_fetch(&self, torrent: &Torrent) -> bool {
        (self.created && !is_metadata_complete(torrent)) || self.became_complete
    }
}

/// Authoritative torrent records keyed by id, plus the ids touched since the
/// last reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct TorrentStore {
    torrents: BTreeMap<TorrentId, Torrent>,
    dirty: BTreeSet<TorrentId>,
}

impl TorrentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, update: TorrentUpdate) -> UpsertOutcome {
        let id = update.id;
        match self.torrents.get_mut(&id) {
            Some(torrent) => {
                let was_complete = is_metadata_complete(torrent);
                let previous_status = torrent.status();
                let changed = torrent.apply(update.fields);
                if changed {
                    self.dirty.insert(id);
                }
                UpsertOutcome {
                    created: false,
                    changed,
                    became_complete: !was_complete && is_metadata_complete(torrent),
                    transition: Transition::between(
                        previous_status,
                        torrent.status(),
                        torrent.is_finished(),
                    ),
                }
            }
            None => {
                let mut torrent = Torrent::new(id);
                torrent.apply(update.fields);
                self.torrents.insert(id, torrent);
                self.dirty.insert(id);
                UpsertOutcome {
                    created: true,
                    changed: true,
                    became_complete: false,
                    transition: Transition::Unchanged,
                }
            }
        }
    }

    /// Deletes the given torrents. Unknown ids are ignored. Returns how many
    /// records were actually removed.
    pub fn remove(&mut self, ids: &[TorrentId]) -> usize {
        let mut removed = 0;
        for id in ids {
            if self.torrents.remove(id).is_some() {
                self.dirty.insert(*id);
                removed += 1;
            }
        }
        removed
    }

    pub fn get(&self, id: TorrentId) -> Option<&Torrent> {
        self.torrents.get(&id)
    }

    pub fn contains(&self, id: TorrentId) -> bool {
        self.torrents.contains_key(&id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Torrent> {
        self.torrents.values()
    }

    pub fn ids(&self) -> Vec<TorrentId> {
        self.torrents.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.torrents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.torrents.is_empty()
    }

    pub fn dirty(&self) -> &BTreeSet<TorrentId> {
        &self.dirty
    }

    pub fn is_dirty(&self, id: TorrentId) -> bool {
        self.dirty.contains(&id)
    }

    pub fn mark_all_dirty(&mut self) {
        self.dirty.extend(self.torrents.keys().copied());
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{TorrentStore, Transition};
    use crate::{TorrentFields, TorrentId, TorrentStatus, TorrentUpdate};

    fn update(id: i64, fields: TorrentFields) -> TorrentUpdate {
        TorrentUpdate {
            id: TorrentId::new(id),
            fields,
        }
    }

    fn status(status: TorrentStatus) -> TorrentFields {
        TorrentFields {
            status: Some(status),
            ..TorrentFields::default()
        }
    }

    #[test]
    fn upsert_creates_and_marks_dirty() {
        let mut store = TorrentStore::new();
        let outcome = store.upsert(update(
            1,
            TorrentFields {
                name: Some("Ubuntu".to_owned()),
                ..TorrentFields::default()
            },
        ));

        assert!(outcome.created);
        assert_eq!(outcome.transition, Transition::Unchanged);
        assert!(store.is_dirty(TorrentId::new(1)));
        assert_eq!(store.get(TorrentId::new(1)).map(|t| t.name()), Some("Ubuntu"));
    }

    #[test]
    fn unchanged_upsert_leaves_dirty_set_alone() {
        let mut store = TorrentStore::new();
        store.upsert(update(1, status(TorrentStatus::Seed)));
        store.clear_dirty();

        let outcome = store.upsert(update(1, status(TorrentStatus::Seed)));
        assert!(!outcome.changed);
        assert!(store.dirty().is_empty());
    }

    #[test]
    fn status_transitions_are_reported() {
        let mut store = TorrentStore::new();
        store.upsert(update(1, status(TorrentStatus::Download)));

        let done = store.upsert(update(1, status(TorrentStatus::SeedWait)));
        assert_eq!(done.transition, Transition::DownloadComplete);

        store.upsert(update(1, status(TorrentStatus::Seed)));
        let stopped = store.upsert(update(
            1,
            TorrentFields {
                status: Some(TorrentStatus::Stopped),
                is_finished: Some(true),
                ..TorrentFields::default()
            },
        ));
        assert_eq!(stopped.transition, Transition::SeedingComplete);

        let resumed = store.upsert(update(1, status(TorrentStatus::DownloadWait)));
        assert_eq!(
            resumed.transition,
            Transition::StatusChanged {
                from: TorrentStatus::Stopped,
                to: TorrentStatus::DownloadWait,
            }
        );
    }

    #[test]
    fn became_complete_fires_once_required_fields_arrive() {
        let mut store = TorrentStore::new();
        let created = store.upsert(update(1, status(TorrentStatus::Download)));
        let torrent = store.get(TorrentId::new(1)).cloned();
        assert!(torrent.is_some_and(|torrent| created.needs_full_fetch(&torrent)));

        let named = store.upsert(update(
            1,
            TorrentFields {
                name: Some("Magnet".to_owned()),
                ..TorrentFields::default()
            },
        ));
        assert!(named.became_complete);

        let again = store.upsert(update(
            1,
            TorrentFields {
                name: Some("Magnet v2".to_owned()),
                ..TorrentFields::default()
            },
        ));
        assert!(!again.became_complete);
    }

    #[test]
    fn remove_ignores_unknown_ids() {
        let mut store = TorrentStore::new();
        store.upsert(update(1, status(TorrentStatus::Stopped)));
        store.clear_dirty();

        let removed = store.remove(&[TorrentId::new(1), TorrentId::new(99)]);
        assert_eq!(removed, 1);
        assert!(store.is_empty());
        assert!(store.is_dirty(TorrentId::new(1)));
        assert!(!store.is_dirty(TorrentId::new(99)));
    }

    #[test]
    fn mark_all_dirty_covers_every_known_id() {
        let mut store = TorrentStore::new();
        store.upsert(update(1, status(TorrentStatus::Stopped)));
        store.upsert(update(2, status(TorrentStatus::Seed)));
        store.clear_dirty();

        store.mark_all_dirty();
        assert_eq!(store.dirty().len(), 2);
    }
}
