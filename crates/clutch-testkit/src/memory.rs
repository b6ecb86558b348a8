// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use anyhow::{Result, bail};
use clutch_app::{
    FetchSelector, ListDiff, Row, SessionInfo, SessionStats, StatusSummary, Torrent, TorrentDelta,
    TorrentField, TorrentFields, TorrentId, TorrentStatus, TorrentStore, TorrentUpdate,
    TrackerSummary, Transition,
};
use clutch_client::{Command, CommandReply, QueueMove, RemoteSession, ViewSink};
use serde_json::{Map, json};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub method: &'static str,
    pub ids: Vec<TorrentId>,
}

/// Daemon stand-in that keeps torrents in memory and answers fetches
/// synchronously. Fetches return only the requested fields.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    torrents: BTreeMap<TorrentId, TorrentFields>,
    recently_active: BTreeSet<TorrentId>,
    removed: Vec<TorrentId>,
    fetches: Vec<(FetchSelector, Vec<TorrentField>)>,
    commands: Vec<CommandRecord>,
    failing_fetches: usize,
    fail_commands: bool,
    info: SessionInfo,
    stats: SessionStats,
}

impl MemorySession {
    pub fn new() -> Self {
        let mut info = Map::new();
        info.insert("version".to_owned(), json!("4.0.6 (memory)"));
        info.insert("download-dir".to_owned(), json!("/srv/torrents"));
        info.insert("alt-speed-enabled".to_owned(), json!(false));
        info.insert("speed-limit-up".to_owned(), json!(100));
        info.insert("speed-limit-up-enabled".to_owned(), json!(false));
        info.insert("speed-limit-down".to_owned(), json!(100));
        info.insert("speed-limit-down-enabled".to_owned(), json!(false));
        Self {
            info,
            ..Self::default()
        }
    }

    pub fn with_torrents(torrents: impl IntoIterator<Item = TorrentUpdate>) -> Self {
        let mut session = Self::new();
        for update in torrents {
            session.add(update);
        }
        session
    }

    /// Adds or replaces a torrent and reports it as recently active.
    pub fn add(&mut self, update: TorrentUpdate) {
        self.recently_active.insert(update.id);
        self.torrents.insert(update.id, update.fields);
    }

    /// Edits a torrent in place. Returns false for unknown ids.
    pub fn update(&mut self, id: TorrentId, edit: impl FnOnce(&mut TorrentFields)) -> bool {
        let Some(fields) = self.torrents.get_mut(&id) else {
            return false;
        };
        edit(fields);
        self.recently_active.insert(id);
        true
    }

    /// Drops a torrent; the next recently-active fetch reports it removed.
    pub fn remove(&mut self, id: TorrentId) -> bool {
        if self.torrents.remove(&id).is_none() {
            return false;
        }
        self.recently_active.remove(&id);
        self.removed.push(id);
        true
    }

    pub fn get(&self, id: TorrentId) -> Option<&TorrentFields> {
        self.torrents.get(&id)
    }

    pub fn len(&self) -> usize {
        self.torrents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.torrents.is_empty()
    }

    pub fn fetches(&self) -> &[(FetchSelector, Vec<TorrentField>)] {
        &self.fetches
    }

    pub fn commands(&self) -> &[CommandRecord] {
        &self.commands
    }

    pub fn fail_next_fetches(&mut self, count: usize) {
        self.failing_fetches = count;
    }

    pub fn fail_commands(&mut self, fail: bool) {
        self.fail_commands = fail;
    }

    pub fn set_stats(&mut self, stats: SessionStats) {
        self.stats = stats;
    }

    /// Moves downloads forward by `elapsed` at their current rate. Finished
    /// downloads switch to seeding.
    pub fn advance(&mut self, elapsed: Duration) {
        let seconds = elapsed.as_secs_f64();
        for (id, fields) in &mut self.torrents {
            if fields.status != Some(TorrentStatus::Download) {
                continue;
            }
            let (Some(size), Some(rate)) = (fields.total_size, fields.rate_download) else {
                continue;
            };
            if size <= 0 || rate <= 0 {
                continue;
            }

            let done = fields.percent_done.unwrap_or(0.0) + rate as f64 * seconds / size as f64;
            if done >= 1.0 {
                fields.percent_done = Some(1.0);
                fields.status = Some(TorrentStatus::Seed);
                fields.rate_download = Some(0);
                fields.peers_sending_to_us = Some(0);
            } else {
                fields.percent_done = Some(done);
            }
            self.stats.current.downloaded_bytes += (rate as f64 * seconds) as i64;
            self.recently_active.insert(*id);
        }
        self.stats.current.seconds_active += elapsed.as_secs() as i64;
    }

    fn project(
        &self,
        ids: impl Iterator<Item = TorrentId>,
        wanted: &[TorrentField],
    ) -> Vec<TorrentUpdate> {
        ids.filter_map(|id| {
            self.torrents.get(&id).map(|fields| TorrentUpdate {
                id,
                fields: fields.select(wanted),
            })
        })
        .collect()
    }

    fn known(&self, ids: &[TorrentId]) -> Vec<TorrentId> {
        ids.iter()
            .copied()
            .filter(|id| self.torrents.contains_key(id))
            .collect()
    }

    fn set_running(&mut self, ids: &[TorrentId]) {
        for id in self.known(ids) {
            self.update(id, |fields| {
                let complete = fields.percent_done.unwrap_or(0.0) >= 1.0;
                fields.status = Some(if complete {
                    TorrentStatus::Seed
                } else {
                    TorrentStatus::Download
                });
            });
        }
    }

    fn move_in_queue(&mut self, ids: &[TorrentId], direction: QueueMove) {
        let mut order: Vec<TorrentId> = self.torrents.keys().copied().collect();
        order.sort_by_key(|id| {
            (
                self.torrents
                    .get(id)
                    .and_then(|fields| fields.queue_position)
                    .unwrap_or(i64::MAX),
                *id,
            )
        });
        let moving: BTreeSet<TorrentId> = ids.iter().copied().collect();

        match direction {
            QueueMove::Top | QueueMove::Bottom => {
                let (picked, rest): (Vec<_>, Vec<_>) =
                    order.into_iter().partition(|id| moving.contains(id));
                order = if direction == QueueMove::Top {
                    picked.into_iter().chain(rest).collect()
                } else {
                    rest.into_iter().chain(picked).collect()
                };
            }
            QueueMove::Up => {
                for index in 1..order.len() {
                    if moving.contains(&order[index]) && !moving.contains(&order[index - 1]) {
                        order.swap(index, index - 1);
                    }
                }
            }
            QueueMove::Down => {
                for index in (0..order.len().saturating_sub(1)).rev() {
                    if moving.contains(&order[index]) && !moving.contains(&order[index + 1]) {
                        order.swap(index, index + 1);
                    }
                }
            }
        }

        for (position, id) in order.into_iter().enumerate() {
            let position = position as i64;
            if self.get(id).and_then(|fields| fields.queue_position) != Some(position) {
                self.update(id, |fields| fields.queue_position = Some(position));
            }
        }
    }
}

impl RemoteSession for MemorySession {
    fn fetch_torrents(
        &mut self,
        selector: &FetchSelector,
        fields: &[TorrentField],
    ) -> Result<TorrentDelta> {
        self.fetches.push((selector.clone(), fields.to_vec()));
        if self.failing_fetches > 0 {
            self.failing_fetches -= 1;
            bail!("connection refused");
        }

        let delta = match selector {
            FetchSelector::All => TorrentDelta {
                updates: self.project(self.torrents.keys().copied(), fields),
                removed: Vec::new(),
            },
            FetchSelector::RecentlyActive => {
                let active = std::mem::take(&mut self.recently_active);
                TorrentDelta {
                    updates: self.project(active.into_iter(), fields),
                    removed: std::mem::take(&mut self.removed),
                }
            }
            FetchSelector::Ids(ids) => TorrentDelta {
                updates: self.project(ids.iter().copied(), fields),
                removed: Vec::new(),
            },
        };
        Ok(delta)
    }

    fn fetch_session_info(&mut self) -> Result<SessionInfo> {
        Ok(self.info.clone())
    }

    fn fetch_session_stats(&mut self) -> Result<SessionStats> {
        Ok(self.stats)
    }

    fn send_command(&mut self, command: &Command, ids: &[TorrentId]) -> Result<CommandReply> {
        self.commands.push(CommandRecord {
            method: command.method(),
            ids: ids.to_vec(),
        });
        if self.fail_commands {
            bail!("permission denied");
        }

        let mut reply = Map::new();
        match command {
            Command::Start { .. } => self.set_running(ids),
            Command::Stop => {
                for id in self.known(ids) {
                    self.update(id, |fields| {
                        fields.status = Some(TorrentStatus::Stopped);
                        fields.rate_download = Some(0);
                        fields.rate_upload = Some(0);
                    });
                }
            }
            Command::Remove { .. } => {
                for id in ids {
                    self.remove(*id);
                }
            }
            Command::Verify => {
                for id in self.known(ids) {
                    self.update(id, |fields| fields.status = Some(TorrentStatus::Check));
                }
            }
            Command::Reannounce => {}
            Command::SetLocation { location, .. } => {
                for id in self.known(ids) {
                    self.update(id, |fields| fields.download_dir = Some(location.clone()));
                }
            }
            Command::Rename { path, name } => {
                let [id] = ids else {
                    bail!("rename needs exactly one torrent");
                };
                if !self.update(*id, |fields| fields.name = Some(name.clone())) {
                    bail!("unknown torrent {id}");
                }
                reply.insert("id".to_owned(), json!(id));
                reply.insert("name".to_owned(), json!(name));
                reply.insert("path".to_owned(), json!(path));
            }
            Command::QueueMove(direction) => self.move_in_queue(ids, *direction),
            Command::SetSession(setting) => self.info.extend(setting.arguments()),
        }
        Ok(reply)
    }
}

/// Sink that records every notification and mirrors the row list by
/// applying each diff to its own copy.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub rows: Vec<Row>,
    pub diffs: Vec<ListDiff>,
    pub selections: Vec<Vec<TorrentId>>,
    pub summaries: Vec<StatusSummary>,
    pub trackers: Vec<Vec<TrackerSummary>>,
    pub transitions: Vec<(TorrentId, Transition)>,
    pub session_infos: Vec<SessionInfo>,
    pub session_stats: Vec<SessionStats>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_ids(&self) -> Vec<TorrentId> {
        self.rows.iter().map(|row| row.torrent_id).collect()
    }

    pub fn last_selection(&self) -> Option<&[TorrentId]> {
        self.selections.last().map(Vec::as_slice)
    }

    pub fn last_summary(&self) -> Option<&StatusSummary> {
        self.summaries.last()
    }
}

impl ViewSink for RecordingSink {
    fn on_list_changed(&mut self, diff: &ListDiff, _torrents: &TorrentStore) {
        diff.apply_to(&mut self.rows);
        self.diffs.push(diff.clone());
    }

    fn on_selection_changed(&mut self, selected: &[TorrentId]) {
        self.selections.push(selected.to_vec());
    }

    fn on_status_summary(&mut self, summary: &StatusSummary) {
        self.summaries.push(*summary);
    }

    fn on_trackers_changed(&mut self, trackers: &[TrackerSummary]) {
        self.trackers.push(trackers.to_vec());
    }

    fn on_transition(&mut self, torrent: &Torrent, transition: Transition) {
        self.transitions.push((torrent.id(), transition));
    }

    fn on_session_info(&mut self, info: &SessionInfo) {
        self.session_infos.push(info.clone());
    }

    fn on_session_stats(&mut self, stats: &SessionStats) {
        self.session_stats.push(*stats);
    }
}
