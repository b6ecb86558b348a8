// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use clutch_app::{
    ListDiff, SessionInfo, SessionStats, StatusSummary, Torrent, TorrentId, TorrentStore,
    TrackerSummary, Transition,
};

/// Receives every change the client wants displayed.
pub trait ViewSink {
    /// `torrents` reflects the state the diff was computed from.
    fn on_list_changed(&mut self, diff: &ListDiff, torrents: &TorrentStore);
    fn on_selection_changed(&mut self, selected: &[TorrentId]);
    fn on_status_summary(&mut self, summary: &StatusSummary);

    fn on_trackers_changed(&mut self, _trackers: &[TrackerSummary]) {}
    fn on_transition(&mut self, _torrent: &Torrent, _transition: Transition) {}
    fn on_session_info(&mut self, _info: &SessionInfo) {}
    fn on_session_stats(&mut self, _stats: &SessionStats) {}
}
