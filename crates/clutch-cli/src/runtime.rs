// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt::Write as _;
use std::thread;
use std::time::{Duration, Instant};

use clutch_app::{
    ListDiff, Row, SessionInfo, SessionStats, StatusSummary, Torrent, TorrentId, TorrentStore,
    TrackerSummary, Transition,
};
use clutch_client::{Client, RemoteSession, ViewSink};
use tracing::{debug, info, warn};

/// Longest the loop sleeps before checking for remote completions.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Sink for a headless client: reports every change through `tracing` and
/// mirrors the row list so it can be printed on exit.
#[derive(Debug, Default)]
pub struct LogSink {
    rows: Vec<Row>,
    summary: StatusSummary,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// One line per visible torrent, in display order.
    pub fn render(&self, torrents: &TorrentStore) -> String {
        let mut out = String::new();
        for row in &self.rows {
            let Some(torrent) = torrents.get(row.torrent_id) else {
                continue;
            };
            let status = torrent
                .status()
                .map_or("unknown", |status| status.as_str());
            let percent = torrent.percent_done().unwrap_or(0.0) * 100.0;
            let _ = writeln!(
                out,
                "{:>5}  {:<12} {:>5.1}%  {}",
                row.torrent_id,
                status,
                percent,
                torrent.name()
            );
        }
        let _ = writeln!(
            out,
            "{} shown, {} active, {} paused, down {} B/s, up {} B/s",
            self.summary.total_visible,
            self.summary.active_count,
            self.summary.paused_count,
            self.summary.download_speed,
            self.summary.upload_speed
        );
        out
    }
}

impl ViewSink for LogSink {
    fn on_list_changed(&mut self, diff: &ListDiff, _torrents: &TorrentStore) {
        diff.apply_to(&mut self.rows);
        debug!(
            inserted = diff.inserted.len(),
            removed = diff.removed.len(),
            visible = self.rows.len(),
            "list changed"
        );
    }

    fn on_selection_changed(&mut self, selected: &[TorrentId]) {
        debug!(count = selected.len(), "selection changed");
    }

    fn on_status_summary(&mut self, summary: &StatusSummary) {
        if *summary != self.summary {
            debug!(?summary, "status summary");
        }
        self.summary = *summary;
    }

    fn on_trackers_changed(&mut self, trackers: &[TrackerSummary]) {
        let names: Vec<&str> = trackers.iter().map(|tracker| tracker.name.as_str()).collect();
        info!(trackers = %names.join(", "), "trackers changed");
    }

    fn on_transition(&mut self, torrent: &Torrent, transition: Transition) {
        match transition {
            Transition::DownloadComplete => {
                info!(id = %torrent.id(), name = torrent.name(), "download complete");
            }
            Transition::SeedingComplete => {
                info!(id = %torrent.id(), name = torrent.name(), "seeding complete");
            }
            Transition::StatusChanged { from, to } => {
                debug!(
                    id = %torrent.id(),
                    from = from.as_str(),
                    to = to.as_str(),
                    "status changed"
                );
            }
            Transition::Unchanged => {}
        }
    }

    fn on_session_info(&mut self, info: &SessionInfo) {
        let version = info
            .get("version")
            .and_then(|value| value.as_str())
            .unwrap_or("unknown");
        debug!(version, "session info");
    }

    fn on_session_stats(&mut self, stats: &SessionStats) {
        debug!(
            uploaded = stats.current.uploaded_bytes,
            downloaded = stats.current.downloaded_bytes,
            "session stats"
        );
    }
}

/// Drives `client` until `run_for` elapses, or forever without a limit.
/// `on_tick` sees the session and the time since the previous tick.
pub fn run_client<R, F>(
    client: &mut Client<R, LogSink>,
    run_for: Option<Duration>,
    mut on_tick: F,
) where
    R: RemoteSession,
    F: FnMut(&mut R, Duration),
{
    let started = Instant::now();
    let mut last = started;
    client.start(started);

    loop {
        let now = Instant::now();
        on_tick(client.session_mut(), now.duration_since(last));
        last = now;

        for report in client.pump(now) {
            match report.result {
                Ok(()) => info!(
                    request_id = report.request_id,
                    method = report.command.method(),
                    count = report.ids.len(),
                    "command done"
                ),
                Err(error) => warn!(request_id = report.request_id, %error, "command failed"),
            }
        }

        let elapsed = now.duration_since(started);
        let remaining = match run_for {
            Some(limit) if elapsed >= limit => break,
            Some(limit) => limit - elapsed,
            None => POLL_INTERVAL,
        };
        let until_due = client
            .next_deadline()
            .map_or(POLL_INTERVAL, |deadline| deadline.saturating_duration_since(now));
        thread::sleep(until_due.min(remaining).min(POLL_INTERVAL));
    }

    client.teardown();
}

#[cfg(test)]
mod tests {
    use super::{LogSink, run_client};
    use clutch_app::{TorrentStatus, ViewState};
    use clutch_client::{Client, ClientOptions};
    use clutch_testkit::{MemorySession, fixture_torrent};
    use std::time::Duration;

    #[test]
    fn run_client_loads_and_renders_the_list() {
        let session = MemorySession::with_torrents([
            fixture_torrent(1, "Alpha", TorrentStatus::Seed),
            fixture_torrent(2, "Bravo", TorrentStatus::Stopped),
        ]);
        let mut client = Client::new(
            session,
            LogSink::new(),
            ClientOptions::default(),
            ViewState::default(),
        );

        let mut ticks = 0;
        run_client(&mut client, Some(Duration::from_millis(800)), |_, _| ticks += 1);

        assert!(ticks > 1);
        assert_eq!(client.sink().rows().len(), 2);
        assert_eq!(client.next_deadline(), None);

        let rendered = client.sink().render(client.store());
        assert!(rendered.contains("Alpha"));
        assert!(rendered.contains("stopped"));
        assert!(rendered.contains("2 shown"));
    }
}
