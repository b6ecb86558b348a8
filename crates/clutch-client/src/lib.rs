// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod command;
mod remote;
mod sink;

pub use command::*;
pub use remote::*;
pub use sink::*;

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use clutch_app::{
    ClickModifiers, CursorDirection, FetchSelector, Row, Scheduler, SelectionModel, SessionInfo,
    SessionStats, StatusSummary, TorrentDelta, TorrentField, TorrentId, TorrentStore,
    TorrentUpdate, TrackerSummary, Transition, ViewCommand, ViewEngine, ViewState,
};
use serde_json::Value;
use tracing::{debug, info, warn};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_SESSION_INTERVAL: Duration = Duration::from_secs(8);
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_REFILTER_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_BUTTON_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_SELECTION_DELAY: Duration = Duration::from_millis(200);

/// Work the client defers to its scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    Refilter,
    ButtonRefresh,
    SelectionNotify,
    TorrentRefresh,
    SessionRefresh,
    StatsRefresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub refresh_interval: Duration,
    pub session_interval: Duration,
    pub stats_interval: Duration,
    pub refilter_delay: Duration,
    pub button_delay: Duration,
    pub selection_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            session_interval: DEFAULT_SESSION_INTERVAL,
            stats_interval: DEFAULT_STATS_INTERVAL,
            refilter_delay: DEFAULT_REFILTER_DELAY,
            button_delay: DEFAULT_BUTTON_DELAY,
            selection_delay: DEFAULT_SELECTION_DELAY,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingCommand {
    command: Command,
    ids: Vec<TorrentId>,
}

/// Keeps a torrent list view in agreement with a remote daemon.
///
/// All state lives on the caller's thread. Remote completions queue on an
/// internal channel and are applied by `pump`, which also runs whatever the
/// scheduler says is due.
pub struct Client<R, S> {
    session: R,
    sink: S,
    options: ClientOptions,
    view: ViewState,
    store: TorrentStore,
    engine: ViewEngine,
    selection: SelectionModel,
    scheduler: Scheduler<TimerKey>,
    tx: Sender<RemoteEvent>,
    rx: Receiver<RemoteEvent>,
    next_request_id: u64,
    pending_commands: HashMap<u64, PendingCommand>,
    ready_reports: Vec<CommandReport>,
    initial_request: Option<u64>,
    loaded: bool,
    torrent_refresh: bool,
    trackers: Vec<TrackerSummary>,
    session_info: Option<SessionInfo>,
    session_stats: Option<SessionStats>,
}

impl<R: RemoteSession, S: ViewSink> Client<R, S> {
    pub fn new(session: R, sink: S, options: ClientOptions, view: ViewState) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            session,
            sink,
            options,
            view,
            store: TorrentStore::new(),
            engine: ViewEngine::new(),
            selection: SelectionModel::new(),
            scheduler: Scheduler::new(),
            tx,
            rx,
            next_request_id: 0,
            pending_commands: HashMap::new(),
            ready_reports: Vec::new(),
            initial_request: None,
            loaded: false,
            torrent_refresh: false,
            trackers: Vec::new(),
            session_info: None,
            session_stats: None,
        }
    }

    pub fn store(&self) -> &TorrentStore {
        &self.store
    }

    pub fn rows(&self) -> &[Row] {
        self.engine.rows()
    }

    pub fn visible_ids(&self) -> Vec<TorrentId> {
        self.engine.visible_ids()
    }

    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    pub fn view_state(&self) -> &ViewState {
        &self.view
    }

    pub fn options(&self) -> ClientOptions {
        self.options
    }

    pub fn trackers(&self) -> &[TrackerSummary] {
        &self.trackers
    }

    pub fn session_info(&self) -> Option<&SessionInfo> {
        self.session_info.as_ref()
    }

    pub fn session_stats(&self) -> Option<&SessionStats> {
        self.session_stats.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn session_mut(&mut self) -> &mut R {
        &mut self.session
    }

    pub fn status_summary(&self) -> StatusSummary {
        self.engine.status_summary(&self.store, &self.selection)
    }

    /// Earliest instant at which `pump` has scheduled work to run.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn start(&mut self, now: Instant) {
        info!(
            refresh_ms = self.options.refresh_interval.as_millis() as u64,
            "starting client"
        );
        self.scheduler
            .schedule_periodic(TimerKey::SessionRefresh, self.options.session_interval, now);
        self.set_torrent_refresh(true, now);
        self.scheduler
            .debounce(TimerKey::ButtonRefresh, self.options.button_delay, now);
        self.run_due(now);
    }

    /// Applies completed remote requests, then runs due timers. Returns the
    /// outcome of every command that finished since the previous call.
    pub fn pump(&mut self, now: Instant) -> Vec<CommandReport> {
        let mut reports = std::mem::take(&mut self.ready_reports);
        while let Ok(event) = self.rx.try_recv() {
            if let Some(report) = self.handle_remote_event(event, now) {
                reports.push(report);
            }
        }
        self.run_due(now);
        reports
    }

    pub fn teardown(&mut self) {
        self.scheduler.cancel_all();
        self.torrent_refresh = false;
        info!(
            pending_commands = self.pending_commands.len(),
            "client stopped"
        );
    }

    pub fn set_torrent_refresh(&mut self, enabled: bool, now: Instant) {
        self.torrent_refresh = enabled;
        if enabled {
            self.scheduler.schedule_periodic(
                TimerKey::TorrentRefresh,
                self.options.refresh_interval,
                now,
            );
        } else {
            self.scheduler.cancel_periodic(TimerKey::TorrentRefresh);
        }
    }

    pub fn set_refresh_interval(&mut self, interval: Duration, now: Instant) {
        self.options.refresh_interval = interval;
        if self.scheduler.cancel_periodic(TimerKey::TorrentRefresh) {
            self.scheduler
                .schedule_periodic(TimerKey::TorrentRefresh, interval, now);
        }
    }

    pub fn set_stats_refresh(&mut self, enabled: bool, now: Instant) {
        if enabled {
            self.scheduler
                .schedule_periodic(TimerKey::StatsRefresh, self.options.stats_interval, now);
        } else {
            self.scheduler.cancel_periodic(TimerKey::StatsRefresh);
        }
    }

    /// Changes filter or sort settings; any effective change rebuilds the
    /// list right away.
    pub fn apply(&mut self, command: ViewCommand, now: Instant) -> bool {
        let events = self.view.dispatch(command);
        if events.is_empty() {
            return false;
        }
        for event in &events {
            debug!(?event, "view settings changed");
        }
        self.refilter(true, now);
        true
    }

    pub fn click(&mut self, id: TorrentId, modifiers: ClickModifiers, now: Instant) {
        let order = self.engine.visible_ids();
        if self.selection.click(id, modifiers, &order) {
            self.selection_changed(now);
        }
    }

    pub fn key_down(
        &mut self,
        direction: CursorDirection,
        shift_held: bool,
        now: Instant,
    ) -> Option<TorrentId> {
        let order = self.engine.visible_ids();
        let before = self.selection.selected_ids();
        let cursor = self
            .selection
            .extend_by_keyboard(direction, shift_held, &order);
        if self.selection.selected_ids() != before {
            self.selection_changed(now);
        }
        cursor
    }

    pub fn shift_pressed(&mut self) {
        self.selection.shift_pressed();
    }

    pub fn shift_released(&mut self) {
        self.selection.shift_released();
    }

    pub fn select(&mut self, id: TorrentId, now: Instant) {
        let order = self.engine.visible_ids();
        if self.selection.select(id, &order) {
            self.selection_changed(now);
        }
    }

    pub fn deselect(&mut self, id: TorrentId, now: Instant) {
        if self.selection.deselect(id) {
            self.selection_changed(now);
        }
    }

    pub fn set_selected(&mut self, id: TorrentId, now: Instant) {
        let order = self.engine.visible_ids();
        if self.selection.set_selected(id, &order) {
            self.selection_changed(now);
        }
    }

    pub fn select_range(&mut self, id: TorrentId, now: Instant) {
        let order = self.engine.visible_ids();
        if self.selection.select_range(id, &order) {
            self.selection_changed(now);
        }
    }

    pub fn select_all(&mut self, now: Instant) {
        let order = self.engine.visible_ids();
        if self.selection.select_all(&order) {
            self.selection_changed(now);
        }
    }

    pub fn deselect_all(&mut self, now: Instant) {
        if self.selection.deselect_all() {
            self.selection_changed(now);
        }
    }

    /// Selected torrents in display order.
    pub fn selected_ids(&self) -> Vec<TorrentId> {
        self.engine
            .visible_ids()
            .into_iter()
            .filter(|id| self.selection.is_selected(*id))
            .collect()
    }

    pub fn start_selected(&mut self, force: bool) -> Option<u64> {
        self.send_to_selection(Command::Start { force })
    }

    pub fn stop_selected(&mut self) -> Option<u64> {
        self.send_to_selection(Command::Stop)
    }

    pub fn remove_selected(&mut self, delete_data: bool) -> Option<u64> {
        self.send_to_selection(Command::Remove { delete_data })
    }

    pub fn verify_selected(&mut self) -> Option<u64> {
        self.send_to_selection(Command::Verify)
    }

    pub fn reannounce_selected(&mut self) -> Option<u64> {
        self.send_to_selection(Command::Reannounce)
    }

    pub fn set_location_selected(
        &mut self,
        location: impl Into<String>,
        move_data: bool,
    ) -> Option<u64> {
        self.send_to_selection(Command::SetLocation {
            location: location.into(),
            move_data,
        })
    }

    pub fn queue_move_selected(&mut self, direction: QueueMove) -> Option<u64> {
        self.send_to_selection(Command::QueueMove(direction))
    }

    pub fn start_all(&mut self, force: bool) -> Option<u64> {
        let ids = self.store.ids();
        self.send_command(Command::Start { force }, ids)
    }

    pub fn stop_all(&mut self) -> Option<u64> {
        let ids = self.store.ids();
        self.send_command(Command::Stop, ids)
    }

    pub fn rename(&mut self, id: TorrentId, name: impl Into<String>) -> Option<u64> {
        let path = self.store.get(id)?.name().to_owned();
        let command = Command::Rename {
            path,
            name: name.into(),
        };
        self.send_command(command, vec![id])
    }

    /// Changes a daemon-wide preference. Session info is fetched again once
    /// the daemon accepts it.
    pub fn set_session(&mut self, setting: SessionSetting) -> Option<u64> {
        self.send_command(Command::SetSession(setting), Vec::new())
    }

    /// Flips alternate speed limits, reading the current state from the last
    /// session info. Nothing is sent before session info has arrived.
    pub fn toggle_alt_speed(&mut self) -> Option<u64> {
        let enabled = self
            .session_info
            .as_ref()?
            .get("alt-speed-enabled")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        self.set_session(SessionSetting::AltSpeed(!enabled))
    }

    /// Sends `command` for `ids`. Nothing is sent for a torrent command with
    /// an empty id list.
    pub fn send_command(&mut self, command: Command, ids: Vec<TorrentId>) -> Option<u64> {
        if ids.is_empty() && !command.is_session_wide() {
            debug!(method = command.method(), "no torrents to act on");
            return None;
        }
        let request_id = self.allocate_request_id();
        let method = command.method();
        info!(request_id, method, count = ids.len(), "sending command");
        let dispatched = self.session.spawn_send_command(
            request_id,
            command.clone(),
            ids.clone(),
            self.tx.clone(),
        );
        match dispatched {
            Ok(()) => {
                self.pending_commands
                    .insert(request_id, PendingCommand { command, ids });
            }
            Err(error) => {
                let message = format!("{error:#}");
                warn!(request_id, method, %message, "command not sent");
                self.ready_reports.push(CommandReport {
                    request_id,
                    command,
                    ids,
                    result: Err(CommandError::Dispatch { method, message }),
                });
            }
        }
        Some(request_id)
    }

    fn send_to_selection(&mut self, command: Command) -> Option<u64> {
        let ids = self.selected_ids();
        self.send_command(command, ids)
    }

    fn selection_changed(&mut self, now: Instant) {
        self.scheduler
            .debounce(TimerKey::SelectionNotify, self.options.selection_delay, now);
        self.scheduler
            .debounce(TimerKey::ButtonRefresh, self.options.button_delay, now);
    }

    fn run_due(&mut self, now: Instant) {
        for key in self.scheduler.take_due(now) {
            self.run_task(key, now);
        }
    }

    fn run_task(&mut self, key: TimerKey, now: Instant) {
        match key {
            TimerKey::Refilter => self.refilter(false, now),
            TimerKey::ButtonRefresh => {
                let summary = self.status_summary();
                self.sink.on_status_summary(&summary);
            }
            TimerKey::SelectionNotify => {
                let selected = self.selected_ids();
                self.sink.on_selection_changed(&selected);
                let summary = self.status_summary();
                self.sink.on_status_summary(&summary);
            }
            TimerKey::TorrentRefresh => self.refresh_torrents(),
            TimerKey::SessionRefresh => self.refresh_session(),
            TimerKey::StatsRefresh => {
                let request_id = self.allocate_request_id();
                if let Err(error) = self
                    .session
                    .spawn_fetch_session_stats(request_id, self.tx.clone())
                {
                    warn!(request_id, error = %format!("{error:#}"), "stats fetch not sent");
                }
            }
        }
    }

    fn refresh_session(&mut self) {
        let request_id = self.allocate_request_id();
        if let Err(error) = self
            .session
            .spawn_fetch_session_info(request_id, self.tx.clone())
        {
            warn!(request_id, error = %format!("{error:#}"), "session fetch not sent");
        }
    }

    fn refresh_torrents(&mut self) {
        if self.loaded {
            self.request_torrents(FetchSelector::RecentlyActive, TorrentField::stats_set());
            return;
        }
        if self.initial_request.is_some() {
            return;
        }
        self.initial_request =
            self.request_torrents(FetchSelector::All, TorrentField::full_set());
    }

    fn request_torrents(
        &mut self,
        selector: FetchSelector,
        fields: Vec<TorrentField>,
    ) -> Option<u64> {
        let request_id = self.allocate_request_id();
        debug!(request_id, ?selector, fields = fields.len(), "fetching torrents");
        match self
            .session
            .spawn_fetch_torrents(request_id, selector, fields, self.tx.clone())
        {
            Ok(()) => Some(request_id),
            Err(error) => {
                warn!(request_id, error = %format!("{error:#}"), "torrent fetch not sent");
                None
            }
        }
    }

    fn restart_torrent_refresh(&mut self, now: Instant) {
        if self.torrent_refresh {
            self.scheduler.cancel_periodic(TimerKey::TorrentRefresh);
            self.scheduler.schedule_periodic(
                TimerKey::TorrentRefresh,
                self.options.refresh_interval,
                now,
            );
        } else {
            self.refresh_torrents();
        }
    }

    fn restart_session_refresh(&mut self, now: Instant) {
        if self.scheduler.cancel_periodic(TimerKey::SessionRefresh) {
            self.scheduler.schedule_periodic(
                TimerKey::SessionRefresh,
                self.options.session_interval,
                now,
            );
        } else {
            self.refresh_session();
        }
    }

    fn handle_remote_event(&mut self, event: RemoteEvent, now: Instant) -> Option<CommandReport> {
        match event {
            RemoteEvent::Torrents { request_id, result } => {
                let initial = self.initial_request == Some(request_id);
                if initial {
                    self.initial_request = None;
                }
                match result {
                    Ok(delta) => {
                        if initial {
                            self.loaded = true;
                            info!(count = delta.updates.len(), "torrent list loaded");
                        }
                        self.apply_delta(delta, now);
                    }
                    Err(error) => warn!(request_id, %error, "torrent fetch failed"),
                }
                None
            }
            RemoteEvent::SessionInfo { request_id, result } => {
                match result {
                    Ok(info) => {
                        self.sink.on_session_info(&info);
                        self.session_info = Some(info);
                    }
                    Err(error) => warn!(request_id, %error, "session fetch failed"),
                }
                None
            }
            RemoteEvent::SessionStats { request_id, result } => {
                match result {
                    Ok(stats) => {
                        self.sink.on_session_stats(&stats);
                        self.session_stats = Some(stats);
                    }
                    Err(error) => warn!(request_id, %error, "stats fetch failed"),
                }
                None
            }
            RemoteEvent::Command { request_id, result } => {
                let Some(pending) = self.pending_commands.remove(&request_id) else {
                    debug!(request_id, "reply for unknown command");
                    return None;
                };
                let method = pending.command.method();
                let result = match result {
                    Ok(reply) => {
                        match pending.command {
                            Command::Rename { .. } => self.apply_rename(reply, now),
                            Command::SetSession(_) => self.restart_session_refresh(now),
                            _ => {}
                        }
                        if !pending.command.is_session_wide() {
                            self.restart_torrent_refresh(now);
                        }
                        Ok(())
                    }
                    Err(message) => {
                        warn!(request_id, method, %message, "command failed");
                        Err(CommandError::Failed { method, message })
                    }
                };
                Some(CommandReport {
                    request_id,
                    command: pending.command,
                    ids: pending.ids,
                    result,
                })
            }
        }
    }

    fn apply_delta(&mut self, delta: TorrentDelta, now: Instant) {
        let mut needinfo = Vec::new();
        for update in delta.updates {
            let id = update.id;
            let outcome = self.store.upsert(update);
            let Some(torrent) = self.store.get(id) else {
                continue;
            };
            if outcome.needs_full_fetch(torrent) {
                needinfo.push(id);
            }
            if outcome.transition != Transition::Unchanged {
                debug!(%id, transition = ?outcome.transition, "status transition");
                self.sink.on_transition(torrent, outcome.transition);
            }
        }
        let removed = self.store.remove(&delta.removed);
        if removed > 0 {
            debug!(removed, "torrents removed");
        }
        if !needinfo.is_empty() {
            self.request_torrents(FetchSelector::Ids(needinfo), TorrentField::full_set());
        }
        self.scheduler
            .debounce(TimerKey::Refilter, self.options.refilter_delay, now);
        self.scheduler
            .debounce(TimerKey::ButtonRefresh, self.options.button_delay, now);
    }

    fn apply_rename(&mut self, reply: CommandReply, now: Instant) {
        match serde_json::from_value::<TorrentUpdate>(Value::Object(reply)) {
            Ok(update) => {
                self.store.upsert(update);
                self.scheduler
                    .debounce(TimerKey::Refilter, self.options.refilter_delay, now);
            }
            Err(error) => debug!(%error, "rename reply without torrent fields"),
        }
    }

    fn refilter(&mut self, full_rebuild: bool, now: Instant) {
        let diff = self.engine.refilter(
            &mut self.store,
            &self.view.filter,
            self.view.sort,
            full_rebuild,
        );
        if !diff.is_empty() {
            self.sink.on_list_changed(&diff, &self.store);
        }

        let order = self.engine.visible_ids();
        if self.selection.reconcile(&order) {
            self.scheduler
                .debounce(TimerKey::SelectionNotify, self.options.selection_delay, now);
        }
        self.scheduler
            .debounce(TimerKey::ButtonRefresh, self.options.button_delay, now);

        let trackers = self.engine.tracker_summary(&self.store);
        if trackers != self.trackers {
            self.sink.on_trackers_changed(&trackers);
            self.trackers = trackers;
        }
    }

    fn allocate_request_id(&mut self) -> u64 {
        self.next_request_id += 1;
        self.next_request_id
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::{Duration, Instant};

    use anyhow::{Result, bail};
    use clutch_app::{
        ClickModifiers, CursorDirection, FetchSelector, ListDiff, Row, SessionInfo,
        SessionStats, SortDirection, StatusSummary, Torrent, TorrentDelta, TorrentField,
        TorrentFields, TorrentId, TorrentStatus, TorrentStore, TorrentUpdate, Transition,
        ViewCommand, ViewState,
    };
    use serde_json::json;

    use super::{
        Client, ClientOptions, Command, CommandError, CommandReply, RemoteSession, SessionSetting,
        ViewSink,
    };

    #[derive(Debug, Default)]
    struct FakeSession {
        torrents: BTreeMap<TorrentId, TorrentUpdate>,
        recently_active: TorrentDelta,
        fetches: Vec<FetchSelector>,
        commands: Vec<(String, Vec<TorrentId>)>,
        fail_fetches: bool,
        fail_commands: Option<String>,
    }

    impl FakeSession {
        fn with(torrents: Vec<TorrentUpdate>) -> Self {
            Self {
                torrents: torrents.into_iter().map(|update| (update.id, update)).collect(),
                ..Self::default()
            }
        }
    }

    impl RemoteSession for FakeSession {
        fn fetch_torrents(
            &mut self,
            selector: &FetchSelector,
            _fields: &[TorrentField],
        ) -> Result<TorrentDelta> {
            self.fetches.push(selector.clone());
            if self.fail_fetches {
                bail!("connection refused");
            }
            let delta = match selector {
                FetchSelector::All => TorrentDelta {
                    updates: self.torrents.values().cloned().collect(),
                    removed: Vec::new(),
                },
                FetchSelector::RecentlyActive => self.recently_active.clone(),
                FetchSelector::Ids(ids) => TorrentDelta {
                    updates: ids
                        .iter()
                        .filter_map(|id| self.torrents.get(id).cloned())
                        .collect(),
                    removed: Vec::new(),
                },
            };
            Ok(delta)
        }

        fn fetch_session_info(&mut self) -> Result<SessionInfo> {
            let mut info = SessionInfo::new();
            info.insert("version".to_owned(), json!("4.0.5"));
            Ok(info)
        }

        fn fetch_session_stats(&mut self) -> Result<SessionStats> {
            Ok(SessionStats::default())
        }

        fn send_command(&mut self, command: &Command, ids: &[TorrentId]) -> Result<CommandReply> {
            self.commands
                .push((command.method().to_owned(), ids.to_vec()));
            if let Some(message) = &self.fail_commands {
                bail!("{message}");
            }
            let mut reply = CommandReply::new();
            if let (Command::Rename { name, .. }, Some(id)) = (command, ids.first()) {
                reply.insert("id".to_owned(), json!(id));
                reply.insert("name".to_owned(), json!(name));
                reply.insert("path".to_owned(), json!(name));
            }
            Ok(reply)
        }
    }

    #[derive(Debug, Default)]
    struct Recorder {
        rows: Vec<Row>,
        list_changes: usize,
        selections: Vec<Vec<TorrentId>>,
        summaries: Vec<StatusSummary>,
        transitions: Vec<(TorrentId, Transition)>,
        session_infos: usize,
    }

    impl ViewSink for Recorder {
        fn on_list_changed(&mut self, diff: &ListDiff, _torrents: &TorrentStore) {
            diff.apply_to(&mut self.rows);
            self.list_changes += 1;
        }

        fn on_selection_changed(&mut self, selected: &[TorrentId]) {
            self.selections.push(selected.to_vec());
        }

        fn on_status_summary(&mut self, summary: &StatusSummary) {
            self.summaries.push(*summary);
        }

        fn on_transition(&mut self, torrent: &Torrent, transition: Transition) {
            self.transitions.push((torrent.id(), transition));
        }

        fn on_session_info(&mut self, _info: &SessionInfo) {
            self.session_infos += 1;
        }
    }

    fn torrent(id: i64, name: &str, queue: i64, status: TorrentStatus) -> TorrentUpdate {
        TorrentUpdate {
            id: TorrentId::new(id),
            fields: TorrentFields {
                name: Some(name.to_owned()),
                status: Some(status),
                queue_position: Some(queue),
                ..TorrentFields::default()
            },
        }
    }

    fn ids(raw: &[i64]) -> Vec<TorrentId> {
        raw.iter().copied().map(TorrentId::new).collect()
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn loaded_client() -> (Client<FakeSession, Recorder>, Instant) {
        let session = FakeSession::with(vec![
            torrent(1, "Ubuntu", 2, TorrentStatus::Seed),
            torrent(2, "Debian", 0, TorrentStatus::Stopped),
            torrent(3, "Fedora", 1, TorrentStatus::Download),
        ]);
        let mut client = Client::new(
            session,
            Recorder::default(),
            ClientOptions::default(),
            ViewState::default(),
        );
        let t0 = Instant::now();
        client.start(t0);
        client.pump(t0);
        client.pump(t0 + ms(100));
        (client, t0 + ms(100))
    }

    fn plain() -> ClickModifiers {
        ClickModifiers::default()
    }

    #[test]
    fn start_loads_everything_and_renders_after_the_refilter_delay() {
        let session = FakeSession::with(vec![
            torrent(1, "Ubuntu", 1, TorrentStatus::Seed),
            torrent(2, "Debian", 0, TorrentStatus::Stopped),
        ]);
        let mut client = Client::new(
            session,
            Recorder::default(),
            ClientOptions::default(),
            ViewState::default(),
        );
        let t0 = Instant::now();
        client.start(t0);
        client.pump(t0);

        assert!(client.is_loaded());
        assert_eq!(client.store().len(), 2);
        assert!(client.rows().is_empty());
        assert_eq!(client.sink().session_infos, 1);

        client.pump(t0 + ms(99));
        assert_eq!(client.sink().list_changes, 0);

        client.pump(t0 + ms(100));
        assert_eq!(client.visible_ids(), ids(&[2, 1]));
        assert_eq!(client.sink().rows, client.rows());
        assert_eq!(client.sink().list_changes, 1);
    }

    #[test]
    fn periodic_refresh_asks_for_recently_active_torrents() {
        let (mut client, now) = loaded_client();
        client.pump(now + Duration::from_secs(5));
        assert_eq!(
            client.session_mut().fetches.last(),
            Some(&FetchSelector::RecentlyActive)
        );
    }

    #[test]
    fn new_incomplete_torrent_is_fetched_in_full() {
        let (mut client, now) = loaded_client();
        client.session_mut().torrents.insert(
            TorrentId::new(4),
            torrent(4, "Arch", 3, TorrentStatus::DownloadWait),
        );
        client.session_mut().recently_active = TorrentDelta {
            updates: vec![TorrentUpdate {
                id: TorrentId::new(4),
                fields: TorrentFields {
                    rate_download: Some(10),
                    ..TorrentFields::default()
                },
            }],
            removed: Vec::new(),
        };

        let tick = now + Duration::from_secs(5);
        client.pump(tick);
        client.pump(tick);
        assert!(
            client
                .session_mut()
                .fetches
                .contains(&FetchSelector::Ids(ids(&[4])))
        );

        client.pump(tick + ms(100));
        client.pump(tick + ms(300));
        client.pump(tick + ms(600));
        assert_eq!(client.visible_ids(), ids(&[2, 3, 1, 4]));
        assert_eq!(
            client.store().get(TorrentId::new(4)).map(Torrent::name),
            Some("Arch")
        );
    }

    #[test]
    fn failed_fetch_keeps_state_and_retries_next_tick() {
        let (mut client, now) = loaded_client();
        let before = client.visible_ids();
        client.session_mut().fail_fetches = true;

        let first = now + Duration::from_secs(5);
        client.pump(first);
        client.pump(first + ms(200));
        assert_eq!(client.visible_ids(), before);
        assert_eq!(client.store().len(), 3);

        client.session_mut().fail_fetches = false;
        let fetches = client.session_mut().fetches.len();
        client.pump(first + Duration::from_secs(5));
        assert_eq!(client.session_mut().fetches.len(), fetches + 1);
    }

    #[test]
    fn transitions_reach_the_sink() {
        let (mut client, now) = loaded_client();
        client.session_mut().recently_active = TorrentDelta {
            updates: vec![TorrentUpdate {
                id: TorrentId::new(3),
                fields: TorrentFields {
                    status: Some(TorrentStatus::Seed),
                    ..TorrentFields::default()
                },
            }],
            removed: Vec::new(),
        };
        let tick = now + Duration::from_secs(5);
        client.pump(tick);
        client.pump(tick);
        assert_eq!(
            client.sink().transitions,
            vec![(TorrentId::new(3), Transition::DownloadComplete)]
        );
    }

    #[test]
    fn successful_command_reports_and_refreshes() {
        let (mut client, now) = loaded_client();
        client.click(TorrentId::new(1), plain(), now);
        let request = client.stop_selected();
        assert!(request.is_some());

        let fetches = client.session_mut().fetches.len();
        let reports = client.pump(now);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].request_id, request.unwrap_or_default());
        assert_eq!(reports[0].ids, ids(&[1]));
        assert_eq!(reports[0].result, Ok(()));
        assert_eq!(
            client.session_mut().commands,
            vec![("torrent-stop".to_owned(), ids(&[1]))]
        );
        assert_eq!(client.session_mut().fetches.len(), fetches + 1);
    }

    #[test]
    fn failed_command_is_reported_not_retried() {
        let (mut client, now) = loaded_client();
        client.select_all(now);
        client.session_mut().fail_commands = Some("permission denied".to_owned());

        client.verify_selected();
        let reports = client.pump(now);
        assert_eq!(
            reports[0].result,
            Err(CommandError::Failed {
                method: "torrent-verify",
                message: "permission denied".to_owned(),
            })
        );
        client.pump(now + Duration::from_secs(1));
        assert_eq!(client.session_mut().commands.len(), 1);
    }

    #[test]
    fn empty_selection_sends_nothing() {
        let (mut client, _) = loaded_client();
        assert!(client.start_selected(true).is_none());
        assert!(client.session_mut().commands.is_empty());
    }

    #[test]
    fn start_all_targets_every_known_torrent() {
        let (mut client, now) = loaded_client();
        client.start_all(true);
        client.pump(now);
        assert_eq!(
            client.session_mut().commands,
            vec![("torrent-start-now".to_owned(), ids(&[1, 2, 3]))]
        );
    }

    #[test]
    fn selection_notifications_are_debounced() {
        let (mut client, now) = loaded_client();
        client.click(TorrentId::new(2), plain(), now);
        client.key_down(CursorDirection::Down, false, now + ms(50));
        client.pump(now + ms(249));
        assert!(client.sink().selections.is_empty());

        client.pump(now + ms(250));
        assert_eq!(client.sink().selections, vec![ids(&[3])]);
        assert_eq!(
            client.sink().summaries.last().map(|summary| summary.selected_count),
            Some(1)
        );
    }

    #[test]
    fn removed_torrent_leaves_the_selection() {
        let (mut client, now) = loaded_client();
        client.set_selected(TorrentId::new(3), now);
        client.pump(now + ms(200));
        client.session_mut().recently_active = TorrentDelta {
            updates: Vec::new(),
            removed: ids(&[3]),
        };

        let tick = now + Duration::from_secs(5);
        client.pump(tick);
        client.pump(tick);
        client.pump(tick + ms(100));
        assert!(client.selection().is_empty());
        assert_eq!(client.sink().rows, client.rows());

        client.pump(tick + ms(300));
        assert_eq!(client.sink().selections.last(), Some(&Vec::new()));
    }

    #[test]
    fn set_selected_anchors_range_selection() {
        let (mut client, now) = loaded_client();
        assert_eq!(client.visible_ids(), ids(&[2, 3, 1]));

        client.set_selected(TorrentId::new(2), now);
        client.select_range(TorrentId::new(1), now);
        assert_eq!(client.selected_ids(), ids(&[2, 3, 1]));

        client.select_range(TorrentId::new(3), now);
        assert_eq!(client.selected_ids(), ids(&[2, 3]));
        assert_eq!(client.selection().last_clicked(), Some(TorrentId::new(2)));
    }

    #[test]
    fn session_setting_refetches_session_info() {
        let (mut client, now) = loaded_client();
        assert_eq!(client.sink().session_infos, 1);
        let fetches = client.session_mut().fetches.len();

        assert!(client.set_session(SessionSetting::UploadLimited(false)).is_some());
        let reports = client.pump(now);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].result, Ok(()));
        assert!(reports[0].ids.is_empty());
        assert_eq!(
            client.session_mut().commands,
            vec![("session-set".to_owned(), Vec::new())]
        );

        client.pump(now);
        assert_eq!(client.sink().session_infos, 2);
        assert_eq!(client.session_mut().fetches.len(), fetches);
    }

    #[test]
    fn toggle_alt_speed_flips_the_reported_state() {
        let (mut client, now) = loaded_client();
        client.toggle_alt_speed();
        let reports = client.pump(now);
        assert_eq!(
            reports[0].command,
            Command::SetSession(SessionSetting::AltSpeed(true))
        );
    }

    #[test]
    fn view_changes_rebuild_immediately_and_keep_selection() {
        let (mut client, now) = loaded_client();
        client.set_selected(TorrentId::new(1), now);

        assert!(client.apply(ViewCommand::SetSortDirection(SortDirection::Descending), now));
        assert_eq!(client.visible_ids(), ids(&[1, 3, 2]));
        assert_eq!(client.sink().rows, client.rows());
        assert!(client.selection().is_selected(TorrentId::new(1)));

        assert!(!client.apply(ViewCommand::SetSortDirection(SortDirection::Descending), now));
    }

    #[test]
    fn rename_applies_the_returned_name() {
        let (mut client, now) = loaded_client();
        client.rename(TorrentId::new(2), "Debian 12");
        client.pump(now);
        assert_eq!(
            client.store().get(TorrentId::new(2)).map(Torrent::name),
            Some("Debian 12")
        );
        assert!(client.rename(TorrentId::new(99), "missing").is_none());
    }

    #[test]
    fn teardown_cancels_all_timers() {
        let (mut client, now) = loaded_client();
        client.set_stats_refresh(true, now);
        assert!(client.next_deadline().is_some());

        client.teardown();
        assert!(client.next_deadline().is_none());
        let fetches = client.session_mut().fetches.len();
        client.pump(now + Duration::from_secs(60));
        assert_eq!(client.session_mut().fetches.len(), fetches);
    }
}
