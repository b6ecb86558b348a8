// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::sync::mpsc::Sender;

use anyhow::{Result, anyhow};
use clutch_app::{FetchSelector, SessionInfo, SessionStats, TorrentDelta, TorrentField, TorrentId};

use crate::{Command, CommandReply};

/// Completion of a request issued through a `RemoteSession`. Errors are
/// flattened to strings so events can cross threads.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    Torrents {
        request_id: u64,
        result: Result<TorrentDelta, String>,
    },
    SessionInfo {
        request_id: u64,
        result: Result<SessionInfo, String>,
    },
    SessionStats {
        request_id: u64,
        result: Result<SessionStats, String>,
    },
    Command {
        request_id: u64,
        result: Result<CommandReply, String>,
    },
}

impl RemoteEvent {
    pub const fn request_id(&self) -> u64 {
        match self {
            Self::Torrents { request_id, .. }
            | Self::SessionInfo { request_id, .. }
            | Self::SessionStats { request_id, .. }
            | Self::Command { request_id, .. } => *request_id,
        }
    }
}

fn flatten<T>(result: Result<T>) -> Result<T, String> {
    result.map_err(|error| format!("{error:#}"))
}

fn deliver(tx: &Sender<RemoteEvent>, event: RemoteEvent) -> Result<()> {
    tx.send(event)
        .map_err(|_| anyhow!("remote event channel closed"))
}

/// The daemon as seen by the client. The `spawn_*` methods must eventually
/// send exactly one `RemoteEvent` carrying `request_id`; the defaults run the
/// blocking call inline.
pub trait RemoteSession {
    fn fetch_torrents(
        &mut self,
        selector: &FetchSelector,
        fields: &[TorrentField],
    ) -> Result<TorrentDelta>;
    fn fetch_session_info(&mut self) -> Result<SessionInfo>;
    fn fetch_session_stats(&mut self) -> Result<SessionStats>;
    fn send_command(&mut self, command: &Command, ids: &[TorrentId]) -> Result<CommandReply>;

    fn spawn_fetch_torrents(
        &mut self,
        request_id: u64,
        selector: FetchSelector,
        fields: Vec<TorrentField>,
        tx: Sender<RemoteEvent>,
    ) -> Result<()> {
        let result = flatten(self.fetch_torrents(&selector, &fields));
        deliver(&tx, RemoteEvent::Torrents { request_id, result })
    }

    fn spawn_fetch_session_info(&mut self, request_id: u64, tx: Sender<RemoteEvent>) -> Result<()> {
        let result = flatten(self.fetch_session_info());
        deliver(&tx, RemoteEvent::SessionInfo { request_id, result })
    }

    fn spawn_fetch_session_stats(
        &mut self,
        request_id: u64,
        tx: Sender<RemoteEvent>,
    ) -> Result<()> {
        let result = flatten(self.fetch_session_stats());
        deliver(&tx, RemoteEvent::SessionStats { request_id, result })
    }

    fn spawn_send_command(
        &mut self,
        request_id: u64,
        command: Command,
        ids: Vec<TorrentId>,
        tx: Sender<RemoteEvent>,
    ) -> Result<()> {
        let result = flatten(self.send_command(&command, &ids));
        deliver(&tx, RemoteEvent::Command { request_id, result })
    }
}
