// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use clutch_app::TorrentId;
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Arguments a daemon returns for a successful command.
pub type CommandReply = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueMove {
    Top,
    Up,
    Down,
    Bottom,
}

impl QueueMove {
    pub const fn method(self) -> &'static str {
        match self {
            Self::Top => "queue-move-top",
            Self::Up => "queue-move-up",
            Self::Down => "queue-move-down",
            Self::Bottom => "queue-move-bottom",
        }
    }
}

/// Daemon-wide preference written with `session-set`. Limits are in KB/s and
/// switch the matching limit on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionSetting {
    AltSpeed(bool),
    UploadLimited(bool),
    DownloadLimited(bool),
    UploadLimit(u32),
    DownloadLimit(u32),
}

impl SessionSetting {
    /// Session keys this setting writes.
    pub fn arguments(self) -> Map<String, Value> {
        let mut arguments = Map::new();
        match self {
            Self::AltSpeed(enabled) => {
                arguments.insert("alt-speed-enabled".to_owned(), json!(enabled));
            }
            Self::UploadLimited(limited) => {
                arguments.insert("speed-limit-up-enabled".to_owned(), json!(limited));
            }
            Self::DownloadLimited(limited) => {
                arguments.insert("speed-limit-down-enabled".to_owned(), json!(limited));
            }
            Self::UploadLimit(kbps) => {
                arguments.insert("speed-limit-up".to_owned(), json!(kbps));
                arguments.insert("speed-limit-up-enabled".to_owned(), json!(true));
            }
            Self::DownloadLimit(kbps) => {
                arguments.insert("speed-limit-down".to_owned(), json!(kbps));
                arguments.insert("speed-limit-down-enabled".to_owned(), json!(true));
            }
        }
        arguments
    }
}

/// A mutating request sent to the daemon, either for a set of torrents or,
/// for `SetSession`, for the daemon itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { force: bool },
    Stop,
    Remove { delete_data: bool },
    Verify,
    Reannounce,
    SetLocation { location: String, move_data: bool },
    Rename { path: String, name: String },
    QueueMove(QueueMove),
    SetSession(SessionSetting),
}

impl Command {
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Start { force: false } => "torrent-start",
            Self::Start { force: true } => "torrent-start-now",
            Self::Stop => "torrent-stop",
            Self::Remove { .. } => "torrent-remove",
            Self::Verify => "torrent-verify",
            Self::Reannounce => "torrent-reannounce",
            Self::SetLocation { .. } => "torrent-set-location",
            Self::Rename { .. } => "torrent-rename-path",
            Self::QueueMove(direction) => direction.method(),
            Self::SetSession(_) => "session-set",
        }
    }

    /// True for commands that take no torrent ids.
    pub const fn is_session_wide(&self) -> bool {
        matches!(self, Self::SetSession(_))
    }

    /// Request arguments, including the target ids for torrent commands.
    pub fn arguments(&self, ids: &[TorrentId]) -> Map<String, Value> {
        if let Self::SetSession(setting) = self {
            return setting.arguments();
        }
        let mut arguments = Map::new();
        arguments.insert("ids".to_owned(), json!(ids));
        match self {
            Self::Remove { delete_data } => {
                arguments.insert("delete-local-data".to_owned(), json!(delete_data));
            }
            Self::SetLocation {
                location,
                move_data,
            } => {
                arguments.insert("location".to_owned(), json!(location));
                arguments.insert("move".to_owned(), json!(move_data));
            }
            Self::Rename { path, name } => {
                arguments.insert("path".to_owned(), json!(path));
                arguments.insert("name".to_owned(), json!(name));
            }
            Self::Start { .. }
            | Self::Stop
            | Self::Verify
            | Self::Reannounce
            | Self::QueueMove(_)
            | Self::SetSession(_) => {}
        }
        arguments
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("{method} failed: {message}")]
    Failed {
        method: &'static str,
        message: String,
    },
    #[error("could not send {method}: {message}")]
    Dispatch {
        method: &'static str,
        message: String,
    },
}

/// Outcome of a command, handed back from `Client::pump`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    pub request_id: u64,
    pub command: Command,
    pub ids: Vec<TorrentId>,
    pub result: Result<(), CommandError>,
}
