// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clutch_app::{
    FetchSelector, SessionInfo, SessionStats, TorrentDelta, TorrentField, TorrentId, TorrentUpdate,
};
use clutch_client::{Command, CommandReply, RemoteEvent, RemoteSession};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const SESSION_ID_HEADER: &str = "X-Transmission-Session-Id";
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9091/transmission/rpc";

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("cannot reach {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("authentication failed ({status})")]
    Unauthorized { status: u16 },
    #[error("daemon kept rejecting the session id")]
    SessionConflict,
    #[error("server error ({status}): {body}")]
    Http { status: u16, body: String },
    #[error("{method} rejected: {result}")]
    Rejected { method: String, result: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Credentials {
    username: String,
    password: String,
}

/// JSON-RPC connection to a daemon. Clones share the negotiated session id.
#[derive(Debug, Clone)]
pub struct HttpSession {
    url: String,
    timeout: Duration,
    credentials: Option<Credentials>,
    http: HttpClient,
    session_id: Arc<Mutex<Option<String>>>,
    tag: Arc<AtomicU64>,
}

impl HttpSession {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            bail!("rpc.url must not be empty");
        }
        Url::parse(url).with_context(|| format!("parse rpc.url {url:?}"))?;

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            url: url.to_owned(),
            timeout,
            credentials: None,
            http,
            session_id: Arc::new(Mutex::new(None)),
            tag: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials {
            username: username.to_owned(),
            password: password.to_owned(),
        });
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock_session_id().clone()
    }

    pub fn ping(&self) -> Result<()> {
        self.session_get().map(|_| ())
    }

    pub fn torrent_get(
        &self,
        selector: &FetchSelector,
        fields: &[TorrentField],
    ) -> Result<TorrentDelta> {
        let mut arguments = Map::new();
        let names: Vec<&str> = fields.iter().map(|field| field.as_str()).collect();
        arguments.insert("fields".to_owned(), json!(names));
        match selector {
            FetchSelector::All => {}
            FetchSelector::RecentlyActive => {
                arguments.insert("ids".to_owned(), json!("recently-active"));
            }
            FetchSelector::Ids(ids) => {
                arguments.insert("ids".to_owned(), json!(ids));
            }
        }

        let reply = self.call("torrent-get", arguments)?;
        let parsed: TorrentGetArguments =
            serde_json::from_value(Value::Object(reply)).context("decode torrent-get reply")?;
        Ok(TorrentDelta {
            updates: parsed.torrents,
            removed: parsed.removed,
        })
    }

    pub fn session_get(&self) -> Result<SessionInfo> {
        self.call("session-get", Map::new())
    }

    pub fn session_stats(&self) -> Result<SessionStats> {
        let reply = self.call("session-stats", Map::new())?;
        serde_json::from_value(Value::Object(reply)).context("decode session-stats reply")
    }

    pub fn command(&self, command: &Command, ids: &[TorrentId]) -> Result<CommandReply> {
        self.call(command.method(), command.arguments(ids))
    }

    /// Sends one request and returns the reply's `arguments` object.
    pub fn call(&self, method: &str, arguments: Map<String, Value>) -> Result<Map<String, Value>> {
        let request = RpcRequest {
            method,
            arguments: &arguments,
            tag: self.tag.fetch_add(1, Ordering::Relaxed) + 1,
        };
        debug!(method, tag = request.tag, "rpc request");

        let response = self.post(&request)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(status_error(status, &body).into());
        }

        let parsed: RpcResponse = response
            .json()
            .with_context(|| format!("decode {method} response"))?;
        if parsed.result != "success" {
            return Err(RpcError::Rejected {
                method: method.to_owned(),
                result: parsed.result,
            }
            .into());
        }
        Ok(parsed.arguments)
    }

    fn post(&self, request: &RpcRequest<'_>) -> Result<Response> {
        for attempt in 0..2 {
            let mut builder = self.http.post(&self.url).json(request);
            if let Some(id) = self.session_id() {
                builder = builder.header(SESSION_ID_HEADER, id);
            }
            if let Some(credentials) = &self.credentials {
                builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
            }

            let response = builder.send().map_err(|source| RpcError::Connection {
                url: self.url.clone(),
                source,
            })?;
            if response.status() != StatusCode::CONFLICT {
                return Ok(response);
            }

            let Some(id) = response
                .headers()
                .get(SESSION_ID_HEADER)
                .and_then(|value| value.to_str().ok())
            else {
                break;
            };
            debug!(attempt, "session id refreshed");
            *self.lock_session_id() = Some(id.to_owned());
        }
        Err(RpcError::SessionConflict.into())
    }

    fn lock_session_id(&self) -> MutexGuard<'_, Option<String>> {
        self.session_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn spawn<F>(&self, work: F)
    where
        F: FnOnce(Self) + Send + 'static,
    {
        let session = self.clone();
        thread::spawn(move || work(session));
    }
}

fn status_error(status: StatusCode, body: &str) -> RpcError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return RpcError::Unauthorized {
            status: status.as_u16(),
        };
    }
    let body = if body.len() < 200 && !body.contains('<') {
        body.trim().to_owned()
    } else {
        String::new()
    };
    RpcError::Http {
        status: status.as_u16(),
        body,
    }
}

fn flatten<T>(result: Result<T>) -> Result<T, String> {
    result.map_err(|error| format!("{error:#}"))
}

impl RemoteSession for HttpSession {
    fn fetch_torrents(
        &mut self,
        selector: &FetchSelector,
        fields: &[TorrentField],
    ) -> Result<TorrentDelta> {
        self.torrent_get(selector, fields)
    }

    fn fetch_session_info(&mut self) -> Result<SessionInfo> {
        self.session_get()
    }

    fn fetch_session_stats(&mut self) -> Result<SessionStats> {
        self.session_stats()
    }

    fn send_command(&mut self, command: &Command, ids: &[TorrentId]) -> Result<CommandReply> {
        self.command(command, ids)
    }

    fn spawn_fetch_torrents(
        &mut self,
        request_id: u64,
        selector: FetchSelector,
        fields: Vec<TorrentField>,
        tx: Sender<RemoteEvent>,
    ) -> Result<()> {
        self.spawn(move |session| {
            let result = flatten(session.torrent_get(&selector, &fields));
            let _ = tx.send(RemoteEvent::Torrents { request_id, result });
        });
        Ok(())
    }

    fn spawn_fetch_session_info(&mut self, request_id: u64, tx: Sender<RemoteEvent>) -> Result<()> {
        self.spawn(move |session| {
            let result = flatten(session.session_get());
            let _ = tx.send(RemoteEvent::SessionInfo { request_id, result });
        });
        Ok(())
    }

    fn spawn_fetch_session_stats(
        &mut self,
        request_id: u64,
        tx: Sender<RemoteEvent>,
    ) -> Result<()> {
        self.spawn(move |session| {
            let result = flatten(session.session_stats());
            let _ = tx.send(RemoteEvent::SessionStats { request_id, result });
        });
        Ok(())
    }

    fn spawn_send_command(
        &mut self,
        request_id: u64,
        command: Command,
        ids: Vec<TorrentId>,
        tx: Sender<RemoteEvent>,
    ) -> Result<()> {
        self.spawn(move |session| {
            let result = flatten(session.command(&command, &ids));
            let _ = tx.send(RemoteEvent::Command { request_id, result });
        });
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    arguments: &'a Map<String, Value>,
    tag: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TorrentGetArguments {
    torrents: Vec<TorrentUpdate>,
    removed: Vec<TorrentId>,
}
