// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use clutch_app::{FilterCriteria, FilterMode, SortDirection, SortMethod, SortSpec, ViewState};
use clutch_client::DEFAULT_REFRESH_INTERVAL;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const APP_NAME: &str = "clutch";
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub rpc: Rpc,
    #[serde(default)]
    pub view: View,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            rpc: Rpc::default(),
            view: View::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rpc {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Rpc {
    fn default() -> Self {
        Self {
            url: Some(clutch_rpc::DEFAULT_RPC_URL.to_owned()),
            username: None,
            password: None,
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct View {
    pub refresh_interval: Option<String>,
    pub filter_mode: Option<String>,
    pub sort_method: Option<String>,
    pub sort_direction: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("CLUTCH_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set CLUTCH_CONFIG_PATH to the config file")
        })?;
        Ok(config_root.join(APP_NAME).join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [rpc], [view], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(url) = &self.rpc.url
            && url.trim().is_empty()
        {
            bail!("rpc.url in {} must not be empty", path.display());
        }

        if self.rpc.password.is_some() && self.rpc.username.is_none() {
            bail!(
                "rpc.password in {} is set without rpc.username",
                path.display()
            );
        }

        for (key, raw) in [
            ("rpc.timeout", self.rpc.timeout.as_deref()),
            ("view.refresh_interval", self.view.refresh_interval.as_deref()),
        ] {
            let Some(raw) = raw else {
                continue;
            };
            if parse_duration(raw)? <= Duration::ZERO {
                bail!(
                    "{key} in {} must be positive, got {raw}",
                    path.display()
                );
            }
        }

        self.view_state()
            .with_context(|| format!("invalid [view] in {}", path.display()))?;
        Ok(())
    }

    pub fn rpc_url(&self) -> &str {
        self.rpc
            .url
            .as_deref()
            .unwrap_or(clutch_rpc::DEFAULT_RPC_URL)
            .trim()
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.rpc.username.as_deref()?;
        Some((username, self.rpc.password.as_deref().unwrap_or("")))
    }

    pub fn rpc_timeout(&self) -> Result<Duration> {
        parse_duration(self.rpc.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn refresh_interval(&self) -> Result<Duration> {
        match &self.view.refresh_interval {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_REFRESH_INTERVAL),
        }
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Initial filter and sort, from the `[view]` preference strings.
    pub fn view_state(&self) -> Result<ViewState> {
        let mut filter = FilterCriteria::default();
        if let Some(raw) = &self.view.filter_mode {
            filter.mode = FilterMode::parse(raw).ok_or_else(|| {
                anyhow!("unknown view.filter_mode {raw:?}; use all, active, downloading, seeding, paused, or finished")
            })?;
        }

        let mut sort = SortSpec::default();
        if let Some(raw) = &self.view.sort_method {
            sort.method = SortMethod::parse(raw).ok_or_else(|| {
                let known: Vec<&str> =
                    SortMethod::ALL.iter().map(|method| method.as_str()).collect();
                anyhow!("unknown view.sort_method {raw:?}; use one of: {}", known.join(", "))
            })?;
        }
        if let Some(raw) = &self.view.sort_direction {
            sort.direction = SortDirection::parse(raw).ok_or_else(|| {
                anyhow!("unknown view.sort_direction {raw:?}; use ascending or descending")
            })?;
        }

        Ok(ViewState::new(filter, sort))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# clutch config\n# Place this file at: {}\n\nversion = 1\n\n[rpc]\nurl = \"{}\"\n# username = \"admin\"\n# password = \"secret\"\ntimeout = \"{}\"\n\n[view]\nrefresh_interval = \"{}s\"\nfilter_mode = \"all\"\nsort_method = \"queue\"\nsort_direction = \"ascending\"\n\n[log]\n# Overridden by CLUTCH_LOG. Accepts tracing filter directives.\nlevel = \"{}\"\n",
            path.display(),
            clutch_rpc::DEFAULT_RPC_URL,
            DEFAULT_TIMEOUT,
            DEFAULT_REFRESH_INTERVAL.as_secs(),
            DEFAULT_LOG_LEVEL,
        )
    }
}

pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use clutch_app::{FilterMode, SortDirection, SortMethod};
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let (temp, path) = clutch_testkit::temp_config_path()?;
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.rpc_url(), clutch_rpc::DEFAULT_RPC_URL);
        assert_eq!(config.rpc_timeout()?, Duration::from_secs(10));
        assert_eq!(config.refresh_interval()?, Duration::from_secs(5));
        assert_eq!(config.log_level(), "info");
        assert!(config.credentials().is_none());
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[rpc]\nurl = \"http://nas:9091/transmission/rpc\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[rpc], [view], and [log]"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[rpc]\nurl = \"http://nas:9091/transmission/rpc\"\nusername = \"admin\"\npassword = \"hunter2\"\ntimeout = \"2s\"\n[view]\nrefresh_interval = \"1500ms\"\nfilter_mode = \"seeding\"\nsort_method = \"percent_completed\"\nsort_direction = \"descending\"\n[log]\nlevel = \"clutch_client=debug\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.rpc_url(), "http://nas:9091/transmission/rpc");
        assert_eq!(config.credentials(), Some(("admin", "hunter2")));
        assert_eq!(config.rpc_timeout()?, Duration::from_secs(2));
        assert_eq!(config.refresh_interval()?, Duration::from_millis(1500));
        assert_eq!(config.log_level(), "clutch_client=debug");

        let view = config.view_state()?;
        assert_eq!(view.filter.mode, FilterMode::Seeding);
        assert_eq!(view.sort.method, SortMethod::Progress);
        assert_eq!(view.sort.direction, SortDirection::Descending);
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn unknown_view_preferences_are_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[view]\nsort_method = \"color\"\n")?;
        let error = Config::load(&path).expect_err("unknown sort should fail");
        let message = format!("{error:#}");
        assert!(message.contains("view.sort_method"), "unexpected message: {message}");
        assert!(message.contains("queue"), "unexpected message: {message}");
        Ok(())
    }

    #[test]
    fn password_without_username_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[rpc]\npassword = \"secret\"\n")?;
        let error = Config::load(&path).expect_err("password alone should fail");
        assert!(error.to_string().contains("without rpc.username"));
        Ok(())
    }

    #[test]
    fn empty_rpc_url_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[rpc]\nurl = \"  \"\n")?;
        let error = Config::load(&path).expect_err("empty url should fail");
        assert!(error.to_string().contains("must not be empty"));
        Ok(())
    }

    #[test]
    fn non_positive_durations_are_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[view]\nrefresh_interval = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero interval should fail");
        let message = error.to_string();
        assert!(message.contains("view.refresh_interval"));
        assert!(message.contains("must be positive"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("CLUTCH_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("CLUTCH_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn default_path_ends_in_clutch_config_toml() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("CLUTCH_CONFIG_PATH");
        }
        let path = Config::default_path()?;
        assert!(path.ends_with("clutch/config.toml"), "got {}", path.display());
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("5h").is_err());
        Ok(())
    }

    #[test]
    fn example_config_round_trips_through_load() -> Result<()> {
        let (_temp, path) = clutch_testkit::temp_config_path()?;
        std::fs::write(&path, Config::example_config(&path))?;
        let config = Config::load(&path)?;
        assert_eq!(config.view_state()?, Default::default());
        assert_eq!(config.rpc_url(), clutch_rpc::DEFAULT_RPC_URL);
        Ok(())
    }
}
