// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow};
use clutch_client::{Client, ClientOptions};
use clutch_rpc::HttpSession;
use clutch_testkit::{MemorySession, TorrentFaker};
use config::{Config, parse_duration};
use runtime::{LogSink, run_client};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEMO_SEED: u64 = 2026;
const DEMO_TORRENTS: usize = 24;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `clutch --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;
    init_tracing(config.log_level())?;

    let client_options = ClientOptions {
        refresh_interval: config.refresh_interval()?,
        ..ClientOptions::default()
    };
    let view = config.view_state()?;

    if options.demo {
        let mut faker = TorrentFaker::new(DEMO_SEED);
        let session = MemorySession::with_torrents(faker.torrents(DEMO_TORRENTS));
        if options.check_only {
            return Ok(());
        }
        info!(torrents = DEMO_TORRENTS, "running against in-memory demo daemon");
        let mut client = Client::new(session, LogSink::new(), client_options, view);
        run_client(&mut client, options.run_for, |session, elapsed| {
            session.advance(elapsed);
        });
        print!("{}", client.sink().render(client.store()));
        return Ok(());
    }

    let session = connect(&config).with_context(|| {
        format!(
            "invalid [rpc] config in {}; fix url/username/timeout values",
            options.config_path.display()
        )
    })?;
    if options.check_only {
        session
            .ping()
            .with_context(|| format!("check daemon at {}", session.url()))?;
        println!("ok: {}", session.url());
        return Ok(());
    }

    info!(url = session.url(), "connecting");
    let mut client = Client::new(session, LogSink::new(), client_options, view);
    run_client(&mut client, options.run_for, |_, _| {});
    print!("{}", client.sink().render(client.store()));
    Ok(())
}

fn connect(config: &Config) -> Result<HttpSession> {
    let session = HttpSession::new(config.rpc_url(), config.rpc_timeout()?)?;
    Ok(match config.credentials() {
        Some((username, password)) => session.with_credentials(username, password),
        None => session,
    })
}

/// `CLUTCH_LOG` wins over the configured level.
fn init_tracing(level: &str) -> Result<()> {
    let filter = match env::var("CLUTCH_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .with_context(|| format!("invalid CLUTCH_LOG {directives:?}"))?,
        _ => EnvFilter::try_new(level).with_context(|| format!("invalid log.level {level:?}"))?,
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    demo: bool,
    check_only: bool,
    run_for: Option<Duration>,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        demo: false,
        check_only: false,
        run_for: None,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--for" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--for requires a duration such as 30s"))?;
                options.run_for = Some(parse_duration(value.as_ref())?);
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("clutch: follow a torrent daemon's list from the terminal");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Run against an in-memory daemon with generated torrents");
    println!("  --for <duration>         Stop after a while and print the list (500ms, 30s, 2m)");
    println!("  --check                  Validate config and reach the daemon, then exit");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, connect, parse_cli_args};
    use crate::config::Config;
    use anyhow::{Result, anyhow};
    use std::path::PathBuf;
    use std::thread;
    use std::time::Duration;
    use tiny_http::{Header, Response, Server};

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/clutch-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_example: false,
                demo: false,
                check_only: false,
                run_for: None,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_values() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));

        let error = parse_cli_args(vec!["--for"], default_options_path())
            .expect_err("missing duration should fail");
        assert!(error.to_string().contains("--for requires a duration"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_reads_run_duration() -> Result<()> {
        let options = parse_cli_args(vec!["--demo", "--for", "1500ms"], default_options_path())?;
        assert!(options.demo);
        assert_eq!(options.run_for, Some(Duration::from_millis(1500)));

        let error = parse_cli_args(vec!["--for", "forever"], default_options_path())
            .expect_err("bad duration should fail");
        assert!(error.to_string().contains("invalid duration"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_print_and_check_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-config-path", "--print-example-config", "--check"],
            default_options_path(),
        )?;
        assert!(options.print_config_path);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(!options.demo);
        assert!(!options.show_help);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        let long = parse_cli_args(vec!["--help"], default_options_path())?;
        assert!(long.show_help);

        let short = parse_cli_args(vec!["-h"], default_options_path())?;
        assert!(short.show_help);
        Ok(())
    }

    #[test]
    fn connect_uses_configured_url_and_credentials() -> Result<()> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let url = format!("http://{}/transmission/rpc", server.server_addr());
        let (_temp, path) = clutch_testkit::temp_config_path()?;
        std::fs::write(
            &path,
            format!("version = 1\n[rpc]\nurl = \"{url}\"\nusername = \"admin\"\npassword = \"pw\"\ntimeout = \"2s\"\n"),
        )?;

        let handle = thread::spawn(move || {
            let request = server.recv().expect("request expected");
            let authorized = request
                .headers()
                .iter()
                .any(|header| header.field.equiv("Authorization"));
            assert!(authorized);
            let response = Response::from_string(r#"{"result":"success","arguments":{}}"#)
                .with_header(
                    Header::from_bytes("Content-Type", "application/json")
                        .expect("valid content type header"),
                );
            request.respond(response).expect("response should succeed");
        });

        let session = connect(&Config::load(&path)?)?;
        assert_eq!(session.url(), url);
        assert_eq!(session.timeout(), Duration::from_secs(2));
        session.ping()?;

        handle.join().expect("server thread should join");
        Ok(())
    }
}
