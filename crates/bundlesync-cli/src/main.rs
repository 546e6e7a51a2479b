use std::{env, sync::Arc, time::Duration};

use bundlesync_config::{
    config::{self, generate_default_config, get_config, set_config_path, Config},
    error::ConfigError,
};
use bundlesync_core::{error::SyncError, pipeline::Synchronizer, SyncResult};
use bundlesync_dl::http_client::configure_http_client;
use bundlesync_events::{ChannelSink, EventSinkHandle, NullSink};
use bundlesync_utils::time::parse_duration;
use clap::Parser;
use cli::Args;
use inspect::inspect_package;
use logging::setup_logging;
use progress::{spawn_event_handler, ProgressGuard};
use status::{clean_slot, display_status};
use sync::{sync_once, watch};
use tracing::info;
use ureq::{
    http::{HeaderMap, HeaderName, HeaderValue},
    Proxy,
};
use utils::{progress_enabled, set_color, set_progress};

mod cli;
mod inspect;
mod logging;
mod progress;
mod status;
mod sync;
mod utils;

/// Creates the event sink for a command, with a progress renderer when
/// progress output is enabled.
fn create_event_sink() -> (EventSinkHandle, Option<ProgressGuard>) {
    if progress_enabled() {
        let (sink, receiver) = ChannelSink::new();
        let events: EventSinkHandle = Arc::new(sink);
        (events, Some(spawn_event_handler(receiver)))
    } else {
        (Arc::new(NullSink), None)
    }
}

fn parse_headers(raw: &[String]) -> SyncResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    for header in raw {
        let (key, value) = header
            .split_once(':')
            .ok_or_else(|| SyncError::Custom(format!("Invalid header `{header}`, expected `Name: value`")))?;
        let name: HeaderName = key
            .trim()
            .parse()
            .map_err(|_| SyncError::Custom(format!("Invalid header name `{}`", key.trim())))?;
        let value: HeaderValue = value
            .trim()
            .parse()
            .map_err(|_| SyncError::Custom(format!("Invalid value for header `{name}`")))?;
        headers.append(name, value);
    }
    Ok(headers)
}

fn configure_http(
    proxy: Option<&str>,
    headers: Option<&[String]>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
) -> SyncResult<()> {
    let proxy = proxy
        .map(Proxy::new)
        .transpose()
        .map_err(|err| SyncError::Custom(format!("Invalid proxy: {err}")))?;
    let headers = headers.map(parse_headers).transpose()?;
    let user_agent = user_agent.or_else(|| get_config().user_agent);

    configure_http_client(|config| {
        if proxy.is_some() {
            config.proxy = proxy;
        }
        if let Some(user_agent) = user_agent {
            config.user_agent = Some(user_agent);
        }
        if headers.is_some() {
            config.headers = headers;
        }
        config.timeout = timeout;
    });

    Ok(())
}

/// HTTP settings given on the command line.
struct HttpArgs {
    proxy: Option<String>,
    header: Option<Vec<String>>,
    user_agent: Option<String>,
}

/// A synchronizer ready to run, with its event plumbing.
struct SyncSetup {
    sync: Synchronizer,
    events: EventSinkHandle,
    progress_guard: Option<ProgressGuard>,
}

impl SyncSetup {
    fn new(config: &Config, http: HttpArgs, manifest_url: Option<&str>) -> SyncResult<Self> {
        configure_http(
            http.proxy.as_deref(),
            http.header.as_deref(),
            http.user_agent,
            Some(config.request_timeout()?),
        )?;

        let sync = Synchronizer::from_config(config, manifest_url)?;
        let (events, progress_guard) = create_event_sink();
        Ok(Self {
            sync: sync.with_events(events.clone()),
            events,
            progress_guard,
        })
    }
}

/// Tears down progress output and passes `result` through.
fn finish_progress(
    events: EventSinkHandle,
    progress_guard: Option<ProgressGuard>,
    result: SyncResult<()>,
) -> SyncResult<()> {
    // Every sender must be gone before the progress thread can drain.
    drop(events);
    if let Some(guard) = progress_guard {
        guard.finish();
    }
    progress::stop();
    result
}

fn watch_interval(config: &Config, interval: Option<String>) -> SyncResult<Duration> {
    match interval {
        Some(value) => {
            Ok(parse_duration(&value)
                .filter(|d| !d.is_zero())
                .ok_or(ConfigError::InvalidDuration {
                    field: "interval",
                    value,
                })?)
        }
        None => Ok(config.watch_interval()?),
    }
}

async fn handle_cli() -> SyncResult<()> {
    let args = Args::parse();

    setup_logging(&args);

    if args.no_color {
        set_color(false);
    }
    if args.no_progress || args.json || args.quiet {
        set_progress(false);
    }

    if let Some(ref c) = args.config {
        set_config_path(c)?;
    }

    let Args {
        command,
        proxy,
        header,
        user_agent,
        ..
    } = args;
    let http = HttpArgs {
        proxy,
        header,
        user_agent,
    };

    match command {
        cli::Commands::DefConfig => {
            generate_default_config()?;
        }
        cli::Commands::Config => {
            config::init()?;
            let content = toml::to_string_pretty(&get_config()).map_err(ConfigError::from)?;
            info!("{}", content.trim_end());
        }
        cli::Commands::Status => {
            config::init()?;
            display_status(&get_config())?;
        }
        cli::Commands::Inspect {
            resource,
        } => {
            config::init()?;
            inspect_package(&get_config(), resource)?;
        }
        cli::Commands::Clean => {
            config::init()?;
            clean_slot(&get_config())?;
        }
        cli::Commands::Sync {
            manifest,
            resource,
            verify,
        } => {
            config::init()?;
            let config = get_config();
            let SyncSetup {
                mut sync,
                events,
                progress_guard,
            } = SyncSetup::new(&config, http, manifest.as_deref())?;

            let options = sync.options_mut();
            if resource.is_some() {
                options.resource_name = resource;
            }
            options.verify_on_load |= verify;

            let result = sync_once(sync).await;
            finish_progress(events, progress_guard, result)?;
        }
        cli::Commands::Watch {
            interval,
        } => {
            config::init()?;
            let config = get_config();
            let interval = watch_interval(&config, interval)?;
            let SyncSetup {
                sync,
                events,
                progress_guard,
            } = SyncSetup::new(&config, http, None)?;

            let result = watch(sync, events.clone(), interval).await;
            finish_progress(events, progress_guard, result)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if env::var_os("NO_COLOR").is_some() {
        set_color(false);
    }

    handle_cli().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(&[
            "Authorization: Bearer abc".to_string(),
            "X-Slot:agent".to_string(),
        ])
        .unwrap();

        assert_eq!(headers.get("authorization").unwrap(), "Bearer abc");
        assert_eq!(headers.get("x-slot").unwrap(), "agent");
    }

    #[test]
    fn test_watch_interval() {
        let config = Config::default_config();
        assert_eq!(
            watch_interval(&config, Some("30s".into())).unwrap(),
            Duration::from_secs(30)
        );
        assert_eq!(
            watch_interval(&config, None).unwrap(),
            Duration::from_secs(300)
        );
        assert!(watch_interval(&config, Some("0s".into())).is_err());
    }

    #[test]
    fn test_parse_headers_rejects_missing_colon() {
        let err = parse_headers(&["Authorization Bearer".to_string()]).unwrap_err();
        assert!(matches!(err, SyncError::Custom(_)));
    }
}
