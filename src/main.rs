//! relaybot - IRC bot built on a threaded dispatch core.

use relaybot::config::{self, Config};
use relaybot::{Bot, metrics};
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = match &config_path {
        Some(path) => Config::load(Path::new(path)).map_err(|e| {
            error!(path = %path, error = %e, "Failed to load config");
            e
        })?,
        None => {
            info!("No config file given, using defaults");
            Config::default()
        }
    };

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("configuration has {} error(s)", errors.len());
    }

    metrics::init();

    info!(
        address = %config.server.address,
        nick = %config.server.nick,
        pool = config.dispatch.pool_workers,
        "Starting relaybot"
    );

    let result = Bot::new(config).run();
    debug!(metrics = %metrics::gather_metrics(), "Final metrics");
    let lines = result?;
    info!(lines, "relaybot stopped");
    Ok(())
}

/// `RUST_LOG` picks the filter (default `info`); `RELAYBOT_LOG_FORMAT=json`
/// switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true);

    if std::env::var("RELAYBOT_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}
