//! Tipcache - diagnostic front-end for the prediction dashboard's data layer.
//!
//! Each command calls one data-service function and prints the normalized
//! result as JSON, including its outcome and serving source.

use std::io;

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tipcache_core::auth::CredentialStore;
use tipcache_core::{Config, DataService, FetchOptions};

/// Directory for daily-rolling log files; stderr only when unset
const ENV_LOG_DIR: &str = "TIPCACHE_LOG_DIR";

const LOG_FILE_PREFIX: &str = "tipcache.log";

const USAGE: &str = "\
Usage: tipcache <command> [args] [--refresh]

Commands:
  fixtures [YYYY-MM-DD]     Fixtures from the first provider with data
  daily [YYYY-MM-DD]        Daily predictions
  category <name>           Predictions in one category
  best                      Best predictions grouped by category
  live                      Live scores
  stats                     Stats overview
  punters | bookmakers | betting-codes
  refresh [YYYY-MM-DD]      Reload every main resource
  health                    Probe the backend
  sources                   List fixture providers in resolution order
  cache-stats               Entry counts and active cache backend
  clear-cache               Remove every cached entry
  set-credential <key>      Store the fixture provider key in the keychain
  clear-credential          Remove the stored key

--refresh skips cache reads; results are still cached.";

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // RUST_LOG controls the level (e.g. RUST_LOG=tipcache_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir.trim(), LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = init_tracing();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let refresh = take_flag(&mut args, "--refresh");
    let options = if refresh {
        FetchOptions::refresh()
    } else {
        FetchOptions::default()
    };

    let Some(command) = args.first().cloned() else {
        println!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    // Credential commands don't need the service
    match command.as_str() {
        "set-credential" => {
            let key = rest.first().context("set-credential needs a key")?;
            CredentialStore::store(key)?;
            println!("Credential stored");
            return Ok(());
        }
        "clear-credential" => {
            CredentialStore::delete()?;
            println!("Credential removed");
            return Ok(());
        }
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load()?;
    let service = DataService::new(&config)?;
    info!(command = %command, refresh, "Running command");
    let monitor = service.start_health_monitor();

    let result = match command.as_str() {
        "fixtures" => print_json(&service.get_fixtures(date_arg(rest)?, options).await),
        "daily" => print_json(&service.get_daily_predictions(date_arg(rest)?, options).await),
        "category" => {
            let category = rest.first().context("category needs a name")?;
            print_json(&service.get_predictions_by_category(category, options).await)
        }
        "best" => print_json(&service.get_best_predictions_by_category(options).await),
        "live" => print_json(&service.get_live_scores(options).await),
        "stats" => print_json(&service.get_stats_overview(options).await),
        "punters" => print_json(&service.get_punters(options).await),
        "bookmakers" => print_json(&service.get_bookmakers(options).await),
        "betting-codes" => print_json(&service.get_betting_codes(options).await),
        "refresh" => print_json(&service.refresh_all(date_arg(rest)?).await),
        "health" => {
            let healthy = service.check_health().await;
            println!("{} is {}", config.api_base_url, if healthy { "up" } else { "down" });
            Ok(())
        }
        "sources" => {
            for source in service.registry().sources() {
                let access = if source.requires_credential {
                    "credential"
                } else {
                    "anonymous"
                };
                println!("{:>3}  {:<15} {}", source.priority, source.name, access);
            }
            Ok(())
        }
        "cache-stats" => print_json(&service.cache().stats()),
        "clear-cache" => {
            service.cache().clear();
            println!("Cache cleared");
            Ok(())
        }
        other => Err(anyhow!("Unknown command `{}`\n\n{}", other, USAGE)),
    };
    monitor.abort();
    result
}

/// Remove `flag` from `args`, reporting whether it was present.
fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    let before = args.len();
    args.retain(|arg| arg != flag);
    args.len() != before
}

/// First positional argument as a date, today when absent.
fn date_arg(rest: &[String]) -> Result<NaiveDate> {
    match rest.first() {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("Invalid date `{}` (expected YYYY-MM-DD)", raw)),
        None => Ok(Utc::now().date_naive()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode result")?;
    println!("{}", json);
    Ok(())
}
