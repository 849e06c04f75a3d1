// SPDX-License-Identifier: MIT

//! `wscd`: the control-plane reconciler process. Wires one Postgres pool,
//! one `Runtime` client, one wake bus and one clock into the seven
//! concurrent loops (OB, WC, TTL, GC, METRICS, the CDC listener and the
//! activity flusher) and runs them until SIGINT/SIGTERM.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod context;
mod shutdown;

use std::process::ExitCode;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wsc_adapters::{HttpRuntime, Runtime};
use wsc_core::SystemClock;

use config::Config;
use context::AppContext;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("wscd: invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.rust_log);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "wscd: fatal startup error");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(rust_log: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(rust_log));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let pool = PgPoolOptions::new().max_connections(config.database_pool_size).connect(&config.database_url).await?;

    info!("wscd: running migrations");
    wsc_storage::MIGRATOR.run(&pool).await?;

    let runtime: Arc<dyn Runtime> = Arc::new(HttpRuntime::new(
        config.runtime_endpoint.clone(),
        config.runtime_api_key.clone(),
        std::time::Duration::from_secs(30),
    )?);

    let ctx = Arc::new(AppContext::new(pool, runtime, SystemClock, config)?);

    let cancel = CancellationToken::new();
    shutdown::spawn_signal_watcher(cancel.clone());

    let handles = ctx.spawn_all(cancel);

    info!("wscd: all coordinators started");
    for handle in handles {
        if let Err(err) = handle.await {
            error!(error = %err, "wscd: a coordinator task panicked");
        }
    }

    info!("wscd: shutdown complete");
    Ok(())
}
