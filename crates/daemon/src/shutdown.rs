// SPDX-License-Identifier: MIT

//! Graceful shutdown: cancel the shared [`CancellationToken`] on SIGINT or
//! SIGTERM so every coordinator loop, the CDC listener and the activity
//! flusher get a chance to finish their current tick and release their
//! leader lock cleanly instead of dying mid-write.

use tokio_util::sync::CancellationToken;
use tracing::info;

pub fn spawn_signal_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("wscd: shutdown signal received, cancelling all tasks");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            tracing::warn!(error = %err, "wscd: failed to install a SIGTERM handler, SIGINT only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
