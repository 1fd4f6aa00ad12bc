//! Signal handling for long-running commands.
//!
//! The first SIGINT (Ctrl+C) or SIGTERM cancels a
//! [`tokio_util::sync::CancellationToken`]; a second one force-exits.

use tokio_util::sync::CancellationToken;

/// Install signal handlers and return a token cancelled on the first
/// SIGINT / SIGTERM.
pub(crate) fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();

    let handler_token = token.clone();
    tokio::spawn(async move {
        let mut received = 0u32;
        loop {
            if let Err(e) = wait_for_signal().await {
                tracing::warn!("Cannot listen for shutdown signals: {}", e);
                return;
            }
            received += 1;
            if received == 1 {
                tracing::info!("Received shutdown signal, stopping...");
                tracing::info!("Press Ctrl+C again to force exit");
                handler_token.cancel();
            } else {
                tracing::warn!("Force exit requested");
                std::process::exit(130);
            }
        }
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
