//! Process signals to cancellation

use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Token cancelled on the first SIGINT or SIGTERM
///
/// Must be called from within the runtime.
#[cfg(unix)]
pub fn shutdown_token() -> std::io::Result<CancellationToken> {
    use tokio::signal::unix::{signal, SignalKind};

    let cancel = CancellationToken::new();
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => warn!("Received SIGINT, shutting down"),
            _ = sigterm.recv() => warn!("Received SIGTERM, shutting down"),
        }
        token.cancel();
    });

    Ok(cancel)
}

/// Token cancelled on the first Ctrl-C
#[cfg(not(unix))]
pub fn shutdown_token() -> std::io::Result<CancellationToken> {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl-C, shutting down");
            token.cancel();
        }
    });
    Ok(cancel)
}
