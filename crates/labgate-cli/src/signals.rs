//! Process termination signals.
//!
//! On Unix the access point stops on SIGINT (Ctrl-C), SIGTERM (systemd stop)
//! and SIGQUIT. Elsewhere only Ctrl-C is awaited.

#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    use tracing::info;

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => info!(signal = "SIGINT", "Shutdown signal received"),
        _ = sigterm.recv() => info!(signal = "SIGTERM", "Shutdown signal received"),
        _ = sigquit.recv() => info!(signal = "SIGQUIT", "Shutdown signal received"),
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl-c", "Shutdown signal received");
    Ok(())
}
