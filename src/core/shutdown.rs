//! # OS termination signals.
//!
//! [`wait_for_shutdown_signal`] completes when the agent is asked to stop and
//! names the signal: `SIGINT`, `SIGTERM` (systemd stop) or `SIGQUIT` on Unix,
//! Ctrl-C elsewhere.

/// Waits for a termination signal and returns its name.
///
/// Fails if the listeners cannot be registered.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = int.recv() => "SIGINT",
        _ = term.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
