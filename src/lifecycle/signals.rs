//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown

use tokio::sync::mpsc;

use super::Shutdown;

/// What a received signal asks the process to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Shutdown,
    Reload,
}

/// Spawn the signal listener. Shutdown signals also fire `shutdown`.
pub fn spawn(shutdown: Shutdown) -> mpsc::UnboundedReceiver<SignalEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(listen(tx, shutdown));
    rx
}

#[cfg(unix)]
async fn listen(tx: mpsc::UnboundedSender<SignalEvent>, shutdown: Shutdown) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut term, mut hup) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) {
        (Ok(term), Ok(hup)) => (term, hup),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "Failed to install signal handlers");
            return;
        }
    };

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => SignalEvent::Shutdown,
            _ = term.recv() => SignalEvent::Shutdown,
            _ = hup.recv() => SignalEvent::Reload,
        };

        tracing::info!(?event, "Signal received");
        if event == SignalEvent::Shutdown {
            shutdown.trigger();
        }
        if tx.send(event).is_err() || event == SignalEvent::Shutdown {
            break;
        }
    }
}

#[cfg(not(unix))]
async fn listen(tx: mpsc::UnboundedSender<SignalEvent>, shutdown: Shutdown) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Signal received");
        shutdown.trigger();
        let _ = tx.send(SignalEvent::Shutdown);
    }
}
