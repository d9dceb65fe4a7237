//! OS signal handling.
//!
//! SIGINT / SIGTERM trigger graceful shutdown. SIGHUP re-reads the routes
//! file and rescans templates without restarting.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::watcher::{routes_event, ReloadEvent};
use crate::lifecycle::shutdown::Shutdown;

/// Spawn the signal loop. It exits once shutdown has been triggered.
pub fn spawn_signal_handlers(
    shutdown: Shutdown,
    reload_tx: mpsc::UnboundedSender<ReloadEvent>,
    routes_file: Option<PathBuf>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut term, mut hup) = match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
                (Ok(term), Ok(hup)) => (term, hup),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::error!(error = %e, "Failed to install signal handlers, using Ctrl+C only");
                    ctrl_c(&shutdown).await;
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("SIGINT received");
                        shutdown.trigger();
                        return;
                    }
                    _ = term.recv() => {
                        tracing::info!("SIGTERM received");
                        shutdown.trigger();
                        return;
                    }
                    _ = hup.recv() => {
                        tracing::info!("SIGHUP received, reloading routes and templates");
                        request_reload(&reload_tx, routes_file.as_deref());
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = (&reload_tx, &routes_file);
            ctrl_c(&shutdown).await;
        }
    })
}

async fn ctrl_c(shutdown: &Shutdown) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Ctrl+C received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
    }
    shutdown.trigger();
}

/// Queue a full reload: routes (when a file is configured) then templates.
pub fn request_reload(reload_tx: &mpsc::UnboundedSender<ReloadEvent>, routes_file: Option<&std::path::Path>) {
    if let Some(event) = routes_file.and_then(routes_event) {
        let _ = reload_tx.send(event);
    }
    let _ = reload_tx.send(ReloadEvent::Templates);
}
