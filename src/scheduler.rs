use std::time::Duration;

use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use crate::mapper::PortMapper;
use crate::preferences::PreferencesApi;
use crate::reconciler::{CycleOutcome, Reconciler};

/// Runs a mapping cycle every `interval` until `cancel` fires.
///
/// Cancellation is only checked between cycles, so a cycle that already
/// started always runs to its end. The wait between cycles is cut short
/// as soon as the token is cancelled.
pub async fn run<P, M>(
    reconciler: &Reconciler<P, M>,
    interval: Duration,
    cancel: &CancellationToken,
) where
    P: PreferencesApi,
    M: PortMapper,
{
    loop {
        if cancel.is_cancelled() {
            info!("Received signal, exiting...");
            return;
        }

        match reconciler.run_cycle().await {
            CycleOutcome::Completed {
                port,
                ip,
                ports_disagree,
            } => debug!(
                "Mapping cycle finished: port={:?} ip={:?} ports_disagree={}",
                port, ip, ports_disagree
            ),
            CycleOutcome::Aborted => debug!("Mapping cycle aborted"),
        }

        info!("Sleeping for {} seconds.", interval.as_secs());
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Resolves on SIGINT or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    r = tokio::signal::ctrl_c() => {
                        if let Err(e) = r {
                            error!("Unable to listen for shutdown signal: {}", e);
                        }
                    }
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => {
                error!("Unable to listen for SIGTERM: {}", e);
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {}", e);
    }
}

/// Cancels `cancel` once a shutdown signal arrives.
pub fn spawn_shutdown_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel.cancel();
    })
}
