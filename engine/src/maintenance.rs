//! Periodic housekeeping: expired challenges and queue gauges.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::orchestrator::IssuanceOrchestrator;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaintenancePass {
    pub purged_challenges: usize,
    pub pending_reconciliation: usize,
}

pub struct MaintenanceWorker {
    engine: Arc<IssuanceOrchestrator>,
    interval: Duration,
}

impl MaintenanceWorker {
    pub fn new(engine: Arc<IssuanceOrchestrator>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    pub fn run_once(&self) -> MaintenancePass {
        let purged_challenges = self.engine.purge_expired_challenges();
        self.engine.refresh_reconciliation_depth();
        MaintenancePass {
            purged_challenges,
            pending_reconciliation: self.engine.reconciliation_queue().pending_count(),
        }
    }

    /// Run passes every `interval` until shutdown.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("maintenance worker shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let pass = self.run_once();
                    if pass.purged_challenges > 0 {
                        tracing::info!(purged = pass.purged_challenges, "purged expired challenges");
                    }
                    tracing::debug!(pending = pass.pending_reconciliation, "reconciliation backlog");
                }
            }
        }
    }
}
