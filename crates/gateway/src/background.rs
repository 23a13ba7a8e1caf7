//! Background processor for periodic tasks.
//!
//! Currently runs the usage reconciliation sweep on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use crate::reconcile::Reconciler;

/// Configuration for the background processor.
#[derive(Debug, Clone)]
pub struct BackgroundConfig {
    /// Whether the periodic reconciliation sweep runs.
    pub enable_reconciliation: bool,
    /// How often to sweep (default: 1 hour).
    pub reconcile_interval: Duration,
    /// Overwrite drifted counters instead of only reporting them.
    pub repair_drift: bool,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            enable_reconciliation: false,
            reconcile_interval: Duration::from_secs(3600),
            repair_drift: true,
        }
    }
}

/// Background processor for periodic gateway tasks.
pub struct BackgroundProcessor {
    config: BackgroundConfig,
    reconciler: Arc<Reconciler>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl BackgroundProcessor {
    pub fn new(
        config: BackgroundConfig,
        reconciler: Arc<Reconciler>,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            config,
            reconciler,
            shutdown_rx,
        }
    }

    /// Run the background processor until shutdown is signaled.
    pub async fn run(&mut self) {
        info!(
            reconciliation = self.config.enable_reconciliation,
            "background processor starting"
        );

        let mut reconcile_interval = interval(self.config.reconcile_interval);
        reconcile_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so startup does not
        // trigger a full sweep.
        reconcile_interval.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("background processor received shutdown signal");
                    break;
                }
                _ = reconcile_interval.tick(), if self.config.enable_reconciliation => {
                    if let Err(e) = self.reconciler.sweep(self.config.repair_drift).await {
                        error!(error = %e, "error running reconciliation sweep");
                    }
                }
            }
        }

        info!("background processor stopped");
    }
}

/// Builder for creating a background processor.
pub struct BackgroundProcessorBuilder {
    config: BackgroundConfig,
    reconciler: Option<Arc<Reconciler>>,
}

impl BackgroundProcessorBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: BackgroundConfig::default(),
            reconciler: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: BackgroundConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn reconciler(mut self, reconciler: Arc<Reconciler>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    /// Build the background processor.
    ///
    /// Returns the processor and a shutdown sender.
    pub fn build(self) -> Result<(BackgroundProcessor, mpsc::Sender<()>), &'static str> {
        let reconciler = self.reconciler.ok_or("reconciler is required")?;
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        Ok((
            BackgroundProcessor::new(self.config, reconciler, shutdown_rx),
            shutdown_tx,
        ))
    }
}

impl Default for BackgroundProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
