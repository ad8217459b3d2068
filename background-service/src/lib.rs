pub mod pipeline;

pub use pipeline::{collect_and_enrich, collect_once, enrich_once, CycleReport, SharedClassifier};

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use stocksent_core::{CoreError, ErrorExt, ErrorSeverity};
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Runs a job now and then every polling interval until shut down.
pub struct BackgroundService {
    polling_interval: Duration,
}

impl BackgroundService {
    pub fn new(polling_interval_minutes: u64) -> Self {
        Self::with_interval(Duration::from_secs(polling_interval_minutes * 60))
    }

    pub fn with_interval(polling_interval: Duration) -> Self {
        Self { polling_interval }
    }

    pub fn polling_interval(&self) -> Duration {
        self.polling_interval
    }

    /// Run until ctrl-c, returning the number of completed cycles.
    pub async fn start<F, Fut, T>(&self, cycle: F) -> Result<usize, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
        T: Display,
    {
        self.run_until(cycle, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run cycles until `shutdown` resolves.
    ///
    /// Failed cycles are logged and the schedule continues; a fatal error
    /// stops the service and is returned.
    pub async fn run_until<F, Fut, T, S>(&self, mut cycle: F, shutdown: S) -> Result<usize, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
        T: Display,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut completed = 0usize;

        info!(
            "Background service started, polling every {:?}",
            self.polling_interval
        );
        loop {
            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                outcome = cycle() => outcome,
            };

            match outcome {
                Ok(report) => {
                    completed += 1;
                    info!(cycle = completed, "Cycle finished: {}", report);
                }
                Err(e) if e.severity() == ErrorSeverity::Fatal => {
                    e.log_error();
                    return Err(e);
                }
                Err(e) => warn!("Cycle failed, retrying at next interval: {}", e),
            }

            info!("Waiting {:?} for next run...", self.polling_interval);
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = sleep(self.polling_interval) => {}
            }
        }

        info!(completed, "Background service stopped");
        Ok(completed)
    }
}
