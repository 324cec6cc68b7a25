// SPDX-License-Identifier: MIT

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::opsflow::workflow::WorkflowCoordinator;

/// Runs the coordinator on a fixed interval until shutdown
pub struct Scheduler {
    coordinator: Arc<WorkflowCoordinator>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(coordinator: Arc<WorkflowCoordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    /// Run, sleep, repeat. A run in flight is always finished; shutdown is
    /// only observed while sleeping. Returns the number of completed cycles.
    pub async fn run<F>(&self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut cycles = 0;

        loop {
            let result = self.coordinator.run_workflow().await;
            cycles += 1;
            match &result.error {
                None => log::info!("Cycle {} completed in {:.2}s", cycles, result.duration),
                Some(e) => log::warn!("Cycle {} failed: {}", cycles, e),
            }

            log::info!("Next run in {}s", self.interval.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => {
                    log::info!("Shutdown requested, stopping scheduler");
                    break;
                }
            }
        }

        cycles
    }
}
