//! Periodic nonce sweep.
//!
//! Runs [`NonceRegistry::sweep_expired`] on a fixed interval in a background
//! task, decoupled from request handling. The task is owned by a
//! [`NonceSweeper`] handle and stops promptly when the service shuts down.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::registry::NonceRegistry;

/// Handle to the background sweep task.
///
/// Dropping the handle does not stop the task; call [`NonceSweeper::shutdown`]
/// during service teardown to stop it and wait for completion.
#[allow(missing_debug_implementations)] // TaskTracker doesn't impl Debug
pub struct NonceSweeper {
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl NonceSweeper {
    /// Spawns the sweep loop on the current runtime.
    #[must_use]
    pub fn spawn(registry: Arc<NonceRegistry>, interval: Duration) -> Self {
        let cancellation_token = CancellationToken::new();
        let task_tracker = TaskTracker::new();

        let token = cancellation_token.clone();
        task_tracker.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = registry.sweep_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "Swept expired nonce records");
                        }
                    }
                }
            }
        });
        task_tracker.close();

        Self {
            task_tracker,
            cancellation_token,
        }
    }

    /// Stops the sweep loop and waits for the task to finish.
    pub async fn shutdown(self) {
        self.cancellation_token.cancel();
        self.task_tracker.wait().await;
    }
}
