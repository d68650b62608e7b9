//! Admission gates shared by all classification tasks.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};

use crate::config::ConcurrencyConfig;

/// Bounds how many HTTP requests and external commands run at once, and
/// serialises bug-form viewing.
#[derive(Debug)]
pub struct Gates {
    http: Semaphore,
    commands: Semaphore,
    viewer: Mutex<()>,
    cooldown: Duration,
}

impl Gates {
    pub fn new(config: &ConcurrencyConfig) -> Self {
        Gates {
            http: Semaphore::new(config.http),
            commands: Semaphore::new(config.commands),
            viewer: Mutex::new(()),
            cooldown: Duration::from_millis(config.viewer_cooldown_ms),
        }
    }

    /// Run `fut` while holding an HTTP permit.
    pub async fn http<F: Future>(&self, fut: F) -> F::Output {
        // The semaphores are never closed, so acquire only fails on shutdown.
        let _permit = self.http.acquire().await.ok();
        fut.await
    }

    /// Run `fut` while holding a command permit.
    pub async fn command<F: Future>(&self, fut: F) -> F::Output {
        let _permit = self.commands.acquire().await.ok();
        fut.await
    }

    /// Run `fut` alone, then keep the gate closed for the cool-down.
    pub async fn viewer<F: Future>(&self, fut: F) -> F::Output {
        let _turn = self.viewer.lock().await;
        let out = fut.await;
        if !self.cooldown.is_zero() {
            tokio::time::sleep(self.cooldown).await;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fedora_clients::fakes::ConcurrencyGauge;
    use tokio::task::JoinSet;

    use super::*;

    fn gates(http: usize, commands: usize, cooldown_ms: u64) -> Arc<Gates> {
        Arc::new(Gates::new(&ConcurrencyConfig {
            http,
            commands,
            viewer_cooldown_ms: cooldown_ms,
        }))
    }

    #[tokio::test]
    async fn test_http_gate_bounds_parallelism() {
        let gates = gates(3, 1, 0);
        let gauge = Arc::new(ConcurrencyGauge::default());
        let mut set = JoinSet::new();
        for _ in 0..12 {
            let gates = Arc::clone(&gates);
            let gauge = Arc::clone(&gauge);
            set.spawn(async move {
                gates
                    .http(async {
                        let _g = gauge.enter();
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    })
                    .await
            });
        }
        while set.join_next().await.is_some() {}
        assert_eq!(gauge.peak(), 3);
        assert_eq!(gauge.current(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewer_gate_holds_cooldown() {
        let gates = gates(1, 1, 1000);
        let start = tokio::time::Instant::now();
        gates.viewer(async {}).await;
        gates.viewer(async {}).await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
