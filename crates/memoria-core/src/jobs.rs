//! Background jobs: scheduled consolidation, validation, and session
//! sweeps.
//!
//! Jobs feed into the same serialized mutation path as foreground writes
//! (through the engine), are idempotent on re-run thanks to the
//! consolidation/validation record guards, and shut down cleanly via a
//! watch channel. Aborting mid-pass leaves the store consistent: the
//! consolidated memory and its links land atomically before sources are
//! pruned.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::MemoryEngine;
use crate::error::EngineResult;
use crate::validation::ValidationOptions;

/// Intervals for the scheduled passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobsConfig {
    pub consolidation_interval: Duration,
    pub validation_interval: Duration,
    pub session_sweep_interval: Duration,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            consolidation_interval: Duration::from_secs(3600),
            validation_interval: Duration::from_secs(1800),
            session_sweep_interval: Duration::from_secs(600),
        }
    }
}

/// Handle over the spawned background tasks.
pub struct BackgroundJobs {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundJobs {
    /// Spawn the periodic passes.
    pub fn spawn(engine: Arc<MemoryEngine>, config: JobsConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        let mut handles = Vec::new();

        handles.push(Self::spawn_loop(
            "consolidation",
            config.consolidation_interval,
            shutdown.subscribe(),
            {
                let engine = engine.clone();
                move || {
                    let engine = engine.clone();
                    async move { engine.consolidate_defaults().await.map(|_| ()) }
                }
            },
        ));

        handles.push(Self::spawn_loop(
            "validation",
            config.validation_interval,
            shutdown.subscribe(),
            {
                let engine = engine.clone();
                move || {
                    let engine = engine.clone();
                    async move {
                        engine
                            .validate(&ValidationOptions::default())
                            .await
                            .map(|_| ())
                    }
                }
            },
        ));

        handles.push(Self::spawn_loop(
            "session_sweep",
            config.session_sweep_interval,
            shutdown.subscribe(),
            {
                let engine = engine.clone();
                move || {
                    let engine = engine.clone();
                    async move { engine.sweep_sessions().await.map(|_| ()) }
                }
            },
        ));

        Self { shutdown, handles }
    }

    fn spawn_loop<F, Fut>(
        name: &'static str,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
        run: F,
    ) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = EngineResult<()>> + Send,
    {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // the first tick fires immediately; skip it so startup stays quiet
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        debug!(event = "jobs.tick", job = name);
                        if let Err(e) = run().await {
                            warn!(event = "jobs.pass_failed", job = name, error = %e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            debug!(event = "jobs.stopped", job = name);
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Signal shutdown and wait for all loops to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use memoria_store::{HashEmbedder, InMemoryStore};

    fn engine() -> Arc<MemoryEngine> {
        Arc::new(MemoryEngine::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(HashEmbedder::default()),
            EngineConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_jobs_start_and_shut_down() {
        let jobs = BackgroundJobs::spawn(engine(), JobsConfig::default());
        jobs.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_run_passes_without_error() {
        let jobs = BackgroundJobs::spawn(
            engine(),
            JobsConfig {
                consolidation_interval: Duration::from_millis(50),
                validation_interval: Duration::from_millis(50),
                session_sweep_interval: Duration::from_millis(50),
            },
        );
        // advance virtual time past several periods
        tokio::time::sleep(Duration::from_millis(200)).await;
        jobs.shutdown().await;
    }
}
