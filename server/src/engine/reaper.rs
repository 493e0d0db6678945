use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::chat_engine::ChatEngine;

/// Periodic task that reclaims channels which are empty and have been quiet
/// for the engine's idle window.
pub struct IdleReaper {
    engine: Arc<ChatEngine>,
    period: Duration,
}

impl IdleReaper {
    pub fn new(engine: Arc<ChatEngine>, period: Duration) -> Self {
        Self { engine, period }
    }

    /// Run a single sweep now. Returns the evicted channel names.
    pub fn tick(&self) -> Vec<String> {
        let evicted = self.engine.sweep_idle(Utc::now());
        if evicted.is_empty() {
            debug!("idle sweep found nothing to evict");
        } else {
            info!(count = evicted.len(), "idle sweep evicted channels");
        }
        evicted
    }

    /// Sweep every `period` until the token is cancelled. The first sweep
    /// happens one full period after start.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.period);
            ticker.tick().await; // consume first immediate tick

            info!(period_secs = self.period.as_secs(), "idle reaper started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("idle reaper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.tick();
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::chat_engine::EngineSettings;
    use chrono::TimeDelta;

    #[test]
    fn test_tick_evicts_stale_channel() {
        let engine = Arc::new(ChatEngine::default());
        engine.seed_empty_channel("acme", Utc::now() - TimeDelta::hours(2));
        engine.seed_empty_channel("recent", Utc::now());

        let reaper = IdleReaper::new(engine.clone(), Duration::from_secs(3600));
        assert_eq!(reaper.tick(), vec!["acme".to_string()]);
        assert_eq!(engine.list_channels(), vec!["recent".to_string()]);
    }

    #[tokio::test]
    async fn test_spawned_reaper_sweeps_and_stops() {
        let engine = Arc::new(ChatEngine::new(EngineSettings {
            idle_window: Duration::ZERO,
            ..EngineSettings::default()
        }));
        let (watcher, mut rx) = engine.connect();
        engine.seed_empty_channel("acme", Utc::now());

        let cancel = CancellationToken::new();
        let handle = IdleReaper::new(engine.clone(), Duration::from_millis(20)).spawn(cancel.clone());

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("reaper should tick")
            .expect("receiver open");
        assert_eq!(
            event,
            crate::engine::events::ChatEvent::GroupRemoved {
                company: "acme".into()
            }
        );
        assert!(engine.list_channels().is_empty());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("reaper should stop")
            .unwrap();
        engine.disconnect(watcher);
    }
}
