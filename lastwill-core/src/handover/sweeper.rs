use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::service::{HandoverService, StopSignal};
use super::store::HandoverStore;

/// A spawned sweep loop and the signal that ends it.
struct SweepRun {
    stop: StopSignal,
    handle: JoinHandle<()>,
}

/// Runs the handover sweep on a fixed interval until stopped.
pub struct InactivitySweeper<S: HandoverStore + 'static> {
    service: Arc<HandoverService<S>>,
    interval: Duration,
    run: Mutex<Option<SweepRun>>,
}

impl<S: HandoverStore + 'static> InactivitySweeper<S> {
    pub fn new(service: Arc<HandoverService<S>>, interval: Duration) -> Self {
        Self {
            service,
            interval,
            run: Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.run
            .lock()
            .await
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    /// Spawn the sweep loop. The first sweep runs immediately.
    ///
    /// Returns `false` if a loop is already running.
    pub async fn start(&self) -> bool {
        let mut run = self.run.lock().await;
        if run.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            warn!("Inactivity sweeper already running");
            return false;
        }

        info!("Starting inactivity sweeper with {:?} interval", self.interval);

        let service = self.service.clone();
        let interval = self.interval;
        // Fresh per run
        let stop = StopSignal::new();
        let loop_stop = stop.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Overlapping ticks are safe but pointless
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = loop_stop.requested() => {
                        debug!("Inactivity sweeper stopping");
                        break;
                    }
                }

                if loop_stop.is_requested() {
                    break;
                }
                service.run_once_with(&loop_stop).await;
            }
        });

        *run = Some(SweepRun { stop, handle });
        true
    }

    /// Stop the loop and wait for it to exit. An in-flight sweep finishes its
    /// current user first.
    pub async fn stop(&self) {
        // Held until the loop is gone so a concurrent start cannot overlap it
        let mut run = self.run.lock().await;
        let Some(SweepRun { stop, handle }) = run.take() else {
            return;
        };

        stop.request();
        if let Err(e) = handle.await {
            error!("Inactivity sweeper task failed: {}", e);
        }
        debug!("Inactivity sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::handover::process::HandoverStatus;
    use crate::handover::settings::InactivitySettings;
    use crate::handover::store::MemoryStore;
    use chrono::Utc;

    fn inactive_user(user_id: &str) -> InactivitySettings {
        let long_ago = Utc::now() - chrono::Duration::days(365);
        InactivitySettings::new(user_id, &Settings::default(), long_ago)
    }

    #[tokio::test]
    async fn test_sweeper_runs_and_stops() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_settings(inactive_user("alice")).await.unwrap();

        let service = Arc::new(HandoverService::new(store.clone(), 7));
        let sweeper = InactivitySweeper::new(service.clone(), Duration::from_millis(10));

        assert!(sweeper.start().await);
        assert!(!sweeper.start().await);
        assert!(sweeper.is_running().await);

        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::time::timeout(Duration::from_secs(1), sweeper.stop())
            .await
            .unwrap();

        let process = service.current_process("alice").await.unwrap().unwrap();
        assert_eq!(process.status, HandoverStatus::GracePeriod);
        assert!(!sweeper.is_running().await);
    }

    #[tokio::test]
    async fn test_stop_interrupts_long_interval() {
        let service = Arc::new(HandoverService::new(Arc::new(MemoryStore::new()), 7));
        let sweeper = InactivitySweeper::new(service, Duration::from_secs(3600));

        assert!(sweeper.start().await);
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(1), sweeper.stop())
            .await
            .unwrap();
        assert!(!sweeper.is_running().await);
        // Stopping twice is harmless
        sweeper.stop().await;
    }

    #[tokio::test]
    async fn test_restart_after_stop_runs_single_loop() {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(HandoverService::new(store.clone(), 7));
        let sweeper = InactivitySweeper::new(service.clone(), Duration::from_millis(10));

        assert!(sweeper.start().await);
        tokio::time::timeout(Duration::from_secs(1), sweeper.stop())
            .await
            .unwrap();
        assert!(!sweeper.is_running().await);

        // Restart immediately; the old loop is already gone
        assert!(sweeper.start().await);
        assert!(sweeper.is_running().await);
        assert!(!sweeper.start().await);

        store.upsert_settings(inactive_user("bob")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(service.current_process("bob").await.unwrap().is_some());

        tokio::time::timeout(Duration::from_secs(1), sweeper.stop())
            .await
            .unwrap();
        assert!(!sweeper.is_running().await);
    }

    #[tokio::test]
    async fn test_service_stop_signal_does_not_affect_loop() {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(HandoverService::new(store.clone(), 7));
        service.stop_signal().request();

        let sweeper = InactivitySweeper::new(service.clone(), Duration::from_millis(10));
        assert!(sweeper.start().await);
        store.upsert_settings(inactive_user("carol")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(service.current_process("carol").await.unwrap().is_some());
        sweeper.stop().await;
    }
}
