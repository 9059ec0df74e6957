use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;

use crate::ports::catalog::CatalogClient;
use crate::ports::clock::Clock;
use crate::ports::radio::RadioSource;
use crate::services::sync::SyncService;

/// Runs sync cycles forever with a random pause between them.
pub struct Scheduler<C: CatalogClient, R: RadioSource> {
    sync: SyncService<C, R>,
    clock: Arc<dyn Clock>,
    min_sleep_minutes: u64,
    max_sleep_minutes: u64,
}

impl<C: CatalogClient, R: RadioSource> Scheduler<C, R> {
    pub fn new(
        sync: SyncService<C, R>,
        clock: Arc<dyn Clock>,
        min_sleep_minutes: u64,
        max_sleep_minutes: u64,
    ) -> Self {
        Self {
            sync,
            clock,
            min_sleep_minutes,
            max_sleep_minutes,
        }
    }

    /// Whole minutes in `[min, max)`; `min` when the range is empty.
    fn next_pause(&self) -> Duration {
        let minutes = if self.max_sleep_minutes > self.min_sleep_minutes {
            rand::rng().random_range(self.min_sleep_minutes..self.max_sleep_minutes)
        } else {
            self.min_sleep_minutes
        };
        Duration::from_secs(minutes * 60)
    }

    /// Loop until `shutdown` turns true. A cycle in flight always finishes;
    /// only the pause between cycles is cut short.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.sync.run_cycle().await {
                Ok(report) => report.log(),
                Err(error) => tracing::error!(error = ?error, "Sync cycle failed"),
            }

            let pause = self.next_pause();
            tracing::info!(minutes = pause.as_secs() / 60, "Sleeping until next cycle");
            tokio::select! {
                _ = self.clock.sleep(pause) => {}
                changed = shutdown.changed() => {
                    // A dropped sender means nobody can wake us, so stop too.
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::ports::catalog::MockCatalogClient;
    use crate::ports::radio::MockRadioSource;
    use crate::services::retry::RetrySettings;
    use crate::services::sync::SyncSettings;
    use crate::test_utils::track_list;
    use color_eyre::eyre::eyre;

    /// Requests shutdown after the given number of pauses.
    struct StoppingClock {
        pauses: Mutex<Vec<Duration>>,
        stop_after: usize,
        shutdown: watch::Sender<bool>,
    }

    #[async_trait::async_trait]
    impl Clock for StoppingClock {
        async fn sleep(&self, duration: Duration) {
            let mut pauses = self.pauses.lock().unwrap();
            pauses.push(duration);
            if pauses.len() >= self.stop_after {
                self.shutdown.send_replace(true);
            }
        }
    }

    fn settings(dir: &tempfile::TempDir) -> SyncSettings {
        SyncSettings {
            channels: vec!["groovesalad".to_string()],
            mapping_path: dir.path().join("mapping.json"),
            search_delay: Duration::from_millis(250),
            retry: RetrySettings {
                max_retries: 0,
                min_delay: Duration::from_secs(1),
            },
        }
    }

    #[tokio::test]
    async fn test_runs_cycles_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (sender, receiver) = watch::channel(false);
        let clock = Arc::new(StoppingClock {
            pauses: Mutex::new(Vec::new()),
            stop_after: 2,
            shutdown: sender,
        });

        let fetches = Arc::new(AtomicUsize::new(0));
        let counter = fetches.clone();
        let mut radio = MockRadioSource::new();
        radio.expect_fetch().returning(move |channel| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(track_list(channel, "Groove Salad", &[]))
        });

        let sync = SyncService::new(
            MockCatalogClient::new(),
            radio,
            clock.clone(),
            settings(&dir),
        );
        let scheduler = Scheduler::new(sync, clock.clone(), 5, 20);
        scheduler.run(receiver).await;

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        let pauses = clock.pauses.lock().unwrap().clone();
        assert_eq!(pauses.len(), 2);
        for pause in pauses {
            assert!(pause >= Duration::from_secs(5 * 60));
            assert!(pause < Duration::from_secs(20 * 60));
            assert_eq!(pause.as_secs() % 60, 0);
        }
    }

    #[tokio::test]
    async fn test_failed_cycle_does_not_stop_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (sender, receiver) = watch::channel(false);
        let clock = Arc::new(StoppingClock {
            pauses: Mutex::new(Vec::new()),
            stop_after: 2,
            shutdown: sender,
        });

        let mut radio = MockRadioSource::new();
        radio
            .expect_fetch()
            .times(2)
            .returning(|_| Err(eyre!("Failed to parse song history")));

        let sync = SyncService::new(
            MockCatalogClient::new(),
            radio,
            clock.clone(),
            settings(&dir),
        );
        Scheduler::new(sync, clock.clone(), 1, 2).run(receiver).await;

        assert_eq!(
            clock.pauses.lock().unwrap().clone(),
            vec![Duration::from_secs(60), Duration::from_secs(60)]
        );
    }

    #[tokio::test]
    async fn test_shutdown_before_start_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (sender, receiver) = watch::channel(true);
        let clock = Arc::new(StoppingClock {
            pauses: Mutex::new(Vec::new()),
            stop_after: 1,
            shutdown: sender,
        });

        let mut radio = MockRadioSource::new();
        radio.expect_fetch().never();

        let sync = SyncService::new(
            MockCatalogClient::new(),
            radio,
            clock.clone(),
            settings(&dir),
        );
        Scheduler::new(sync, clock.clone(), 5, 20).run(receiver).await;

        assert!(clock.pauses.lock().unwrap().is_empty());
    }
}
