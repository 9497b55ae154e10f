use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::config::DigestConfig;
use crate::digest::{DigestService, DigestTarget};

/// Events emitted by the scheduler after each run
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A global digest finished
    DigestCompleted { locations: Vec<String>, stored: usize },
    /// A scheduled digest failed
    Error { task: String, message: String },
}

/// Background scheduler that runs a global digest on an interval
pub struct SchedulerService {
    digest: Arc<DigestService>,
    interval_secs: u64,
    sample: usize,
    event_tx: Option<mpsc::UnboundedSender<SchedulerEvent>>,
}

impl SchedulerService {
    pub fn new(digest: Arc<DigestService>, config: &DigestConfig) -> Self {
        Self {
            digest,
            interval_secs: config.schedule_interval_secs,
            sample: config.global_sample_size,
            event_tx: None,
        }
    }

    /// Set the event sender for run notifications
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, event: SchedulerEvent) {
        if let Some(ref tx) = self.event_tx {
            if tx.send(event).is_err() {
                warn!("Failed to send scheduler event: receiver dropped");
            }
        }
    }

    async fn run_digest(&self) {
        debug!("Running scheduled global digest");
        match self
            .digest
            .run(DigestTarget::Global { sample: self.sample }, false)
            .await
        {
            Ok(report) => {
                info!(
                    "Scheduled digest: {} articles from {}",
                    report.articles.len(),
                    report.locations.join(", ")
                );
                self.send_event(SchedulerEvent::DigestCompleted {
                    stored: report.articles.len(),
                    locations: report.locations,
                });
            }
            Err(e) => {
                error!("Scheduled digest failed: {}", e);
                self.send_event(SchedulerEvent::Error {
                    task: "digest".to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    /// Run the digest loop until the shutdown signal flips to `true`
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if self.interval_secs == 0 {
            info!("Background scheduler disabled (schedule_interval_secs = 0)");
            // Still wait for shutdown
            let _ = shutdown.changed().await;
            return;
        }

        info!(
            "Scheduler started: global digest of {} cities every {}s",
            self.sample, self.interval_secs
        );

        let mut digest_interval = tokio::time::interval(Duration::from_secs(self.interval_secs));

        // Skip the first tick (fires immediately)
        digest_interval.tick().await;

        loop {
            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                }

                _ = digest_interval.tick() => {
                    self.run_digest().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{CompletionModel, ContentClassifier};
    use crate::config::AppConfig;
    use crate::geo::{Geocoder, Place};
    use crate::news::{Coordinates, Story, StoryFetcher, StoryPage, StoryQuery, StorySource};
    use crate::retry::RetryPolicy;
    use crate::storage::Database;
    use crate::Result;

    struct OneStory;

    #[async_trait::async_trait]
    impl StorySource for OneStory {
        async fn page(&self, query: &StoryQuery, _cursor: Option<&str>) -> Result<StoryPage> {
            Ok(StoryPage {
                stories: vec![Story {
                    title: format!("Good news from {}", query.entity),
                    body: String::new(),
                    published_at: None,
                    permalink: None,
                    source_name: None,
                }],
                next_cursor: None,
            })
        }
    }

    struct AlwaysPositive;

    #[async_trait::async_trait]
    impl CompletionModel for AlwaysPositive {
        async fn complete(&self, system: &str, _prompt: &str) -> Result<String> {
            Ok(if system.contains("sentiment") { "positive" } else { "no" }.to_string())
        }
    }

    struct NoGeocoder;

    #[async_trait::async_trait]
    impl Geocoder for NoGeocoder {
        async fn reverse(&self, _coords: Coordinates) -> Result<Option<Place>> {
            Ok(None)
        }
    }

    async fn digest_service() -> Arc<DigestService> {
        let config = AppConfig::default();
        let db = Database::new_in_memory().await.unwrap();
        Arc::new(DigestService::new(
            &config,
            db,
            StoryFetcher::new(Arc::new(OneStory), RetryPolicy::default()),
            ContentClassifier::new(Arc::new(AlwaysPositive)),
            Arc::new(NoGeocoder),
            None,
        ))
    }

    #[tokio::test]
    async fn test_runs_digest_on_tick_until_shutdown() {
        let config = DigestConfig {
            schedule_interval_secs: 1,
            global_sample_size: 2,
            ..DigestConfig::default()
        };
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler =
            SchedulerService::new(digest_service().await, &config).with_event_sender(event_tx);

        let handle = tokio::spawn(scheduler.run(shutdown_rx));

        match event_rx.recv().await.unwrap() {
            SchedulerEvent::DigestCompleted { locations, stored } => {
                assert_eq!(locations.len(), 2);
                assert_eq!(stored, 2);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_scheduler_waits_for_shutdown() {
        let config = DigestConfig::default();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = SchedulerService::new(digest_service().await, &config);

        let handle = tokio::spawn(scheduler.run(shutdown_rx));
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
