use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::api::latency::SourceLatency;
use crate::error::{AppError, Result, SourceError};
use crate::sources::SourceAdapter;
use crate::types::RawListing;

/// Settlement of one adapter invocation.
#[derive(Debug)]
pub struct SourceOutcome {
    pub key: String,
    /// Wall time of the invocation; zero when the task panicked.
    pub elapsed: Duration,
    pub result: std::result::Result<Vec<RawListing>, SourceError>,
}

/// Runs every resolved adapter on its own task and waits for all of them.
///
/// A slow, failing or panicking adapter only ever affects its own slot. Each
/// invocation is bounded by the adapter's own `timeout()`; expiry settles that
/// slot as `SourceError::Timeout`. Nothing is retried.
#[derive(Clone, Default)]
pub struct FanOutExecutor {
    latency: Option<Arc<SourceLatency>>,
}

impl FanOutExecutor {
    pub fn new(latency: Arc<SourceLatency>) -> Self {
        Self { latency: Some(latency) }
    }

    /// Outcomes come back in the order of `adapters`.
    ///
    /// Only fails when the runtime cancels a task out from under us, which leaves
    /// the settlement set incomplete.
    pub async fn fan_out(
        &self,
        term: &str,
        adapters: Vec<(String, Arc<dyn SourceAdapter>)>,
    ) -> Result<Vec<SourceOutcome>> {
        let (keys, handles): (Vec<String>, Vec<_>) = adapters
            .into_iter()
            .map(|(key, adapter)| {
                let term = term.to_string();
                (key, tokio::spawn(async move { invoke(adapter, term).await }))
            })
            .unzip();

        let joined = join_all(handles).await;

        let mut outcomes = Vec::with_capacity(keys.len());
        for (key, joined) in keys.into_iter().zip(joined) {
            let (elapsed, result) = match joined {
                Ok(settled) => settled,
                Err(e) if e.is_panic() => {
                    warn!(source = %key, "Scraper for {key} panicked: {e}");
                    (Duration::ZERO, Err(SourceError::Panicked(e.to_string())))
                }
                Err(e) => {
                    return Err(AppError::Orchestration(format!(
                        "task for source {key} did not settle: {e}"
                    )))
                }
            };

            if let Some(latency) = &self.latency {
                if !elapsed.is_zero() {
                    latency.record(&key, elapsed);
                }
            }
            debug!(
                source = %key,
                elapsed_ms = elapsed.as_millis() as u64,
                ok = result.is_ok(),
                "Source {key} settled in {}ms",
                elapsed.as_millis(),
            );
            outcomes.push(SourceOutcome { key, elapsed, result });
        }
        Ok(outcomes)
    }
}

async fn invoke(
    adapter: Arc<dyn SourceAdapter>,
    term: String,
) -> (Duration, std::result::Result<Vec<RawListing>, SourceError>) {
    let limit = adapter.timeout();
    let started = Instant::now();
    let result = match tokio::time::timeout(limit, adapter.search(&term)).await {
        Ok(r) => r,
        Err(_) => Err(SourceError::Timeout(limit.as_millis())),
    };
    (started.elapsed(), result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::{listing, FailingSource, FixedSource, PanickingSource, SlowSource};

    fn fixed(url: &str) -> Arc<dyn SourceAdapter> {
        FixedSource::new(vec![listing("hub", 10.0, url)])
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_others() {
        let adapters: Vec<(String, Arc<dyn SourceAdapter>)> = vec![
            ("x".to_string(), fixed("https://x.example.com/1")),
            ("broken".to_string(), Arc::new(FailingSource)),
            ("y".to_string(), fixed("https://y.example.com/1")),
        ];

        let outcomes = FanOutExecutor::default().fan_out("hub", adapters).await.expect("settles");

        let keys: Vec<&str> = outcomes.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["x", "broken", "y"]);
        assert_eq!(outcomes[0].result.as_ref().map(|l| l.len()).ok(), Some(1));
        assert!(outcomes[1].result.is_err());
        assert_eq!(outcomes[2].result.as_ref().map(|l| l.len()).ok(), Some(1));
    }

    #[tokio::test]
    async fn timeout_is_per_source() {
        let adapters: Vec<(String, Arc<dyn SourceAdapter>)> = vec![
            (
                "slow".to_string(),
                Arc::new(SlowSource {
                    delay: Duration::from_secs(30),
                    timeout: Duration::from_millis(50),
                }),
            ),
            (
                "patient".to_string(),
                Arc::new(SlowSource {
                    delay: Duration::from_millis(100),
                    timeout: Duration::from_secs(5),
                }),
            ),
        ];

        let started = Instant::now();
        let outcomes = FanOutExecutor::default().fan_out("hub", adapters).await.expect("settles");

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(outcomes[0].result, Err(SourceError::Timeout(50))));
        assert!(outcomes[1].result.is_ok());
    }

    #[tokio::test]
    async fn panic_settles_as_failure() {
        let adapters: Vec<(String, Arc<dyn SourceAdapter>)> = vec![
            ("boom".to_string(), Arc::new(PanickingSource)),
            ("x".to_string(), fixed("https://x.example.com/1")),
        ];

        let outcomes = FanOutExecutor::default().fan_out("hub", adapters).await.expect("settles");

        assert!(matches!(outcomes[0].result, Err(SourceError::Panicked(_))));
        assert!(outcomes[1].result.is_ok());
    }

    #[tokio::test]
    async fn records_latency_per_source() {
        let latency = Arc::new(SourceLatency::new());
        let adapters: Vec<(String, Arc<dyn SourceAdapter>)> = vec![(
            "patient".to_string(),
            Arc::new(SlowSource {
                delay: Duration::from_millis(10),
                timeout: Duration::from_secs(5),
            }),
        )];

        FanOutExecutor::new(Arc::clone(&latency))
            .fan_out("hub", adapters)
            .await
            .expect("settles");

        assert_eq!(latency.len("patient"), 1);
        assert_eq!(latency.len("other"), 0);
    }
}
