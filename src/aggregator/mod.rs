pub mod fanout;
pub mod reconciler;

use std::sync::Arc;

use tracing::info;

use crate::error::{AppError, Result};
use crate::sources::SourceRegistry;
use crate::types::Listing;

pub use fanout::FanOutExecutor;
pub use reconciler::Reconciler;

/// Registry → fan-out → reconcile. Read-only with respect to the store; the
/// scheduler runs the same pipeline before persisting.
#[derive(Clone)]
pub struct Aggregator {
    registry: Arc<SourceRegistry>,
    executor: FanOutExecutor,
    reconciler: Reconciler,
}

impl Aggregator {
    pub fn new(registry: Arc<SourceRegistry>, executor: FanOutExecutor, reconciler: Reconciler) -> Self {
        Self {
            registry,
            executor,
            reconciler,
        }
    }

    pub fn source_keys(&self) -> Vec<String> {
        self.registry.keys()
    }

    /// Merged, ordered listings for `term` across `sources` (empty = all).
    ///
    /// Individual source failures are absorbed. Errors are a blank term,
    /// `NoValidSources`, or an orchestration failure of the fan-out itself.
    pub async fn search(&self, term: &str, sources: &[String]) -> Result<Vec<Listing>> {
        let term = term.trim();
        if term.is_empty() {
            return Err(AppError::Validation("Product name is required".to_string()));
        }

        let adapters = self.registry.resolve(sources)?;
        let keys: Vec<&str> = adapters.iter().map(|(k, _)| k.as_str()).collect();
        info!(query = %term, sources = ?keys, "Searching for \"{term}\" across {}", keys.join(", "));

        let outcomes = self.executor.fan_out(term, adapters).await?;
        Ok(self.reconciler.reconcile(term, outcomes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::{listing, FailingSource, FixedSource};

    fn aggregator() -> Aggregator {
        let mut registry = SourceRegistry::new();
        registry.register(
            "x",
            FixedSource::new(vec![
                listing("hub b", 30.0, "https://x.example.com/b"),
                listing("hub a", 20.0, "https://x.example.com/a"),
            ]),
        );
        registry.register("broken", std::sync::Arc::new(FailingSource));
        registry.register("y", FixedSource::new(vec![listing("hub y", 5.0, "https://y.example.com/1")]));
        Aggregator::new(
            Arc::new(registry),
            FanOutExecutor::default(),
            Reconciler::new(vec!["x".to_string()], "MXN"),
        )
    }

    #[tokio::test]
    async fn failing_source_is_absorbed() {
        let merged = aggregator().search("usb hub", &[]).await.expect("search succeeds");
        let urls: Vec<&str> = merged.iter().map(|l| l.canonical_url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://x.example.com/a", "https://x.example.com/b", "https://y.example.com/1"]
        );
    }

    #[tokio::test]
    async fn subset_of_sources() {
        let merged = aggregator().search("usb hub", &["y".to_string(), "ghost".to_string()]).await.expect("search succeeds");
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source_key, "y");
    }

    #[tokio::test]
    async fn unranked_sources_keep_registration_order_for_any_request_order() {
        let mut registry = SourceRegistry::new();
        registry.register("mock_a", FixedSource::new(vec![listing("hub a", 90.0, "http://mocka.example.com/1")]));
        registry.register("mock_b", FixedSource::new(vec![listing("hub b", 10.0, "http://mockb.example.com/1")]));
        let aggregator = Aggregator::new(
            Arc::new(registry),
            FanOutExecutor::default(),
            Reconciler::new(vec!["ml".to_string()], "MXN"),
        );

        let sources = |merged: Vec<Listing>| merged.into_iter().map(|l| l.source_key).collect::<Vec<_>>();
        let all = aggregator.search("hub", &[]).await.expect("search succeeds");
        let subset = aggregator
            .search("hub", &["mock_b".to_string(), "mock_a".to_string()])
            .await
            .expect("search succeeds");
        assert_eq!(sources(all), vec!["mock_a", "mock_b"]);
        assert_eq!(sources(subset), vec!["mock_a", "mock_b"]);
    }

    #[tokio::test]
    async fn blank_term_and_unknown_sources_are_client_errors() {
        assert!(matches!(aggregator().search("  ", &[]).await, Err(AppError::Validation(_))));
        assert!(matches!(
            aggregator().search("hub", &["ghost".to_string()]).await,
            Err(AppError::NoValidSources)
        ));
    }
}
