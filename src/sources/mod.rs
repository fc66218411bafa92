pub mod http_json;
pub mod mock;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::{normalize_key, SOURCE_TIMEOUT_SECS};
use crate::error::{AppError, Result, SourceError};
use crate::types::RawListing;

pub use http_json::HttpJsonSource;
pub use mock::MockSource;

/// One external listing provider. Extraction details stay behind this trait.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Search the provider. Returns a finite list or fails as a whole.
    async fn search(&self, term: &str) -> std::result::Result<Vec<RawListing>, SourceError>;

    /// Upper bound on one `search` call. Each source sets its own.
    fn timeout(&self) -> Duration {
        Duration::from_secs(SOURCE_TIMEOUT_SECS)
    }
}

/// Adapters keyed by a stable, lowercase string, kept in registration order.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    entries: Vec<(String, Arc<dyn SourceAdapter>)>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering an existing key replaces its adapter and keeps its position.
    pub fn register(&mut self, key: &str, adapter: Arc<dyn SourceAdapter>) {
        let key = normalize_key(key);
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = adapter,
            None => self.entries.push((key, adapter)),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve requested keys to adapters.
    ///
    /// An empty request means every registered adapter. Either way the result is
    /// in registration order, whatever order the keys were requested in; unknown
    /// and repeated keys are skipped. Fails with `NoValidSources` when nothing
    /// resolves.
    pub fn resolve(&self, keys: &[String]) -> Result<Vec<(String, Arc<dyn SourceAdapter>)>> {
        let resolved: Vec<(String, Arc<dyn SourceAdapter>)> = if keys.is_empty() {
            self.entries.clone()
        } else {
            let requested: Vec<String> = keys
                .iter()
                .map(|k| normalize_key(k))
                .filter(|k| !k.is_empty())
                .collect();
            for key in &requested {
                if !self.entries.iter().any(|(k, _)| k == key) {
                    warn!(source = %key, "Unknown store key: {key}");
                }
            }
            self.entries
                .iter()
                .filter(|(k, _)| requested.contains(k))
                .map(|(k, adapter)| (k.clone(), Arc::clone(adapter)))
                .collect()
        };

        if resolved.is_empty() {
            return Err(AppError::NoValidSources);
        }
        Ok(resolved)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Stub adapters shared by the aggregator and scheduler tests.

    use super::*;
    use std::sync::Mutex;

    /// Returns whatever listings are currently loaded; replaceable between runs.
    pub struct FixedSource {
        listings: Mutex<Vec<RawListing>>,
    }

    impl FixedSource {
        pub fn new(listings: Vec<RawListing>) -> Arc<Self> {
            Arc::new(Self { listings: Mutex::new(listings) })
        }

        pub fn set(&self, listings: Vec<RawListing>) {
            if let Ok(mut l) = self.listings.lock() {
                *l = listings;
            }
        }
    }

    #[async_trait]
    impl SourceAdapter for FixedSource {
        async fn search(&self, _term: &str) -> std::result::Result<Vec<RawListing>, SourceError> {
            Ok(self.listings.lock().map(|l| l.clone()).unwrap_or_default())
        }
    }

    pub struct FailingSource;

    #[async_trait]
    impl SourceAdapter for FailingSource {
        async fn search(&self, _term: &str) -> std::result::Result<Vec<RawListing>, SourceError> {
            Err(SourceError::Other("blocked by anti-bot page".to_string()))
        }
    }

    pub struct SlowSource {
        pub delay: Duration,
        pub timeout: Duration,
    }

    #[async_trait]
    impl SourceAdapter for SlowSource {
        async fn search(&self, term: &str) -> std::result::Result<Vec<RawListing>, SourceError> {
            tokio::time::sleep(self.delay).await;
            Ok(vec![listing(term, 1.0, "https://slow.example.com/p/1")])
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }
    }

    pub struct PanickingSource;

    #[async_trait]
    impl SourceAdapter for PanickingSource {
        async fn search(&self, _term: &str) -> std::result::Result<Vec<RawListing>, SourceError> {
            panic!("selector returned nothing");
        }
    }

    pub fn listing(name: &str, price: f64, url: &str) -> RawListing {
        RawListing {
            display_name: name.to_string(),
            price: Some(price),
            currency: Some("MXN".to_string()),
            canonical_url: url.to_string(),
            image_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FailingSource, FixedSource};
    use super::*;

    fn registry() -> SourceRegistry {
        let mut r = SourceRegistry::new();
        r.register("MercadoLibre", FixedSource::new(vec![]));
        r.register("cyberpuerta", Arc::new(FailingSource));
        r.register("mock_a", FixedSource::new(vec![]));
        r
    }

    #[test]
    fn empty_request_resolves_all_in_registration_order() {
        let keys: Vec<String> = registry()
            .resolve(&[])
            .expect("resolves")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["mercadolibre", "cyberpuerta", "mock_a"]);
    }

    #[test]
    fn unknown_keys_are_skipped() {
        let keys: Vec<String> = registry()
            .resolve(&["nope".to_string(), " MOCK_A ".to_string(), "mock_a".to_string()])
            .expect("resolves")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["mock_a"]);
    }

    #[test]
    fn subset_keeps_registration_order() {
        let keys: Vec<String> = registry()
            .resolve(&["mock_a".to_string(), "mercadolibre".to_string()])
            .expect("resolves")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["mercadolibre", "mock_a"]);
    }

    #[test]
    fn only_unknown_keys_is_no_valid_sources() {
        let err = registry().resolve(&["amazon".to_string(), "ebay".to_string()]).err();
        assert!(matches!(err, Some(AppError::NoValidSources)));
    }

    #[test]
    fn empty_registry_is_no_valid_sources() {
        assert!(matches!(SourceRegistry::new().resolve(&[]), Err(AppError::NoValidSources)));
    }

    #[test]
    fn re_registering_keeps_position() {
        let mut r = registry();
        r.register("mercadolibre", Arc::new(FailingSource));
        assert_eq!(r.keys(), vec!["mercadolibre", "cyberpuerta", "mock_a"]);
        assert_eq!(r.len(), 3);
    }
}
