use std::time::Duration;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::sources::SourceAdapter;
use crate::types::RawListing;

/// Demo store that needs no network. Results are a pure function of the store
/// id and the search term: 0 to 2 variants priced between 50 and 250 MXN.
pub struct MockSource {
    id: String,
    delay: Duration,
    timeout: Duration,
}

impl MockSource {
    pub fn new(id: impl Into<String>, delay: Duration, timeout: Duration) -> Self {
        Self {
            id: id.into(),
            delay,
            timeout,
        }
    }
}

#[async_trait]
impl SourceAdapter for MockSource {
    async fn search(&self, term: &str) -> Result<Vec<RawListing>, SourceError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let seed = fnv1a(&format!("{}:{}", self.id, term.trim().to_lowercase()));
        let count = (seed % 3) as usize;
        let slug: String = term
            .trim()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();

        let listings = (0..count)
            .map(|i| {
                let variant = seed.rotate_left(17 * (i as u32 + 1));
                let cents = 5_000 + variant % 20_000;
                RawListing {
                    display_name: format!("{} - Variant {} (from {})", term.trim(), i + 1, self.id),
                    price: Some(cents as f64 / 100.0),
                    currency: Some("MXN".to_string()),
                    canonical_url: format!("http://mock{}.example.com/product/{}-{}", self.id, slug, i + 1),
                    image_url: Some(format!("https://via.placeholder.com/100?text={}+{}", self.id, i + 1)),
                }
            })
            .collect();
        Ok(listings)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
