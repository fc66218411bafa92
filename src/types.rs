use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Adapter output
// ---------------------------------------------------------------------------

/// One offer as a source adapter reports it. Not yet validated or tagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub display_name: String,
    /// None when the source had no parseable price.
    pub price: Option<f64>,
    /// None when the source did not report one; the configured default applies.
    pub currency: Option<String>,
    pub canonical_url: String,
    pub image_url: Option<String>,
}

impl RawListing {
    /// Non-empty name, finite positive price, absolute http(s) URL with a host.
    pub fn is_valid(&self) -> bool {
        !self.display_name.trim().is_empty()
            && self.price.is_some_and(|p| p.is_finite() && p > 0.0)
            && is_absolute_url(&self.canonical_url)
    }

    /// Attach the source key. Returns None for listings failing `is_valid`.
    pub fn into_listing(self, source_key: &str, default_currency: &str) -> Option<Listing> {
        if !self.is_valid() {
            return None;
        }
        let price = self.price?;
        let currency = self
            .currency
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| default_currency.to_string());
        Some(Listing {
            display_name: self.display_name.trim().to_string(),
            price,
            currency,
            source_key: source_key.to_string(),
            canonical_url: self.canonical_url.trim().to_string(),
            image_url: self.image_url.filter(|u| !u.trim().is_empty()),
        })
    }
}

pub fn is_absolute_url(s: &str) -> bool {
    match url::Url::parse(s.trim()) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Reconciled listing
// ---------------------------------------------------------------------------

/// A validated listing tagged with its source. This is what the on-demand
/// search returns and what the scheduler persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub display_name: String,
    pub price: f64,
    pub currency: String,
    pub source_key: String,
    pub canonical_url: String,
    pub image_url: Option<String>,
}
