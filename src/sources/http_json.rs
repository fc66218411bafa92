use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::SourceError;
use crate::sources::SourceAdapter;
use crate::types::RawListing;

/// Queries a JSON search endpoint: `GET {endpoint}?q={term}`.
///
/// The response is either a top-level array of items or an object carrying the
/// items under `results` (MercadoLibre's public search API shape). Field names
/// vary between providers so each field accepts a few aliases.
pub struct HttpJsonSource {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpJsonSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }
}

#[async_trait]
impl SourceAdapter for HttpJsonSource {
    async fn search(&self, term: &str) -> Result<Vec<RawListing>, SourceError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", term)])
            .send()
            .await?
            .error_for_status()?;
        let body: serde_json::Value = resp.json().await?;

        let items = match body.as_array() {
            Some(a) => a,
            None => body
                .get("results")
                .and_then(|r| r.as_array())
                .ok_or_else(|| {
                    SourceError::Response(format!("{} returned neither an array nor `results`", self.endpoint))
                })?,
        };

        let listings: Vec<RawListing> = items.iter().filter_map(parse_item).collect();
        debug!(
            endpoint = %self.endpoint,
            items = items.len(),
            parsed = listings.len(),
            "JSON source returned {} items for \"{term}\"",
            items.len(),
        );
        Ok(listings)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn first_str<'a>(v: &'a serde_json::Value, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .find_map(|f| v.get(*f).and_then(|x| x.as_str()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Parse one item. Items without a URL are skipped here; everything else is
/// passed through and judged by the reconciler's validity check.
fn parse_item(v: &serde_json::Value) -> Option<RawListing> {
    let url = first_str(v, &["permalink", "url", "canonical_url", "link"])?;
    let display_name = first_str(v, &["title", "name", "display_name"])
        .unwrap_or("")
        .to_string();

    let price = v.get("price").and_then(|p| {
        p.as_f64()
            .or_else(|| p.as_str().and_then(parse_price_text))
    });

    let currency = first_str(v, &["currency_id", "currency"]).map(|s| s.to_string());
    let image_url = first_str(v, &["thumbnail", "image", "image_url"]).map(|s| s.to_string());

    Some(RawListing {
        display_name,
        price,
        currency,
        canonical_url: canonicalize_url(url),
        image_url,
    })
}

/// `"$1,299.00"` → 1299.0. Strips everything but digits, `.` and `-`.
pub fn parse_price_text(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Scheme + host + path. Tracking query strings and fragments change between
/// scrapes and would otherwise split one offer into many listings. Unparseable
/// input is returned unchanged.
pub fn canonicalize_url(raw: &str) -> String {
    match url::Url::parse(raw.trim()) {
        Ok(mut u) => {
            u.set_query(None);
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => raw.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn price_text_parsing() {
        assert_eq!(parse_price_text("$1,299.00"), Some(1299.0));
        assert_eq!(parse_price_text(" 250 "), Some(250.0));
        assert_eq!(parse_price_text("N/A"), None);
    }

    #[test]
    fn canonical_url_drops_query_and_fragment() {
        assert_eq!(
            canonicalize_url("https://articulo.mercadolibre.com.mx/MLM-123-hub?tracking_id=abc#reviews"),
            "https://articulo.mercadolibre.com.mx/MLM-123-hub"
        );
        assert_eq!(canonicalize_url("not a url"), "not a url");
    }

    #[tokio::test]
    async fn parses_results_object_with_aliases() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "usb hub"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {
                        "title": "USB Hub 4 puertos",
                        "price": 299.5,
                        "currency_id": "MXN",
                        "permalink": "https://shop.example.com/p/hub-4?ref=search",
                        "thumbnail": "https://img.example.com/hub-4.jpg"
                    },
                    { "name": "USB Hub 7", "price": "$1,050.00", "url": "https://shop.example.com/p/hub-7" },
                    { "title": "no url", "price": 10 }
                ]
            })))
            .mount(&server)
            .await;

        let source = HttpJsonSource::new(format!("{}/search", server.uri()), Duration::from_secs(5))
            .expect("client builds");
        let listings = source.search("usb hub").await.expect("search succeeds");

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].display_name, "USB Hub 4 puertos");
        assert_eq!(listings[0].price, Some(299.5));
        assert_eq!(listings[0].currency.as_deref(), Some("MXN"));
        assert_eq!(listings[0].canonical_url, "https://shop.example.com/p/hub-4");
        assert_eq!(listings[0].image_url.as_deref(), Some("https://img.example.com/hub-4.jpg"));
        assert_eq!(listings[1].price, Some(1050.0));
        assert_eq!(listings[1].currency, None);
    }

    #[tokio::test]
    async fn server_error_is_a_source_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpJsonSource::new(server.uri(), Duration::from_secs(5)).expect("client builds");
        assert!(matches!(source.search("hub").await, Err(SourceError::Http(_))));
    }

    #[tokio::test]
    async fn unexpected_shape_is_a_source_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] })))
            .mount(&server)
            .await;

        let source = HttpJsonSource::new(server.uri(), Duration::from_secs(5)).expect("client builds");
        assert!(matches!(source.search("hub").await, Err(SourceError::Response(_))));
    }
}
