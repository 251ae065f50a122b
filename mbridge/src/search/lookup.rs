//! Remote address lookup service
//!
//! [`AddressLookup`] is the external collaborator the throttle calls at most
//! once per settled query. Two implementations:
//! - [`HttpAddressLookup`]: JSON suggestion endpoint over HTTP
//! - [`CannedAddressLookup`]: deterministic offline suggestions

use async_trait::async_trait;
use mbridge_common::{Error, Result, Suggestion, SuggestionKind};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Path of the suggestion endpoint relative to the service base URL
pub const SUGGESTIONS_PATH: &str = "domains/suggestions";

/// Number of suggestions requested per lookup
pub const DEFAULT_QUANTITY: u32 = 20;

/// Remote service suggesting addresses for a query
#[async_trait]
pub trait AddressLookup: Send + Sync {
    async fn lookup(&self, query: &str, kind: SuggestionKind) -> Result<Vec<Suggestion>>;
}

/// Suggestion service reached over HTTP
///
/// `GET <base>/domains/suggestions?query=..&kind=..&quantity=..` returning a
/// JSON array of suggestions.
pub struct HttpAddressLookup {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpAddressLookup {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// Parse a base URL, making sure relative joins keep its last path segment
fn parse_base_url(base_url: &str) -> Result<Url> {
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };
    Url::parse(&normalized)
        .map_err(|e| Error::Config(format!("Invalid lookup URL {:?}: {}", base_url, e)))
}

/// Full request URL for one lookup
pub fn suggestions_url(base_url: &Url, query: &str, kind: SuggestionKind) -> Result<Url> {
    let mut url = base_url
        .join(SUGGESTIONS_PATH)
        .map_err(|e| Error::Config(format!("Invalid lookup URL: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("query", query)
        .append_pair("kind", kind.as_str())
        .append_pair("quantity", &DEFAULT_QUANTITY.to_string());
    Ok(url)
}

#[async_trait]
impl AddressLookup for HttpAddressLookup {
    async fn lookup(&self, query: &str, kind: SuggestionKind) -> Result<Vec<Suggestion>> {
        let url = suggestions_url(&self.base_url, query, kind)?;
        debug!("Lookup: GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Lookup(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Lookup(format!("Suggestion service returned {}", status)));
        }

        response
            .json::<Vec<Suggestion>>()
            .await
            .map_err(|e| Error::Lookup(format!("Malformed suggestion response: {}", e)))
    }
}

/// Offline lookup producing suggestions derived from the query
pub struct CannedAddressLookup {
    /// Domain suffixes offered for every query
    suffixes: Vec<String>,
}

impl CannedAddressLookup {
    pub fn new(suffixes: Vec<String>) -> Self {
        Self { suffixes }
    }

    fn suffixes_for(&self, kind: SuggestionKind) -> Vec<&str> {
        let mut suffixes: Vec<&str> = self.suffixes.iter().map(String::as_str).collect();
        match kind {
            SuggestionKind::DotComOnly => {}
            SuggestionKind::IncludeDotBlog => suffixes.push("blog"),
            SuggestionKind::CustomDomains => suffixes.extend(["com", "net", "org"]),
        }
        suffixes
    }
}

impl Default for CannedAddressLookup {
    fn default() -> Self {
        Self::new(vec!["example.site".to_string()])
    }
}

/// Lowercase ASCII alphanumerics of the query, the rest removed
pub fn slugify(query: &str) -> String {
    query
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[async_trait]
impl AddressLookup for CannedAddressLookup {
    async fn lookup(&self, query: &str, kind: SuggestionKind) -> Result<Vec<Suggestion>> {
        let slug = slugify(query);
        if slug.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .suffixes_for(kind)
            .into_iter()
            .map(|suffix| Suggestion {
                domain_name: format!("{}.{}", slug, suffix),
                is_free: kind != SuggestionKind::CustomDomains,
            })
            .collect())
    }
}
