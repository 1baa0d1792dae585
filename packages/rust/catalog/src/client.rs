//! HTTP client for the catalog JSON API.
//!
//! Only three endpoints are used:
//! - `GET /masters/{id}/versions?per_page=&page=`: the collection listing
//! - `GET /releases/{id}`: per-member detail (tracklist, year)
//! - `GET /masters/{id}`: the parent's own year

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use mastertable_shared::{
    ApiConfig, MasterTableError, MemberId, MemberRecord, ParentId, Result,
};

/// User-Agent string for API requests. The API refuses requests without one.
const USER_AGENT: &str = concat!("MasterTable/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One page of `GET /masters/{id}/versions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionsPage {
    #[serde(default)]
    pub versions: Vec<VersionEntry>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Pagination block returned alongside a listing page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub items: u64,
}

/// A single listed version.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl VersionEntry {
    /// Convert to a pending record. Missing strings become empty.
    pub fn into_record(self) -> MemberRecord {
        MemberRecord::listed(
            MemberId(self.id),
            self.title.unwrap_or_default(),
            self.country.unwrap_or_default(),
        )
    }
}

/// The subset of `GET /releases/{id}` this tool reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseDetail {
    #[serde(default)]
    pub tracklist: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub year: Option<serde_json::Value>,
}

impl ReleaseDetail {
    /// Number of tracklist entries, 0 when the field is missing.
    pub fn track_count(&self) -> u32 {
        self.tracklist
            .as_ref()
            .map(|t| u32::try_from(t.len()).unwrap_or(u32::MAX))
            .unwrap_or(0)
    }

    pub fn year(&self) -> Option<String> {
        self.year.as_ref().and_then(normalize_year)
    }
}

/// The subset of `GET /masters/{id}` this tool reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MasterSummary {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<serde_json::Value>,
}

impl MasterSummary {
    pub fn year(&self) -> Option<String> {
        self.year.as_ref().and_then(normalize_year)
    }
}

/// Years arrive as numbers or strings; `0` and blanks mean "unknown".
fn normalize_year(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => match n.as_u64() {
            Some(0) | None => None,
            Some(y) => Some(y.to_string()),
        },
        serde_json::Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && s != "0").then(|| s.to_string())
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// CatalogClient
// ---------------------------------------------------------------------------

/// Thin wrapper over `reqwest` bound to one API root.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: Url,
}

impl CatalogClient {
    /// Build a client from the `[api]` config section.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| {
            MasterTableError::config(format!("invalid api base_url '{}': {e}", config.base_url))
        })?;

        let user_agent = config.user_agent.as_deref().unwrap_or(USER_AGENT);
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MasterTableError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// API root every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch one listing page (1-based).
    pub async fn fetch_versions_page(
        &self,
        parent: ParentId,
        page: u32,
        per_page: u32,
    ) -> Result<VersionsPage> {
        let mut url = self.endpoint(&format!("masters/{parent}/versions"))?;
        url.query_pairs_mut()
            .append_pair("per_page", &per_page.to_string())
            .append_pair("page", &page.to_string());
        self.get_json(url).await
    }

    /// Fetch the detail document for a single member.
    pub async fn fetch_release(&self, id: MemberId) -> Result<ReleaseDetail> {
        let url = self.endpoint(&format!("releases/{id}"))?;
        self.get_json(url).await
    }

    /// Fetch the parent entity itself.
    pub async fn fetch_master(&self, parent: ParentId) -> Result<MasterSummary> {
        let url = self.endpoint(&format!("masters/{parent}"))?;
        self.get_json(url).await
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| MasterTableError::validation(format!("bad endpoint '{path}': {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(%url, "GET");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| MasterTableError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MasterTableError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| MasterTableError::Network(format!("{url}: failed to read body: {e}")))?;

        serde_json::from_slice(&body)
            .map_err(|e| MasterTableError::parse(format!("{url}: invalid JSON: {e}")))
    }
}
