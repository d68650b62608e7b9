//! Bugzilla REST client
//!
//! Only one query is ever made: all bugs of a product that block the
//! tracking issue. Lookups happen afterwards on the returned list.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};
use crate::traits::{Bug, BugTracker};

/// Default Bugzilla instance
pub const BUGZILLA_URL: &str = "https://bugzilla.redhat.com";

/// Bugzilla configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugzillaConfig {
    /// Bugzilla base URL
    pub url: String,
    /// Product the tracking bugs are filed under
    pub product: String,
    /// API key (optional, only needed for private bugs)
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for BugzillaConfig {
    fn default() -> Self {
        BugzillaConfig {
            url: std::env::var("BUGZILLA_URL").unwrap_or_else(|_| BUGZILLA_URL.to_string()),
            product: "Fedora".to_string(),
            api_key: std::env::var("BUGZILLA_API_KEY").ok(),
        }
    }
}

impl BugzillaConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Base of the pre-filled bug submission form
    pub fn enter_bug_url(&self) -> String {
        format!("{}/enter_bug.cgi?", self.url.trim_end_matches('/'))
    }

    fn search_url(&self, tracker: u64) -> String {
        format!(
            "{}/rest/bug?blocks={}&product={}&include_fields=id,component,status,resolution",
            self.url.trim_end_matches('/'),
            tracker,
            url::form_urlencoded::byte_serialize(self.product.as_bytes()).collect::<String>()
        )
    }
}

#[derive(Debug, Deserialize)]
struct BugList {
    bugs: Vec<RestBug>,
}

#[derive(Debug, Deserialize)]
struct RestBug {
    id: u64,
    #[serde(default)]
    component: Vec<String>,
    status: String,
    #[serde(default)]
    resolution: String,
}

/// Turn a `/rest/bug` response into the tracker's bug list: duplicates
/// dropped, newest first.
pub fn parse_bug_list(body: &str) -> ClientResult<Vec<Bug>> {
    let list: BugList = serde_json::from_str(body)?;

    let mut bugs: Vec<Bug> = list
        .bugs
        .into_iter()
        .filter(|b| b.resolution != "DUPLICATE")
        .filter_map(|b| {
            let component = b.component.into_iter().next()?;
            Some(Bug {
                id: b.id,
                component,
                status: b.status,
                resolution: b.resolution,
            })
        })
        .collect();

    bugs.sort_by(|a, b| b.id.cmp(&a.id));
    Ok(bugs)
}

/// Bugzilla client for tracker queries
pub struct BugzillaClient {
    config: BugzillaConfig,
    http_client: reqwest::Client,
}

impl BugzillaClient {
    /// Create a new Bugzilla client whose requests give up after `timeout`
    pub fn new(config: BugzillaConfig, timeout: Duration) -> ClientResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(format!("ftbfs-monitor/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(BugzillaClient {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl BugTracker for BugzillaClient {
    async fn blocking_bugs(&self, tracker: u64) -> ClientResult<Vec<Bug>> {
        let url = self.config.search_url(tracker);
        debug!(url = %url, "bugzilla query");

        let mut request = self.http_client.get(&url);
        if let Some(key) = &self.config.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {}", key));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let bugs = parse_bug_list(&response.text().await?)?;
        info!(tracker, count = bugs.len(), "loaded tracker bugs");
        Ok(bugs)
    }
}
