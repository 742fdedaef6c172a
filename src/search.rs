//! Web research client with on-disk caching
//!
//! Tavily-backed search behind the `SearchProvider` seam. Results are
//! cached per query hash; a missing credential degrades to empty results
//! rather than an error.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::NewsletterError;
use crate::models::ResearchResult;
use crate::Result;

const RETRY_ATTEMPTS: usize = 2;

/// Trait for ranked web research (order = collaborator's relevance order).
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<ResearchResult>>;
}

/// Read-through research cache: one JSON file per distinct query, named by
/// a content hash of the query string. `put` is best-effort by contract --
/// failures are logged and never fatal.
pub struct ResearchCache {
    dir: PathBuf,
}

impl ResearchCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, query: &str) -> PathBuf {
        let digest = Sha256::digest(query.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    pub fn get(&self, query: &str) -> Option<Vec<ResearchResult>> {
        let path = self.path_for(query);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(results) => Some(results),
            Err(e) => {
                warn!(path = %path.display(), "Discarding unreadable cache entry: {}", e);
                None
            }
        }
    }

    pub fn put(&self, query: &str, results: &[ResearchResult]) {
        if let Err(e) = self.try_put(query, results) {
            warn!("Research cache write failed: {}", e);
        }
    }

    fn try_put(&self, query: &str, results: &[ResearchResult]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(query);
        // Write-then-rename so a concurrent reader never sees a torn file.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(results)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Tavily search client with simple on-disk caching.
pub struct TavilySearch {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    max_results: usize,
    cache: ResearchCache,
}

impl TavilySearch {
    pub fn new(settings: &Settings) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key: settings.tavily_api_key.clone(),
            endpoint: settings.tavily_endpoint.clone(),
            max_results: settings.tavily_max_results,
            cache: ResearchCache::new(settings.cache_dir.clone()),
        }
    }

    async fn fetch_remote(&self, api_key: &str, query: &str) -> Result<Vec<ResearchResult>> {
        let payload = json!({
            "api_key": api_key,
            "query": query,
            "search_depth": "basic",
            "include_answer": true,
            "topic": "news",
            "include_raw_content": true,
            "max_results": self.max_results,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                NewsletterError::transient_fetch(format!("Tavily request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(NewsletterError::transient_fetch(format!(
                "Tavily returned {}",
                response.status()
            )));
        }

        // A body that does not decode is not worth retrying.
        let body: TavilyResponse = response.json().await.map_err(|e| {
            NewsletterError::fatal_fetch(format!("Invalid Tavily response: {}", e))
        })?;

        let results = body
            .results
            .into_iter()
            .take(self.max_results)
            .filter_map(|item| {
                item.url.map(|url| ResearchResult {
                    url,
                    title: item.title.filter(|t| !t.is_empty()),
                    content: item.content.filter(|c| !c.is_empty()),
                })
            })
            .collect();

        Ok(results)
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<ResearchResult>> {
        if let Some(cached) = self.cache.get(query) {
            debug!(results = cached.len(), "Research cache hit");
            return Ok(cached);
        }

        let api_key = match &self.api_key {
            Some(key) => key,
            None => {
                warn!(
                    query = %query,
                    "No TAVILY_API_KEY set; returning empty results"
                );
                return Ok(Vec::new());
            }
        };

        let strategy = ExponentialBackoff::from_millis(2)
            .factor(500)
            .max_delay(Duration::from_secs(8))
            .take(RETRY_ATTEMPTS);

        let results = RetryIf::spawn(
            strategy,
            || self.fetch_remote(api_key, query),
            |e: &NewsletterError| e.is_transient(),
        )
        .await?;

        debug!(query = %query, results = results.len(), "Research fetched");
        self.cache.put(query, &results);

        Ok(results)
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyItem>,
}

#[derive(Debug, Deserialize)]
struct TavilyItem {
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
}
