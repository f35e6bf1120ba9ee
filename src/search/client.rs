use crate::config::{Rotation, SearchConfig};
use crate::search::{InstanceError, SearchError, SearchHit, SearchInstance, SearchResult};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    url: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default, alias = "content")]
    snippet: String,
}

/// Failover-aware client over a pool of meta-search instances
///
/// Health state lives here and nowhere else. Once an instance is marked
/// unhealthy it is skipped for the rest of the process unless
/// [`SearchClient::reset_health`] is called.
pub struct SearchClient {
    http: Client,
    instances: Vec<SearchInstance>,
    timeout: Duration,
    failure_threshold: u32,
    rotation: Rotation,
    next_start: usize,
}

impl SearchClient {
    /// Builds the client and its instance pool from configuration
    pub fn new(config: &SearchConfig, user_agent: &str) -> Result<Self, SearchError> {
        let http = Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            http,
            instances: config
                .instances
                .iter()
                .map(SearchInstance::new)
                .collect(),
            timeout: Duration::from_secs(config.timeout_secs),
            failure_threshold: config.failure_threshold.max(1),
            rotation: config.rotation,
            next_start: 0,
        })
    }

    /// Overrides the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn instances(&self) -> &[SearchInstance] {
        &self.instances
    }

    pub fn healthy_count(&self) -> usize {
        self.instances.iter().filter(|i| i.healthy).count()
    }

    /// Marks every instance healthy again
    pub fn reset_health(&mut self) {
        for instance in &mut self.instances {
            instance.reset();
        }
        tracing::info!("Search instance health reset");
    }

    /// Runs `query` against the pool
    ///
    /// Healthy instances are tried in configured order (or round-robin); the
    /// first that answers wins. Every failure counts against its instance.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResult)` - The serving instance and its hits
    /// * `Err(SearchError::NoHealthyInstance)` - No instance answered
    pub async fn search(&mut self, query: &str) -> Result<SearchResult, SearchError> {
        let count = self.instances.len();
        let start = match self.rotation {
            Rotation::Fixed => 0,
            Rotation::RoundRobin => self.next_start,
        };
        let mut tried = 0;

        for offset in 0..count {
            let index = (start + offset) % count;
            if !self.instances[index].healthy {
                tracing::debug!(
                    "Skipping unhealthy instance {}",
                    self.instances[index].address
                );
                continue;
            }

            tried += 1;
            let address = self.instances[index].address.clone();
            tracing::info!("Trying search instance: {}", address);

            match self.query_instance(&address, query).await {
                Ok(hits) => {
                    self.instances[index].record_success();
                    self.next_start = (index + 1) % count;
                    tracing::info!("Search served by {} ({} results)", address, hits.len());
                    return Ok(SearchResult {
                        instance: address,
                        hits,
                    });
                }
                Err(error) => {
                    tracing::warn!("Search instance {} failed: {}", address, error);
                    if self.instances[index].record_failure(error, self.failure_threshold) {
                        tracing::warn!("Search instance {} marked unhealthy", address);
                    }
                }
            }
        }

        Err(SearchError::NoHealthyInstance { tried })
    }

    async fn query_instance(
        &self,
        address: &str,
        query: &str,
    ) -> Result<Vec<SearchHit>, InstanceError> {
        let response = self
            .http
            .get(address)
            .query(&[("q", query), ("format", "json")])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(InstanceError::classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(InstanceError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(InstanceError::classify)?;
        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| InstanceError::Malformed(e.to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .filter_map(|hit| {
                hit.url.map(|url| SearchHit {
                    url,
                    title: hit.title,
                    snippet: hit.snippet,
                })
            })
            .collect())
    }
}
