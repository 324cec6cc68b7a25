// SPDX-License-Identifier: MIT

use crate::kit::{Result, Tool};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Runs PromQL instant queries against a Prometheus server
pub struct PrometheusQueryTool {
    client: Client,
    base_url: String,
}

impl PrometheusQueryTool {
    pub fn new(prometheus_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: prometheus_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn query_url(&self) -> String {
        format!("{}/api/v1/query", self.base_url)
    }
}

#[async_trait]
impl Tool for PrometheusQueryTool {
    fn name(&self) -> &str {
        "prometheus_query"
    }

    fn description(&self) -> &str {
        "Query Prometheus metrics using PromQL."
    }

    /// Returns the API response as pretty JSON. A non-2xx response is not an
    /// error: it comes back as `{"status": "error", "error": ...}`.
    async fn run(&self, query: &str) -> Result<String> {
        log::debug!("Executing query: {}", query);

        let resp = self
            .client
            .get(self.query_url())
            .query(&[("query", query)])
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Ok(json!({
                "status": "error",
                "error": format!("Error querying Prometheus: {}", text),
            })
            .to_string());
        }

        let body: Value = resp.json().await?;
        Ok(serde_json::to_string_pretty(&body)?)
    }
}
