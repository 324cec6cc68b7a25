// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

use crate::kit::{OpsflowError, Result};

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Destination for rendered metrics
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn push(&self, job: &str, payload: &str) -> Result<()>;
}

/// Prometheus Pushgateway client. Replaces all metrics of the job on push.
pub struct PushGateway {
    client: Client,
    base_url: String,
}

impl PushGateway {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = url.trim().trim_end_matches('/');
        let base_url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url,
        })
    }

    pub fn endpoint(&self, job: &str) -> String {
        format!("{}/metrics/job/{}", self.base_url, job)
    }
}

#[async_trait]
impl MetricsSink for PushGateway {
    async fn push(&self, job: &str, payload: &str) -> Result<()> {
        let resp = self
            .client
            .put(self.endpoint(job))
            .header(CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)
            .body(payload.to_string())
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(OpsflowError::api(
                "pushgateway",
                format!("{}: {}", status, text),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_adds_scheme() {
        let gateway = PushGateway::new("pushgateway:9091/", Duration::from_secs(30)).unwrap();
        assert_eq!(
            gateway.endpoint("workflow_coordinator"),
            "http://pushgateway:9091/metrics/job/workflow_coordinator"
        );
    }

    #[test]
    fn test_endpoint_keeps_https() {
        let gateway = PushGateway::new("https://push.example.com", Duration::from_secs(30)).unwrap();
        assert_eq!(
            gateway.endpoint("job"),
            "https://push.example.com/metrics/job/job"
        );
    }

    #[tokio::test]
    async fn test_push_times_out_when_gateway_never_replies() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold connections without ever writing a response
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let gateway =
            PushGateway::new(&format!("http://{}", addr), Duration::from_millis(200)).unwrap();
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            gateway.push("workflow_coordinator", "workflow_total_executions 1\n"),
        )
        .await;

        let push_result = outcome.expect("push should give up before the outer deadline");
        assert!(push_result.is_err());
        server.abort();
    }
}
