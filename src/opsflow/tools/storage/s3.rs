// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use super::sigv4::{self, SigningRequest};
use super::ObjectStore;
use crate::kit::{OpsflowError, Result, StorageError};
use crate::opsflow::config::AwsCredentials;

/// S3 (or S3-compatible) object store using signed `PUT` requests.
///
/// Without a custom endpoint, objects go to the virtual-hosted AWS URL
/// `https://<bucket>.s3.<region>.amazonaws.com/<key>`; with one (MinIO,
/// LocalStack), path-style `<endpoint>/<bucket>/<key>` is used.
pub struct S3Store {
    client: Client,
    region: String,
    endpoint: Option<Url>,
    credentials: Option<AwsCredentials>,
}

impl S3Store {
    pub fn new(
        region: impl Into<String>,
        endpoint: Option<&str>,
        credentials: Option<AwsCredentials>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = endpoint
            .map(|e| {
                Url::parse(e)
                    .map_err(|err| OpsflowError::config(format!("Invalid S3_ENDPOINT {}: {}", e, err)))
            })
            .transpose()?;

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            region: region.into(),
            endpoint,
            credentials,
        })
    }

    pub fn object_url(&self, bucket: &str, key: &str) -> Result<Url> {
        let encoded_key = sigv4::uri_encode_key(key);
        let raw = match &self.endpoint {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.as_str().trim_end_matches('/'),
                sigv4::uri_encode_segment(bucket),
                encoded_key
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                bucket, self.region, encoded_key
            ),
        };
        Url::parse(&raw).map_err(|e| StorageError::InvalidCommand(e.to_string()).into())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn backend(&self) -> &str {
        "s3"
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| StorageError::MissingCredentials("s3".to_string()))?;

        let url = self.object_url(bucket, key)?;
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{}:{}", h, p),
            (Some(h), None) => h.to_string(),
            (None, _) => return Err(StorageError::InvalidCommand(format!("No host in {}", url)).into()),
        };
        let payload_hash = sigv4::sha256_hex(&body);

        let headers = sigv4::sign(&SigningRequest {
            method: "PUT",
            host: &host,
            canonical_uri: url.path(),
            payload_hash: &payload_hash,
            region: &self.region,
            service: "s3",
            access_key_id: &credentials.access_key_id,
            secret_access_key: &credentials.secret_access_key,
            session_token: credentials.session_token.as_deref(),
            time: Utc::now(),
        })?;

        let mut req = self
            .client
            .put(url.clone())
            .header("content-type", "application/json")
            .body(body);
        for (name, value) in headers {
            req = req.header(name, value);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Rejected { status, body }.into());
        }

        log::debug!("Uploaded s3://{}/{}", bucket, key);
        Ok(())
    }
}
