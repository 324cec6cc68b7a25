// SPDX-License-Identifier: MIT

//! Coordinator configuration
//!
//! Read once from the environment (`.env` supported) and optionally
//! overridden by a YAML file. Credentials only ever come from the
//! environment.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::kit::{OpsflowError, Result};
use crate::opsflow::workflow::types::ExecutionMode;

/// A PromQL query collected by the monitoring step under `name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedQuery {
    pub name: String,
    pub query: String,
}

impl NamedQuery {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
        }
    }
}

static DEFAULT_QUERIES: Lazy<Vec<NamedQuery>> = Lazy::new(|| {
    vec![
        NamedQuery::new("node_metrics", "node_memory_MemAvailable_bytes"),
        NamedQuery::new("container_metrics", "container_memory_usage_bytes"),
        NamedQuery::new("up_status", "up"),
        NamedQuery::new("cadvisor_metrics", "container_cpu_usage_seconds_total"),
        NamedQuery::new(
            "anomaly_scores",
            r#"anomaly_score{metric="container_cpu_usage_seconds_total"} > 0.8"#,
        ),
    ]
});

/// Which object store backs the reporting step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    S3,
    Filesystem,
}

#[derive(Clone, PartialEq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub reports_dir: PathBuf,
    pub log_directory: PathBuf,
    pub prometheus_url: String,
    pub pushgateway_url: String,
    pub s3_bucket: Option<String>,
    pub aws_region: String,
    pub s3_endpoint: Option<String>,
    pub credentials: Option<AwsCredentials>,
    pub object_store: StoreKind,
    pub object_store_dir: Option<PathBuf>,
    pub mode: ExecutionMode,
    /// Re-run the failed step while the retry budget lasts (graph mode)
    pub retry_failed_steps: bool,
    pub interval: Duration,
    pub query_timeout: Duration,
    /// Request timeout for Pushgateway and object store calls
    pub http_timeout: Duration,
    pub queries: Vec<NamedQuery>,
    /// Pushgateway job label
    pub job_name: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from("/app/reports"),
            log_directory: PathBuf::from("/app/logs"),
            prometheus_url: "http://prometheus:9090".to_string(),
            pushgateway_url: "http://pushgateway:9091".to_string(),
            s3_bucket: None,
            aws_region: "us-east-1".to_string(),
            s3_endpoint: None,
            credentials: None,
            object_store: StoreKind::S3,
            object_store_dir: None,
            mode: ExecutionMode::Sequential,
            retry_failed_steps: false,
            interval: Duration::from_secs(300),
            query_timeout: Duration::from_secs(10),
            http_timeout: Duration::from_secs(30),
            queries: DEFAULT_QUERIES.clone(),
            job_name: "workflow_coordinator".to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Environment plus an optional YAML override file
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Some(path) = path {
            config.apply_file(path)?;
        }
        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("REPORTS_DIR") {
            config.reports_dir = PathBuf::from(v);
        }
        if let Some(v) = get("LOG_DIRECTORY") {
            config.log_directory = PathBuf::from(v);
        }
        if let Some(v) = get("PROMETHEUS_URL") {
            config.prometheus_url = v;
        }
        if let Some(v) = get("PUSHGATEWAY_URL") {
            config.pushgateway_url = v;
        }
        config.s3_bucket = get("S3_BUCKET_NAME");
        if let Some(v) = get("AWS_REGION") {
            config.aws_region = v;
        }
        config.s3_endpoint = get("S3_ENDPOINT");

        config.credentials = match (get("AWS_ACCESS_KEY_ID"), get("AWS_SECRET_ACCESS_KEY")) {
            (Some(access_key_id), Some(secret_access_key)) => Some(AwsCredentials {
                access_key_id,
                secret_access_key,
                session_token: get("AWS_SESSION_TOKEN"),
            }),
            (Some(_), None) | (None, Some(_)) => {
                log::warn!("Only one of AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY is set; ignoring both");
                None
            }
            (None, None) => None,
        };

        if let Some(v) = get("OBJECT_STORE") {
            config.object_store = parse_store_kind(&v)?;
        }
        config.object_store_dir = get("OBJECT_STORE_DIR").map(PathBuf::from);
        if let Some(v) = get("WORKFLOW_MODE") {
            config.mode = v.parse()?;
        }
        if let Some(v) = get("WORKFLOW_RETRY_FAILED_STEP") {
            config.retry_failed_steps = parse_bool("WORKFLOW_RETRY_FAILED_STEP", &v)?;
        }
        if let Some(v) = get("WORKFLOW_INTERVAL_SECS") {
            config.interval = parse_secs("WORKFLOW_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("PROMETHEUS_QUERY_TIMEOUT_SECS") {
            config.query_timeout = parse_secs("PROMETHEUS_QUERY_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("HTTP_TIMEOUT_SECS") {
            config.http_timeout = parse_secs("HTTP_TIMEOUT_SECS", &v)?;
        }

        Ok(config)
    }

    /// Apply a YAML override file on top of the current values
    pub fn apply_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OpsflowError::config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        let overrides = ConfigFile::parse_yaml(&content)?;
        overrides.apply(self)?;
        Ok(())
    }

    /// Directory the filesystem object store writes into
    pub fn object_store_root(&self) -> PathBuf {
        self.object_store_dir
            .clone()
            .unwrap_or_else(|| self.reports_dir.join("uploads"))
    }
}

/// YAML override file; every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub reports_dir: Option<PathBuf>,
    pub log_directory: Option<PathBuf>,
    pub prometheus_url: Option<String>,
    pub pushgateway_url: Option<String>,
    pub s3_bucket: Option<String>,
    pub aws_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub object_store: Option<StoreKind>,
    pub object_store_dir: Option<PathBuf>,
    pub mode: Option<ExecutionMode>,
    pub retry_failed_steps: Option<bool>,
    pub interval_secs: Option<u64>,
    pub query_timeout_secs: Option<u64>,
    pub http_timeout_secs: Option<u64>,
    pub queries: Option<Vec<NamedQuery>>,
    pub job_name: Option<String>,
}

impl ConfigFile {
    pub fn parse_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn apply(self, config: &mut CoordinatorConfig) -> Result<()> {
        if let Some(v) = self.reports_dir {
            config.reports_dir = v;
        }
        if let Some(v) = self.log_directory {
            config.log_directory = v;
        }
        if let Some(v) = self.prometheus_url {
            config.prometheus_url = v;
        }
        if let Some(v) = self.pushgateway_url {
            config.pushgateway_url = v;
        }
        if let Some(v) = self.s3_bucket {
            config.s3_bucket = Some(v);
        }
        if let Some(v) = self.aws_region {
            config.aws_region = v;
        }
        if let Some(v) = self.s3_endpoint {
            config.s3_endpoint = Some(v);
        }
        if let Some(v) = self.object_store {
            config.object_store = v;
        }
        if let Some(v) = self.object_store_dir {
            config.object_store_dir = Some(v);
        }
        if let Some(v) = self.mode {
            config.mode = v;
        }
        if let Some(v) = self.retry_failed_steps {
            config.retry_failed_steps = v;
        }
        if let Some(v) = self.interval_secs {
            config.interval = positive_secs("interval_secs", v)?;
        }
        if let Some(v) = self.query_timeout_secs {
            config.query_timeout = positive_secs("query_timeout_secs", v)?;
        }
        if let Some(v) = self.http_timeout_secs {
            config.http_timeout = positive_secs("http_timeout_secs", v)?;
        }
        if let Some(queries) = self.queries {
            if queries.is_empty() {
                return Err(OpsflowError::config("queries must not be empty"));
            }
            config.queries = queries;
        }
        if let Some(v) = self.job_name {
            config.job_name = v;
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(OpsflowError::config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    let secs = value.trim().parse::<u64>().map_err(|_| {
        OpsflowError::config(format!(
            "{} must be a whole number of seconds, got '{}'",
            key, value
        ))
    })?;
    positive_secs(key, secs)
}

fn positive_secs(key: &str, secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(OpsflowError::config(format!(
            "{} must be greater than zero",
            key
        )));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_store_kind(value: &str) -> Result<StoreKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "s3" => Ok(StoreKind::S3),
        "filesystem" | "fs" => Ok(StoreKind::Filesystem),
        other => Err(OpsflowError::config(format!(
            "Unknown OBJECT_STORE '{}'",
            other
        ))),
    }
}
