// SPDX-License-Identifier: MIT

pub mod logs;
pub mod prometheus;
pub mod storage;

use std::sync::Arc;

use crate::kit::{Result, Tool};
use crate::opsflow::config::{CoordinatorConfig, StoreKind};
use crate::opsflow::metrics::{MetricsSink, PushGateway};

use self::logs::LogAnalyticsTool;
use self::prometheus::PrometheusQueryTool;
use self::storage::{FilesystemStore, ObjectStorageTool, ObjectStore, S3Store};

/// Collaborators the coordinator calls out to
#[derive(Clone)]
pub struct Toolset {
    pub logs: Arc<dyn Tool>,
    pub prometheus: Arc<dyn Tool>,
    pub storage: Arc<ObjectStorageTool>,
    pub metrics_sink: Arc<dyn MetricsSink>,
}

impl Toolset {
    pub fn new(
        logs: Arc<dyn Tool>,
        prometheus: Arc<dyn Tool>,
        storage: Arc<ObjectStorageTool>,
        metrics_sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            logs,
            prometheus,
            storage,
            metrics_sink,
        }
    }

    /// Wire up the production tools from configuration
    pub fn from_config(config: &CoordinatorConfig) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match config.object_store {
            StoreKind::S3 => {
                if config.credentials.is_none() {
                    log::warn!("AWS credentials not set; report uploads will fail");
                }
                Arc::new(S3Store::new(
                    config.aws_region.clone(),
                    config.s3_endpoint.as_deref(),
                    config.credentials.clone(),
                    config.http_timeout,
                )?)
            }
            StoreKind::Filesystem => Arc::new(FilesystemStore::new(config.object_store_root())),
        };
        log::info!("Using {} object store", store.backend());

        Ok(Self {
            logs: Arc::new(LogAnalyticsTool::new(config.log_directory.clone())),
            prometheus: Arc::new(PrometheusQueryTool::new(
                &config.prometheus_url,
                config.query_timeout,
            )?),
            storage: Arc::new(ObjectStorageTool::new(store)),
            metrics_sink: Arc::new(PushGateway::new(
                &config.pushgateway_url,
                config.http_timeout,
            )?),
        })
    }
}
