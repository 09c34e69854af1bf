//! AWS SDK implementations of the service traits.

mod athena;
mod glue;
mod s3;
mod session;
mod sts;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

pub use athena::AthenaQueryService;
pub use glue::GlueCatalog;
pub use s3::S3ObjectStore;
pub use session::load_sdk_config;
pub use sts::StsIdentity;

use crate::config::AthenaConfig;
use crate::error::Result;
use crate::services::{Backend, Connector, SessionOptions};

/// Connects to real AWS services, one SDK config per session.
pub struct AwsConnector {
    config: AthenaConfig,
}

impl AwsConnector {
    pub fn new(config: AthenaConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for AwsConnector {
    async fn connect(&self, session: &SessionOptions) -> Result<Backend> {
        let sdk = load_sdk_config(&self.config, session).await?;

        info!(
            region = ?sdk.region().map(|r| r.as_ref().to_string()),
            force_ec2 = session.force_ec2,
            "AWS session ready"
        );

        Ok(Backend {
            queries: Arc::new(AthenaQueryService::new(aws_sdk_athena::Client::new(&sdk))),
            objects: Arc::new(S3ObjectStore::new(aws_sdk_s3::Client::new(&sdk))),
            catalog: Arc::new(GlueCatalog::new(aws_sdk_glue::Client::new(&sdk))),
            identity: Arc::new(StsIdentity::new(aws_sdk_sts::Client::new(&sdk))),
        })
    }
}
