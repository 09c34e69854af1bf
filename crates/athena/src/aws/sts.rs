use async_trait::async_trait;
use tracing::debug;

use crate::error::{DbToolsError, Result};
use crate::services::IdentityService;

pub struct StsIdentity {
    client: aws_sdk_sts::Client,
}

impl StsIdentity {
    pub fn new(client: aws_sdk_sts::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityService for StsIdentity {
    async fn caller_user_id(&self) -> Result<String> {
        let resp = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| DbToolsError::AwsSdk(e.to_string()))?;

        let user_id = resp
            .user_id()
            .ok_or_else(|| DbToolsError::AwsSdk("No UserId in caller identity".into()))?
            .to_string();

        debug!(user_id = %user_id, "Resolved caller identity");
        Ok(user_id)
    }
}
