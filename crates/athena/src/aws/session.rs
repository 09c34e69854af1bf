use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_config::provider_config::ProviderConfig;
use aws_config::web_identity_token::{StaticConfiguration, WebIdentityTokenCredentialsProvider};
use aws_config::BehaviorVersion;
use aws_types::region::Region;
use aws_types::SdkConfig;
use tracing::debug;

use crate::config::AthenaConfig;
use crate::error::{DbToolsError, Result};
use crate::services::SessionOptions;

/// Load an SDK config for `session`.
///
/// Credentials come from EC2 instance metadata when `force_ec2` is set,
/// from a web identity token when one is configured (with the session
/// name derived from the role ARN), and from the default chain otherwise.
pub async fn load_sdk_config(config: &AthenaConfig, session: &SessionOptions) -> Result<SdkConfig> {
    let region = Region::new(session.region.clone().unwrap_or_else(|| config.region.clone()));
    let aws = &config.aws;

    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region.clone());

    if let Some(endpoint) = &aws.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    if session.force_ec2 {
        debug!("Using EC2 instance metadata credentials");
        loader = loader.credentials_provider(ImdsCredentialsProvider::builder().build());
    } else if let Some(token_file) = &aws.web_identity_token_file {
        let role_arn = aws.role_arn.clone().ok_or_else(|| {
            DbToolsError::validation("missing required configuration: AWS_ROLE_ARN")
        })?;
        let session_name = aws.session_name().ok_or_else(|| {
            DbToolsError::validation("missing required configuration: AWS_ROLE_SESSION_NAME")
        })?;

        debug!(role_arn = %role_arn, session_name = %session_name, "Using web identity credentials");

        let provider = WebIdentityTokenCredentialsProvider::builder()
            .static_configuration(StaticConfiguration {
                web_identity_token_file: token_file.clone(),
                role_arn,
                session_name,
            })
            .configure(&ProviderConfig::without_region().with_region(Some(region)))
            .build();
        loader = loader.credentials_provider(provider);
    }

    Ok(loader.load().await)
}
