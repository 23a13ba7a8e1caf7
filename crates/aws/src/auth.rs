use aws_config::{ConfigLoader, Region, SdkConfig};
use tracing::{debug, info};

use crate::config::AwsConnection;

const SESSION_NAME: &str = "pockity";

fn loader_for(config: &AwsConnection) -> ConfigLoader {
    let loader = aws_config::from_env().region(Region::new(config.region.clone()));
    match &config.endpoint_url {
        Some(endpoint) => loader.endpoint_url(endpoint),
        None => loader,
    }
}

/// Load an SDK configuration from the environment credential chain.
///
/// When `role_arn` is set the base credentials are used to assume that role
/// through STS; the SDK refreshes the assumed credentials before they expire.
///
/// ```no_run
/// use pockity_aws::config::AwsConnection;
/// use pockity_aws::auth::build_sdk_config;
///
/// # async fn example() {
/// let mut config = AwsConnection::new("us-east-1");
/// config.endpoint_url = Some("http://localhost:9000".into());
/// let sdk_config = build_sdk_config(&config).await;
/// # }
/// ```
pub async fn build_sdk_config(config: &AwsConnection) -> SdkConfig {
    if let Some(endpoint) = &config.endpoint_url {
        debug!(endpoint = %endpoint, "using custom AWS endpoint");
    }

    let Some(role_arn) = &config.role_arn else {
        return loader_for(config).load().await;
    };

    info!(session_name = SESSION_NAME, "assuming IAM role via STS");
    let base = loader_for(config).load().await;
    let provider = aws_config::sts::AssumeRoleProvider::builder(role_arn)
        .session_name(SESSION_NAME)
        .region(Region::new(config.region.clone()))
        .configure(&base)
        .build()
        .await;

    loader_for(config)
        .credentials_provider(provider)
        .load()
        .await
}
