//! `AppRunnerApi` over the AWS SDK client

use async_trait::async_trait;
use aws_sdk_apprunner::Client;
use aws_sdk_apprunner::types as sdk;

use super::{
    AppRunnerApi, AutoScalingConfiguration, AutoScalingConfigurationStatus,
    CreateAutoScalingConfigurationRequest,
};
use crate::error::{ApiError, ApiResult};

#[async_trait]
impl AppRunnerApi for Client {
    async fn create_auto_scaling_configuration(
        &self,
        request: &CreateAutoScalingConfigurationRequest,
    ) -> ApiResult<AutoScalingConfiguration> {
        let output = self
            .create_auto_scaling_configuration()
            .auto_scaling_configuration_name(&request.name)
            .max_concurrency(request.max_concurrency)
            .max_size(request.max_size)
            .min_size(request.min_size)
            .send()
            .await?;

        output
            .auto_scaling_configuration()
            .map(configuration_from_sdk)
            .ok_or_else(|| {
                ApiError::Transport(format!(
                    "create of auto scaling configuration {} returned no configuration",
                    request.name
                ))
            })
    }

    async fn describe_auto_scaling_configuration(
        &self,
        arn: &str,
    ) -> ApiResult<Option<AutoScalingConfiguration>> {
        let result = self
            .describe_auto_scaling_configuration()
            .auto_scaling_configuration_arn(arn)
            .send()
            .await
            .map_err(ApiError::from);

        match result {
            Ok(output) => Ok(output
                .auto_scaling_configuration()
                .map(configuration_from_sdk)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete_auto_scaling_configuration(&self, arn: &str) -> ApiResult<()> {
        self.delete_auto_scaling_configuration()
            .auto_scaling_configuration_arn(arn)
            .send()
            .await?;
        Ok(())
    }
}

fn configuration_from_sdk(config: &sdk::AutoScalingConfiguration) -> AutoScalingConfiguration {
    AutoScalingConfiguration {
        arn: config
            .auto_scaling_configuration_arn()
            .unwrap_or_default()
            .to_string(),
        name: config
            .auto_scaling_configuration_name()
            .unwrap_or_default()
            .to_string(),
        revision: config.auto_scaling_configuration_revision().unwrap_or_default(),
        latest: config.latest().unwrap_or_default(),
        status: config
            .status()
            .map(|s| AutoScalingConfigurationStatus::from(s.as_str()))
            .unwrap_or_else(|| AutoScalingConfigurationStatus::Other(String::new())),
        max_concurrency: config.max_concurrency().unwrap_or_default(),
        max_size: config.max_size().unwrap_or_default(),
        min_size: config.min_size().unwrap_or_default(),
        has_associated_service: config.has_associated_service().unwrap_or_default(),
        is_default: config.is_default().unwrap_or_default(),
    }
}
