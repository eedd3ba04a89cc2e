//! App Runner resources

pub(crate) mod auto_scaling_configuration_version;
mod sdk;

use std::fmt;

use async_trait::async_trait;

use crate::error::ApiResult;

/// The App Runner operations the handlers need
#[async_trait]
pub trait AppRunnerApi: Send + Sync {
    async fn create_auto_scaling_configuration(
        &self,
        request: &CreateAutoScalingConfigurationRequest,
    ) -> ApiResult<AutoScalingConfiguration>;

    /// `Ok(None)` when no configuration has this ARN
    async fn describe_auto_scaling_configuration(
        &self,
        arn: &str,
    ) -> ApiResult<Option<AutoScalingConfiguration>>;

    async fn delete_auto_scaling_configuration(&self, arn: &str) -> ApiResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoScalingConfigurationStatus {
    Active,
    Inactive,
    Other(String),
}

impl From<&str> for AutoScalingConfigurationStatus {
    fn from(s: &str) -> Self {
        match s {
            "active" | "ACTIVE" => Self::Active,
            "inactive" | "INACTIVE" => Self::Inactive,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AutoScalingConfigurationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Inactive => f.write_str("inactive"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoScalingConfiguration {
    pub arn: String,
    pub name: String,
    pub revision: i32,
    pub latest: bool,
    pub status: AutoScalingConfigurationStatus,
    pub max_concurrency: i32,
    pub max_size: i32,
    pub min_size: i32,
    pub has_associated_service: bool,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAutoScalingConfigurationRequest {
    pub name: String,
    pub max_concurrency: i32,
    pub max_size: i32,
    pub min_size: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accepts_either_case() {
        assert_eq!(
            AutoScalingConfigurationStatus::from("ACTIVE"),
            AutoScalingConfigurationStatus::Active
        );
        assert_eq!(
            AutoScalingConfigurationStatus::from("inactive").to_string(),
            "inactive"
        );
    }
}
