//! Cairn AWS Provider
//!
//! Manages ElastiCache parameter groups, ElastiCache serverless caches and
//! App Runner auto scaling configurations through the AWS service APIs.

pub mod apprunner;
mod attributes;
pub mod config;
pub mod elasticache;
pub mod error;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use cairn_core::provider::{
    BoxFuture, Provider, ProviderError, ProviderResult, ResourceType,
};
use cairn_core::resource::{Resource, ResourceId, State};
use cairn_core::waiter::Shutdown;

use crate::apprunner::AppRunnerApi;
use crate::apprunner::auto_scaling_configuration_version as auto_scaling;
use crate::elasticache::{ElastiCacheApi, parameter_group, serverless_cache};

pub use crate::config::{ProviderConfig, ResourceTimeouts};
pub use crate::error::{ApiError, ApiResult};

/// ElastiCache cache parameter group
pub struct ParameterGroupType;

impl ResourceType for ParameterGroupType {
    fn name(&self) -> &'static str {
        parameter_group::RESOURCE_TYPE
    }
}

/// ElastiCache serverless cache
pub struct ServerlessCacheType;

impl ResourceType for ServerlessCacheType {
    fn name(&self) -> &'static str {
        serverless_cache::RESOURCE_TYPE
    }
}

/// App Runner auto scaling configuration revision
pub struct AutoScalingConfigurationVersionType;

impl ResourceType for AutoScalingConfigurationVersionType {
    fn name(&self) -> &'static str {
        auto_scaling::RESOURCE_TYPE
    }
}

/// AWS Provider
pub struct AwsProvider {
    elasticache: Arc<dyn ElastiCacheApi>,
    apprunner: Arc<dyn AppRunnerApi>,
    config: ProviderConfig,
    shutdown: Shutdown,
}

impl AwsProvider {
    /// Create a new AWS Provider using the SDK's default credential chain
    pub async fn new(config: ProviderConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        Self::with_clients(
            Arc::new(aws_sdk_elasticache::Client::new(&sdk_config)),
            Arc::new(aws_sdk_apprunner::Client::new(&sdk_config)),
            config,
        )
    }

    /// Create with specific clients (for testing)
    pub fn with_clients(
        elasticache: Arc<dyn ElastiCacheApi>,
        apprunner: Arc<dyn AppRunnerApi>,
        config: ProviderConfig,
    ) -> Self {
        Self {
            elasticache,
            apprunner,
            config,
            shutdown: Shutdown::never(),
        }
    }

    /// Abort in-progress waits when `shutdown` fires
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

fn unknown_type(id: &ResourceId) -> ProviderError {
    ProviderError::new(format!("Unknown resource type: {}", id.resource_type)).for_resource(id.clone())
}

impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        vec![
            Box::new(ParameterGroupType),
            Box::new(ServerlessCacheType),
            Box::new(AutoScalingConfigurationVersionType),
        ]
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(String::from);
        Box::pin(async move {
            let Some(identifier) = identifier else {
                return Ok(State::not_found(id));
            };
            let elasticache = self.elasticache.as_ref();
            match id.resource_type.as_str() {
                parameter_group::RESOURCE_TYPE => {
                    parameter_group::read(elasticache, &id, &identifier).await
                }
                serverless_cache::RESOURCE_TYPE => {
                    serverless_cache::read(elasticache, &id, &identifier).await
                }
                auto_scaling::RESOURCE_TYPE => {
                    auto_scaling::read(self.apprunner.as_ref(), &id, &identifier).await
                }
                _ => Err(unknown_type(&id)),
            }
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let elasticache = self.elasticache.as_ref();
            match resource.id.resource_type.as_str() {
                parameter_group::RESOURCE_TYPE => {
                    parameter_group::create(elasticache, &resource).await
                }
                serverless_cache::RESOURCE_TYPE => {
                    serverless_cache::create(
                        elasticache,
                        &resource,
                        &self.config.timeouts,
                        &self.shutdown,
                    )
                    .await
                }
                auto_scaling::RESOURCE_TYPE => {
                    auto_scaling::create(self.apprunner.as_ref(), &resource).await
                }
                _ => Err(unknown_type(&resource.id)),
            }
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move {
            let elasticache = self.elasticache.as_ref();
            match id.resource_type.as_str() {
                parameter_group::RESOURCE_TYPE => {
                    parameter_group::update(elasticache, &id, &identifier, &from, &to).await
                }
                serverless_cache::RESOURCE_TYPE => {
                    serverless_cache::update(
                        elasticache,
                        &id,
                        &identifier,
                        &from,
                        &to,
                        &self.config.timeouts,
                        &self.shutdown,
                    )
                    .await
                }
                auto_scaling::RESOURCE_TYPE => {
                    auto_scaling::update(self.apprunner.as_ref(), &id, &identifier, &from, &to)
                        .await
                }
                _ => Err(unknown_type(&id)),
            }
        })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            let timeouts = &self.config.timeouts;
            match id.resource_type.as_str() {
                parameter_group::RESOURCE_TYPE => {
                    parameter_group::delete(
                        self.elasticache.as_ref(),
                        &id,
                        &identifier,
                        timeouts.parameter_group_delete,
                    )
                    .await
                }
                serverless_cache::RESOURCE_TYPE => {
                    serverless_cache::delete(
                        self.elasticache.as_ref(),
                        &id,
                        &identifier,
                        timeouts,
                        &self.shutdown,
                    )
                    .await
                }
                auto_scaling::RESOURCE_TYPE => {
                    auto_scaling::delete(
                        self.apprunner.as_ref(),
                        &id,
                        &identifier,
                        timeouts.auto_scaling_configuration_delete,
                        &self.shutdown,
                    )
                    .await
                }
                _ => Err(unknown_type(&id)),
            }
        })
    }
}
