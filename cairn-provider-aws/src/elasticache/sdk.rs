//! `ElastiCacheApi` over the AWS SDK client

use async_trait::async_trait;
use aws_sdk_elasticache::Client;
use aws_sdk_elasticache::primitives::DateTimeFormat;
use aws_sdk_elasticache::types as sdk;
use cairn_core::parameter::Parameter;

use super::{
    CacheParameterGroup, CacheUsageLimits, CreateServerlessCacheRequest, DataStorage,
    EcpuPerSecond, ElastiCacheApi, Endpoint, ModifyServerlessCacheRequest, ServerlessCache,
    ServerlessCacheStatus,
};
use crate::error::{ApiError, ApiResult};

/// Only parameters changed from the family defaults
const USER_SOURCE: &str = "user";

#[async_trait]
impl ElastiCacheApi for Client {
    async fn create_cache_parameter_group(
        &self,
        name: &str,
        family: &str,
        description: &str,
    ) -> ApiResult<CacheParameterGroup> {
        let output = self
            .create_cache_parameter_group()
            .cache_parameter_group_name(name)
            .cache_parameter_group_family(family)
            .description(description)
            .send()
            .await?;

        output
            .cache_parameter_group()
            .map(parameter_group_from_sdk)
            .ok_or_else(|| {
                ApiError::Transport(format!("create of parameter group {} returned no group", name))
            })
    }

    async fn describe_cache_parameter_group(
        &self,
        name: &str,
    ) -> ApiResult<Option<CacheParameterGroup>> {
        let result = self
            .describe_cache_parameter_groups()
            .cache_parameter_group_name(name)
            .send()
            .await
            .map_err(ApiError::from);

        match result {
            Ok(output) => Ok(output
                .cache_parameter_groups()
                .first()
                .map(parameter_group_from_sdk)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn describe_user_parameters(&self, name: &str) -> ApiResult<Vec<Parameter>> {
        let mut parameters = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .describe_cache_parameters()
                .cache_parameter_group_name(name)
                .source(USER_SOURCE)
                .set_marker(marker.take())
                .send()
                .await?;

            for p in output.parameters() {
                if let (Some(n), Some(v)) = (p.parameter_name(), p.parameter_value()) {
                    parameters.push(Parameter::new(n, v));
                }
            }

            match output.marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(parameters)
    }

    async fn modify_cache_parameter_group(
        &self,
        name: &str,
        parameters: &[Parameter],
    ) -> ApiResult<()> {
        let values = parameters
            .iter()
            .map(|p| {
                sdk::ParameterNameValue::builder()
                    .parameter_name(&p.name)
                    .parameter_value(&p.value)
                    .build()
            })
            .collect();

        self.modify_cache_parameter_group()
            .cache_parameter_group_name(name)
            .set_parameter_name_values(Some(values))
            .send()
            .await?;
        Ok(())
    }

    async fn reset_cache_parameter_group(&self, name: &str, names: &[String]) -> ApiResult<()> {
        let values = names
            .iter()
            .map(|n| sdk::ParameterNameValue::builder().parameter_name(n).build())
            .collect();

        self.reset_cache_parameter_group()
            .cache_parameter_group_name(name)
            .reset_all_parameters(false)
            .set_parameter_name_values(Some(values))
            .send()
            .await?;
        Ok(())
    }

    async fn delete_cache_parameter_group(&self, name: &str) -> ApiResult<()> {
        self.delete_cache_parameter_group()
            .cache_parameter_group_name(name)
            .send()
            .await?;
        Ok(())
    }

    async fn create_serverless_cache(
        &self,
        request: &CreateServerlessCacheRequest,
    ) -> ApiResult<ServerlessCache> {
        let output = self
            .create_serverless_cache()
            .serverless_cache_name(&request.name)
            .engine(&request.engine)
            .set_major_engine_version(request.major_engine_version.clone())
            .set_description(request.description.clone())
            .set_kms_key_id(request.kms_key_id.clone())
            .set_security_group_ids(request.security_group_ids.clone())
            .set_subnet_ids(request.subnet_ids.clone())
            .set_snapshot_arns_to_restore(request.snapshot_arns_to_restore.clone())
            .set_snapshot_retention_limit(request.snapshot_retention_limit)
            .set_daily_snapshot_time(request.daily_snapshot_time.clone())
            .set_user_group_id(request.user_group_id.clone())
            .set_cache_usage_limits(
                request.cache_usage_limits.as_ref().map(usage_limits_to_sdk),
            )
            .send()
            .await?;

        Ok(output
            .serverless_cache()
            .map(serverless_cache_from_sdk)
            .unwrap_or_else(|| {
                ServerlessCache::named(&request.name, ServerlessCacheStatus::Creating)
            }))
    }

    async fn describe_serverless_cache(&self, name: &str) -> ApiResult<Option<ServerlessCache>> {
        let result = self
            .describe_serverless_caches()
            .serverless_cache_name(name)
            .send()
            .await
            .map_err(ApiError::from);

        match result {
            Ok(output) => Ok(output
                .serverless_caches()
                .first()
                .map(serverless_cache_from_sdk)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn modify_serverless_cache(
        &self,
        request: &ModifyServerlessCacheRequest,
    ) -> ApiResult<ServerlessCache> {
        let mut call = self
            .modify_serverless_cache()
            .serverless_cache_name(&request.name)
            .set_engine(request.engine.clone())
            .set_major_engine_version(request.major_engine_version.clone())
            .set_description(request.description.clone())
            .set_security_group_ids(request.security_group_ids.clone())
            .set_snapshot_retention_limit(request.snapshot_retention_limit)
            .set_daily_snapshot_time(request.daily_snapshot_time.clone())
            .set_user_group_id(request.user_group_id.clone())
            .set_cache_usage_limits(
                request.cache_usage_limits.as_ref().map(usage_limits_to_sdk),
            );
        if request.remove_user_group {
            call = call.remove_user_group(true);
        }

        let output = call.send().await?;
        Ok(output
            .serverless_cache()
            .map(serverless_cache_from_sdk)
            .unwrap_or_else(|| {
                ServerlessCache::named(&request.name, ServerlessCacheStatus::Modifying)
            }))
    }

    async fn delete_serverless_cache(&self, name: &str) -> ApiResult<()> {
        self.delete_serverless_cache()
            .serverless_cache_name(name)
            .send()
            .await?;
        Ok(())
    }
}

fn parameter_group_from_sdk(group: &sdk::CacheParameterGroup) -> CacheParameterGroup {
    CacheParameterGroup {
        name: group
            .cache_parameter_group_name()
            .unwrap_or_default()
            .to_string(),
        family: group
            .cache_parameter_group_family()
            .unwrap_or_default()
            .to_string(),
        description: group.description().unwrap_or_default().to_string(),
        arn: group.arn().map(str::to_string),
    }
}

fn serverless_cache_from_sdk(cache: &sdk::ServerlessCache) -> ServerlessCache {
    ServerlessCache {
        name: cache.serverless_cache_name().unwrap_or_default().to_string(),
        arn: cache.arn().map(str::to_string),
        status: ServerlessCacheStatus::from(cache.status().unwrap_or_default()),
        engine: cache.engine().map(str::to_string),
        major_engine_version: cache.major_engine_version().map(str::to_string),
        full_engine_version: cache.full_engine_version().map(str::to_string),
        description: cache.description().map(str::to_string),
        kms_key_id: cache.kms_key_id().map(str::to_string),
        endpoint: cache.endpoint().map(endpoint_from_sdk),
        reader_endpoint: cache.reader_endpoint().map(endpoint_from_sdk),
        daily_snapshot_time: cache.daily_snapshot_time().map(str::to_string),
        snapshot_retention_limit: cache.snapshot_retention_limit(),
        security_group_ids: cache.security_group_ids().to_vec(),
        subnet_ids: cache.subnet_ids().to_vec(),
        user_group_id: cache.user_group_id().map(str::to_string),
        cache_usage_limits: cache.cache_usage_limits().map(usage_limits_from_sdk),
        create_time: cache
            .create_time()
            .and_then(|t| t.fmt(DateTimeFormat::DateTime).ok()),
    }
}

fn endpoint_from_sdk(endpoint: &sdk::Endpoint) -> Endpoint {
    Endpoint {
        address: endpoint.address().map(str::to_string),
        port: endpoint.port(),
    }
}

fn usage_limits_from_sdk(limits: &sdk::CacheUsageLimits) -> CacheUsageLimits {
    CacheUsageLimits {
        data_storage: limits.data_storage().map(|ds| DataStorage {
            maximum: ds.maximum(),
            minimum: ds.minimum(),
            unit: ds
                .unit()
                .map(|u| u.as_str().to_string())
                .unwrap_or_default(),
        }),
        ecpu_per_second: limits.ecpu_per_second().map(|ecpu| EcpuPerSecond {
            maximum: ecpu.maximum(),
            minimum: ecpu.minimum(),
        }),
    }
}

fn usage_limits_to_sdk(limits: &CacheUsageLimits) -> sdk::CacheUsageLimits {
    let data_storage = limits.data_storage.as_ref().map(|ds| {
        sdk::DataStorage::builder()
            .set_maximum(ds.maximum)
            .set_minimum(ds.minimum)
            .unit(sdk::DataStorageUnit::from(ds.unit.as_str()))
            .build()
    });
    let ecpu_per_second = limits.ecpu_per_second.as_ref().map(|ecpu| {
        sdk::EcpuPerSecond::builder()
            .set_maximum(ecpu.maximum)
            .set_minimum(ecpu.minimum)
            .build()
    });

    sdk::CacheUsageLimits::builder()
        .set_data_storage(data_storage)
        .set_ecpu_per_second(ecpu_per_second)
        .build()
}
