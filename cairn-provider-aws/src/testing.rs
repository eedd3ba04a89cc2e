//! In-memory API fakes for handler tests

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use cairn_core::parameter::Parameter;

use crate::apprunner::{
    AppRunnerApi, AutoScalingConfiguration, AutoScalingConfigurationStatus,
    CreateAutoScalingConfigurationRequest,
};
use crate::elasticache::{
    CacheParameterGroup, CreateServerlessCacheRequest, ElastiCacheApi, Endpoint,
    ModifyServerlessCacheRequest, ServerlessCache, ServerlessCacheStatus,
};
use crate::error::{ApiError, ApiResult};

#[derive(Default)]
struct ElastiCacheState {
    groups: HashMap<String, (CacheParameterGroup, BTreeMap<String, String>)>,
    caches: HashMap<String, ServerlessCache>,
    /// Applied one per describe: `Some` sets the status, `None` removes the cache
    statuses: VecDeque<Option<ServerlessCacheStatus>>,
    delete_failures: VecDeque<ApiError>,
    calls: Vec<String>,
    describes: usize,
    last_modify: Option<ModifyServerlessCacheRequest>,
}

/// Records every mutating call as a short line, e.g. `reset pg a,b`
#[derive(Default)]
pub(crate) struct FakeElastiCache {
    state: Mutex<ElastiCacheState>,
    refuse_reserved_memory_reset: bool,
}

impl FakeElastiCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reject resets of `reserved-memory` the way the real API does
    pub(crate) fn refusing_reserved_memory_reset(mut self) -> Self {
        self.refuse_reserved_memory_reset = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub(crate) fn fail_next_deletes(&self, errors: Vec<ApiError>) {
        self.state.lock().unwrap().delete_failures.extend(errors);
    }

    pub(crate) fn script_serverless_statuses(
        &self,
        statuses: impl IntoIterator<Item = Option<ServerlessCacheStatus>>,
    ) {
        self.state.lock().unwrap().statuses.extend(statuses);
    }

    pub(crate) fn describe_count(&self) -> usize {
        self.state.lock().unwrap().describes
    }

    pub(crate) fn last_modify(&self) -> Option<ModifyServerlessCacheRequest> {
        self.state.lock().unwrap().last_modify.clone()
    }
}

fn group_not_found(name: &str) -> ApiError {
    ApiError::service(
        "CacheParameterGroupNotFound",
        format!("CacheParameterGroup {} not found.", name),
    )
}

fn cache_not_found(name: &str) -> ApiError {
    ApiError::service(
        "ServerlessCacheNotFoundFault",
        format!("Serverless cache {} not found", name),
    )
}

#[async_trait]
impl ElastiCacheApi for FakeElastiCache {
    async fn create_cache_parameter_group(
        &self,
        name: &str,
        family: &str,
        description: &str,
    ) -> ApiResult<CacheParameterGroup> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create {} {}", name, family));
        let group = CacheParameterGroup {
            name: name.to_string(),
            family: family.to_string(),
            description: description.to_string(),
            arn: Some(format!("arn:aws:elasticache:us-east-1:123456789012:parametergroup:{}", name)),
        };
        state
            .groups
            .insert(name.to_string(), (group.clone(), BTreeMap::new()));
        Ok(group)
    }

    async fn describe_cache_parameter_group(
        &self,
        name: &str,
    ) -> ApiResult<Option<CacheParameterGroup>> {
        let state = self.state.lock().unwrap();
        Ok(state.groups.get(name).map(|(group, _)| group.clone()))
    }

    async fn describe_user_parameters(&self, name: &str) -> ApiResult<Vec<Parameter>> {
        let state = self.state.lock().unwrap();
        let (_, params) = state.groups.get(name).ok_or_else(|| group_not_found(name))?;
        Ok(params.iter().map(|(n, v)| Parameter::new(n, v)).collect())
    }

    async fn modify_cache_parameter_group(
        &self,
        name: &str,
        parameters: &[Parameter],
    ) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        let line = parameters
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        state.calls.push(format!("modify {} {}", name, line));
        let (_, params) = state
            .groups
            .get_mut(name)
            .ok_or_else(|| group_not_found(name))?;
        for p in parameters {
            params.insert(p.name.clone(), p.value.clone());
        }
        Ok(())
    }

    async fn reset_cache_parameter_group(&self, name: &str, names: &[String]) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("reset {} {}", name, names.join(",")));
        if self.refuse_reserved_memory_reset && names.iter().any(|n| n == "reserved-memory") {
            return Err(ApiError::service(
                "InvalidParameterValue",
                "Parameter reserved-memory doesn't exist",
            ));
        }
        let (_, params) = state
            .groups
            .get_mut(name)
            .ok_or_else(|| group_not_found(name))?;
        for n in names {
            params.remove(n);
        }
        Ok(())
    }

    async fn delete_cache_parameter_group(&self, name: &str) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete {}", name));
        if let Some(err) = state.delete_failures.pop_front() {
            return Err(err);
        }
        state
            .groups
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| group_not_found(name))
    }

    async fn create_serverless_cache(
        &self,
        request: &CreateServerlessCacheRequest,
    ) -> ApiResult<ServerlessCache> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create-serverless {}", request.name));

        let mut cache = ServerlessCache::named(&request.name, ServerlessCacheStatus::Available);
        cache.arn = Some(format!(
            "arn:aws:elasticache:us-east-1:123456789012:serverlesscache:{}",
            request.name
        ));
        cache.engine = Some(request.engine.clone());
        cache.major_engine_version = request
            .major_engine_version
            .clone()
            .or_else(|| Some("7".to_string()));
        cache.full_engine_version = cache.major_engine_version.as_ref().map(|v| format!("{}.1", v));
        cache.description = request.description.clone();
        cache.kms_key_id = request.kms_key_id.clone();
        cache.security_group_ids = request.security_group_ids.clone().unwrap_or_default();
        cache.subnet_ids = request.subnet_ids.clone().unwrap_or_default();
        cache.user_group_id = request.user_group_id.clone();
        cache.snapshot_retention_limit = request.snapshot_retention_limit;
        cache.daily_snapshot_time = request.daily_snapshot_time.clone();
        cache.cache_usage_limits = request.cache_usage_limits.clone();
        cache.endpoint = Some(Endpoint {
            address: Some(format!("{}.serverless.use1.cache.amazonaws.com", request.name)),
            port: Some(6379),
        });

        state.caches.insert(request.name.clone(), cache.clone());
        Ok(cache)
    }

    async fn describe_serverless_cache(&self, name: &str) -> ApiResult<Option<ServerlessCache>> {
        let mut state = self.state.lock().unwrap();
        state.describes += 1;
        match state.statuses.pop_front() {
            Some(Some(status)) => {
                if let Some(cache) = state.caches.get_mut(name) {
                    cache.status = status;
                }
            }
            Some(None) => {
                state.caches.remove(name);
            }
            None => {}
        }
        Ok(state.caches.get(name).cloned())
    }

    async fn modify_serverless_cache(
        &self,
        request: &ModifyServerlessCacheRequest,
    ) -> ApiResult<ServerlessCache> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("modify-serverless {}", request.name));
        state.last_modify = Some(request.clone());

        let cache = state
            .caches
            .get_mut(&request.name)
            .ok_or_else(|| cache_not_found(&request.name))?;
        if let Some(engine) = &request.engine {
            cache.engine = Some(engine.clone());
        }
        if let Some(major) = &request.major_engine_version {
            cache.major_engine_version = Some(major.clone());
        }
        if let Some(description) = &request.description {
            cache.description = Some(description.clone());
        }
        if request.remove_user_group {
            cache.user_group_id = None;
        } else if let Some(group) = &request.user_group_id {
            cache.user_group_id = Some(group.clone());
        }
        Ok(cache.clone())
    }

    async fn delete_serverless_cache(&self, name: &str) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete-serverless {}", name));
        if let Some(err) = state.delete_failures.pop_front() {
            return Err(err);
        }
        if !state.caches.contains_key(name) {
            return Err(cache_not_found(name));
        }
        if state.statuses.is_empty() {
            state.caches.remove(name);
        }
        Ok(())
    }
}

#[derive(Default)]
struct AppRunnerState {
    configs: HashMap<String, AutoScalingConfiguration>,
    revisions: HashMap<String, i32>,
    /// Describes left before a deleted revision turns inactive
    deactivate_after: HashMap<String, u32>,
    deleting: HashMap<String, u32>,
    creates: usize,
}

#[derive(Default)]
pub(crate) struct FakeAppRunner {
    state: Mutex<AppRunnerState>,
}

impl FakeAppRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn create_count(&self) -> usize {
        self.state.lock().unwrap().creates
    }

    pub(crate) fn set_status(&self, arn: &str, status: AutoScalingConfigurationStatus) {
        if let Some(config) = self.state.lock().unwrap().configs.get_mut(arn) {
            config.status = status;
        }
    }

    /// After deletion, keep reporting `active` for this many describes
    pub(crate) fn deactivate_after_describes(&self, arn: &str, describes: u32) {
        self.state
            .lock()
            .unwrap()
            .deactivate_after
            .insert(arn.to_string(), describes);
    }
}

fn configuration_not_found(arn: &str) -> ApiError {
    ApiError::service(
        "ResourceNotFoundException",
        format!("Auto scaling configuration {} not found", arn),
    )
}

#[async_trait]
impl AppRunnerApi for FakeAppRunner {
    async fn create_auto_scaling_configuration(
        &self,
        request: &CreateAutoScalingConfigurationRequest,
    ) -> ApiResult<AutoScalingConfiguration> {
        let mut state = self.state.lock().unwrap();
        state.creates += 1;
        let revision = {
            let r = state.revisions.entry(request.name.clone()).or_insert(0);
            *r += 1;
            *r
        };
        let config = AutoScalingConfiguration {
            arn: format!(
                "arn:aws:apprunner:us-east-1:123456789012:autoscalingconfiguration/{}/{}/0123456789abcdef",
                request.name, revision
            ),
            name: request.name.clone(),
            revision,
            latest: true,
            status: AutoScalingConfigurationStatus::Active,
            max_concurrency: request.max_concurrency,
            max_size: request.max_size,
            min_size: request.min_size,
            has_associated_service: false,
            is_default: false,
        };
        state.configs.insert(config.arn.clone(), config.clone());
        Ok(config)
    }

    async fn describe_auto_scaling_configuration(
        &self,
        arn: &str,
    ) -> ApiResult<Option<AutoScalingConfiguration>> {
        let mut state = self.state.lock().unwrap();
        let deactivated = match state.deleting.get_mut(arn) {
            Some(0) => true,
            Some(remaining) => {
                *remaining -= 1;
                false
            }
            None => false,
        };
        if deactivated {
            state.deleting.remove(arn);
            if let Some(config) = state.configs.get_mut(arn) {
                config.status = AutoScalingConfigurationStatus::Inactive;
            }
        }
        Ok(state.configs.get(arn).cloned())
    }

    async fn delete_auto_scaling_configuration(&self, arn: &str) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        let active = state
            .configs
            .get(arn)
            .is_some_and(|c| c.status != AutoScalingConfigurationStatus::Inactive);
        if !active {
            return Err(configuration_not_found(arn));
        }

        match state.deactivate_after.remove(arn) {
            Some(describes) => {
                state.deleting.insert(arn.to_string(), describes);
            }
            None => {
                if let Some(config) = state.configs.get_mut(arn) {
                    config.status = AutoScalingConfigurationStatus::Inactive;
                }
            }
        }
        Ok(())
    }
}
