//! elasticache.serverless_cache - serverless Redis, Valkey and Memcached caches

use std::collections::HashMap;
use std::time::Duration;

use cairn_core::differ::changed_attributes;
use cairn_core::provider::{ProviderError, ProviderResult};
use cairn_core::resource::{Resource, ResourceId, State, Value};
use cairn_core::waiter::{Shutdown, WaitError, Waiter, retry_when};

use super::{
    CacheUsageLimits, CreateServerlessCacheRequest, DataStorage, EcpuPerSecond, ElastiCacheApi,
    Endpoint, ModifyServerlessCacheRequest, ServerlessCache, ServerlessCacheStatus,
};
use crate::attributes::{AttributeMap, Attributes};
use crate::config::ResourceTimeouts;
use crate::error::ApiError;

pub(crate) const RESOURCE_TYPE: &str = "elasticache.serverless_cache";

const POLL_MIN_INTERVAL: Duration = Duration::from_secs(10);
const POLL_DELAY: Duration = Duration::from_secs(30);

const DELETE_RETRY_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DELETE_RETRY_INTERVAL: Duration = Duration::from_secs(10);
const DEPENDENCY_VIOLATION: &str = "DependencyViolation";

/// Changing any of these means deleting and recreating the cache
const REPLACE_ON_CHANGE: [&str; 5] = [
    "name",
    "kms_key_id",
    "subnet_ids",
    "snapshot_arns_to_restore",
    "major_engine_version",
];

/// Accepted on create but never reported back by the API
const WRITE_ONLY: [&str; 1] = ["snapshot_arns_to_restore"];

/// Dropping one of these from the declaration clears it remotely
const DETACH_ON_REMOVAL: [&str; 1] = ["user_group_id"];

const MAX_SNAPSHOT_RETENTION_LIMIT: i64 = 35;
const ECPU_RANGE: std::ops::RangeInclusive<i64> = 1_000..=15_000_000;

fn waiter(name: &str, timeout: Duration) -> Waiter<ServerlessCacheStatus> {
    Waiter::new(format!("serverless cache {}", name), timeout)
        .pending([
            ServerlessCacheStatus::Creating,
            ServerlessCacheStatus::Deleting,
            ServerlessCacheStatus::Modifying,
        ])
        .min_interval(POLL_MIN_INTERVAL)
        .delay(POLL_DELAY)
}

async fn describe_with_status(
    api: &dyn ElastiCacheApi,
    name: &str,
) -> Result<Option<(ServerlessCache, ServerlessCacheStatus)>, ApiError> {
    let found = api.describe_serverless_cache(name).await?;
    Ok(found.map(|cache| {
        let status = cache.status.clone();
        (cache, status)
    }))
}

async fn wait_available(
    api: &dyn ElastiCacheApi,
    name: &str,
    timeout: Duration,
    shutdown: &Shutdown,
) -> Result<ServerlessCache, WaitError> {
    waiter(name, timeout)
        .target([ServerlessCacheStatus::Available])
        .wait_until_available(|| describe_with_status(api, name), shutdown.requested())
        .await
}

pub(crate) async fn read(
    api: &dyn ElastiCacheApi,
    id: &ResourceId,
    name: &str,
) -> ProviderResult<State> {
    match api
        .describe_serverless_cache(name)
        .await
        .map_err(|e| e.into_provider_error(id, "read serverless cache"))?
    {
        Some(cache) => Ok(cache_state(id, &cache)),
        None => Ok(State::not_found(id.clone())),
    }
}

pub(crate) async fn create(
    api: &dyn ElastiCacheApi,
    resource: &Resource,
    timeouts: &ResourceTimeouts,
    shutdown: &Shutdown,
) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = Attributes::of(resource);
    let request = CreateServerlessCacheRequest {
        name: attrs.required_string("name")?,
        engine: attrs.required_string("engine")?,
        major_engine_version: attrs.string("major_engine_version")?,
        description: attrs.string("description")?,
        kms_key_id: attrs.string("kms_key_id")?,
        security_group_ids: attrs.string_list("security_group_ids")?,
        subnet_ids: attrs.string_list("subnet_ids")?,
        snapshot_arns_to_restore: attrs.string_list("snapshot_arns_to_restore")?,
        snapshot_retention_limit: attrs
            .int_in_range("snapshot_retention_limit", 0..=MAX_SNAPSHOT_RETENTION_LIMIT)?,
        daily_snapshot_time: attrs.string("daily_snapshot_time")?,
        user_group_id: attrs.string("user_group_id")?,
        cache_usage_limits: cache_usage_limits(&attrs)?,
    };

    api.create_serverless_cache(&request)
        .await
        .map_err(|e| e.into_provider_error(id, "create serverless cache"))?;
    log::info!("Creating serverless cache {}", request.name);

    let cache = wait_available(
        api,
        &request.name,
        timeouts.serverless_cache_create,
        shutdown,
    )
    .await
    .map_err(|e| {
        ProviderError::new("Serverless cache did not become available")
            .for_resource(id.clone())
            .with_cause(e)
    })?;

    let mut state = cache_state(id, &cache);
    if let Some(arns) = &request.snapshot_arns_to_restore {
        state.attributes.insert(
            "snapshot_arns_to_restore".to_string(),
            Value::string_list(arns.iter().cloned()),
        );
    }
    Ok(state)
}

pub(crate) async fn update(
    api: &dyn ElastiCacheApi,
    id: &ResourceId,
    name: &str,
    from: &State,
    to: &Resource,
    timeouts: &ResourceTimeouts,
    shutdown: &Shutdown,
) -> ProviderResult<State> {
    let desired = Attributes::of(to);
    let current = Attributes::new(&from.id, &from.attributes);

    let mut changed: Vec<String> = changed_attributes(&to.attributes, &from.attributes)
        .into_iter()
        .filter(|key| !(WRITE_ONLY.contains(&key.as_str()) && !from.attributes.contains_key(key)))
        .collect();
    changed.extend(
        DETACH_ON_REMOVAL
            .iter()
            .filter(|key| !to.attributes.contains_key(**key) && from.attributes.contains_key(**key))
            .map(|key| key.to_string()),
    );
    if changed.is_empty() {
        return read(api, id, name).await;
    }

    let request = modify_request(name, &desired, &current, &changed)
        .map_err(|e| e.for_resource(id.clone()))?;
    api.modify_serverless_cache(&request)
        .await
        .map_err(|e| e.into_provider_error(id, "update serverless cache"))?;
    log::info!("Updating serverless cache {} ({})", name, changed.join(", "));

    wait_available(api, name, timeouts.serverless_cache_update, shutdown)
        .await
        .map_err(|e| {
            ProviderError::new("Serverless cache did not become available after update")
                .for_resource(id.clone())
                .with_cause(e)
        })?;

    read(api, id, name).await
}

/// Shape the modify call for the attributes that changed
///
/// Only changed fields are sent. Engine fields are only sent for a
/// cross-engine upgrade; the API rejects them otherwise. An upgrade without
/// an explicit major version keeps the current one.
fn modify_request(
    name: &str,
    desired: &Attributes<'_>,
    current: &Attributes<'_>,
    changed: &[String],
) -> ProviderResult<ModifyServerlessCacheRequest> {
    let mut replace: Vec<String> = changed
        .iter()
        .filter(|key| REPLACE_ON_CHANGE.contains(&key.as_str()))
        .cloned()
        .collect();

    let engine_changed = changed.iter().any(|k| k == "engine");
    let new_engine = desired.required_string("engine")?;
    if engine_changed {
        let old_engine = current.string("engine")?;
        if !(old_engine.as_deref() == Some("redis") && new_engine == "valkey") {
            replace.push("engine".to_string());
        }
    }
    if !replace.is_empty() {
        replace.sort();
        return Err(ProviderError::requires_replacement(&replace));
    }

    let (engine, major_engine_version) = if engine_changed {
        let major = match desired.string("major_engine_version")? {
            Some(v) => Some(v),
            None => current.string("major_engine_version")?,
        };
        (Some(new_engine), major)
    } else {
        (None, None)
    };

    let sends = |key: &str| changed.iter().any(|k| k == key);

    let (user_group_id, remove_user_group) = if sends("user_group_id") {
        let group = desired.string("user_group_id")?;
        let detach = group.is_none() && current.string("user_group_id")?.is_some();
        (group, detach)
    } else {
        (None, false)
    };

    Ok(ModifyServerlessCacheRequest {
        name: name.to_string(),
        engine,
        major_engine_version,
        description: when_changed(sends("description"), || desired.string("description"))?,
        security_group_ids: when_changed(sends("security_group_ids"), || {
            desired.string_list("security_group_ids")
        })?,
        snapshot_retention_limit: when_changed(sends("snapshot_retention_limit"), || {
            desired.int_in_range("snapshot_retention_limit", 0..=MAX_SNAPSHOT_RETENTION_LIMIT)
        })?,
        daily_snapshot_time: when_changed(sends("daily_snapshot_time"), || {
            desired.string("daily_snapshot_time")
        })?,
        user_group_id,
        remove_user_group,
        cache_usage_limits: when_changed(sends("cache_usage_limits"), || {
            cache_usage_limits(desired)
        })?,
    })
}

fn when_changed<T>(
    changed: bool,
    value: impl FnOnce() -> ProviderResult<Option<T>>,
) -> ProviderResult<Option<T>> {
    if changed { value() } else { Ok(None) }
}

pub(crate) async fn delete(
    api: &dyn ElastiCacheApi,
    id: &ResourceId,
    name: &str,
    timeouts: &ResourceTimeouts,
    shutdown: &Shutdown,
) -> ProviderResult<()> {
    let result = retry_when(
        DELETE_RETRY_TIMEOUT,
        DELETE_RETRY_INTERVAL,
        || api.delete_serverless_cache(name),
        |e: &ApiError| e.is_code(DEPENDENCY_VIOLATION),
    )
    .await;

    match result {
        Ok(()) => {}
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(e.into_provider_error(id, "delete serverless cache")),
    }
    log::info!("Deleting serverless cache {}", name);

    waiter(name, timeouts.serverless_cache_delete)
        .wait_until_deleted(|| describe_with_status(api, name), shutdown.requested())
        .await
        .map_err(|e| {
            ProviderError::new("Serverless cache was not deleted")
                .for_resource(id.clone())
                .with_cause(e)
        })
}

fn cache_usage_limits(attrs: &Attributes<'_>) -> ProviderResult<Option<CacheUsageLimits>> {
    let Some(limits) = attrs.nested("cache_usage_limits")? else {
        return Ok(None);
    };

    let data_storage = match limits.nested("data_storage")? {
        Some(ds) => Some(DataStorage {
            maximum: ds.int_in_range("maximum", 1..=i32::MAX as i64)?,
            minimum: ds.int_in_range("minimum", 1..=i32::MAX as i64)?,
            unit: ds.required_string("unit")?,
        }),
        None => None,
    };
    let ecpu_per_second = match limits.nested("ecpu_per_second")? {
        Some(ecpu) => Some(EcpuPerSecond {
            maximum: ecpu.int_in_range("maximum", ECPU_RANGE)?,
            minimum: ecpu.int_in_range("minimum", ECPU_RANGE)?,
        }),
        None => None,
    };

    Ok(Some(CacheUsageLimits {
        data_storage,
        ecpu_per_second,
    }))
}

fn cache_state(id: &ResourceId, cache: &ServerlessCache) -> State {
    let mut attributes = AttributeMap::new();
    attributes
        .string("name", Some(&cache.name))
        .string("arn", cache.arn.as_deref())
        .string("status", Some(&cache.status.to_string()))
        .string("engine", cache.engine.as_deref())
        .string("major_engine_version", cache.major_engine_version.as_deref())
        .string("full_engine_version", cache.full_engine_version.as_deref())
        .string("description", cache.description.as_deref())
        .string("kms_key_id", cache.kms_key_id.as_deref())
        .string("daily_snapshot_time", cache.daily_snapshot_time.as_deref())
        .int(
            "snapshot_retention_limit",
            cache.snapshot_retention_limit.map(i64::from),
        )
        .string_list("security_group_ids", &cache.security_group_ids)
        .string_list("subnet_ids", &cache.subnet_ids)
        .string("user_group_id", cache.user_group_id.as_deref())
        .string("create_time", cache.create_time.as_deref());
    if let Some(endpoint) = &cache.endpoint {
        attributes.set("endpoint", endpoint_value(endpoint));
    }
    if let Some(endpoint) = &cache.reader_endpoint {
        attributes.set("reader_endpoint", endpoint_value(endpoint));
    }
    if let Some(limits) = &cache.cache_usage_limits {
        attributes.set("cache_usage_limits", usage_limits_value(limits));
    }

    State::existing(id.clone(), attributes.build()).with_identifier(cache.name.clone())
}

fn endpoint_value(endpoint: &Endpoint) -> Value {
    let mut map = AttributeMap::new();
    map.string("address", endpoint.address.as_deref())
        .int("port", endpoint.port.map(i64::from));
    Value::Map(map.build())
}

fn usage_limits_value(limits: &CacheUsageLimits) -> Value {
    let mut map = HashMap::new();
    if let Some(ds) = &limits.data_storage {
        let mut inner = AttributeMap::new();
        inner
            .int("maximum", ds.maximum.map(i64::from))
            .int("minimum", ds.minimum.map(i64::from))
            .string("unit", Some(&ds.unit));
        map.insert("data_storage".to_string(), Value::Map(inner.build()));
    }
    if let Some(ecpu) = &limits.ecpu_per_second {
        let mut inner = AttributeMap::new();
        inner
            .int("maximum", ecpu.maximum.map(i64::from))
            .int("minimum", ecpu.minimum.map(i64::from));
        map.insert("ecpu_per_second".to_string(), Value::Map(inner.build()));
    }
    Value::Map(map)
}
