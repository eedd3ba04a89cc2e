//! elasticache.parameter_group - cache parameter groups
//!
//! Attributes: `name`, `family`, `description` and `parameter`, a list of
//! `{name, value}` maps. Only user-sourced parameters are managed; the
//! family defaults are never read back.

use std::time::Duration;

use cairn_core::parameter::{
    Parameter, ParameterSet, RESERVED_MEMORY_PARAMETER, RESERVED_MEMORY_PERCENT_PARAMETER,
    reconcile,
};
use cairn_core::provider::{ProviderError, ProviderResult};
use cairn_core::resource::{Resource, ResourceId, State};
use cairn_core::waiter::retry_when;

use super::ElastiCacheApi;
use crate::attributes::{AttributeMap, Attributes, parameters_value};
use crate::error::{ApiError, ApiResult};

pub(crate) const RESOURCE_TYPE: &str = "elasticache.parameter_group";

pub(crate) const DEFAULT_DESCRIPTION: &str = "Managed by Cairn";

/// The API accepts at most this many parameters per modify or reset call
const MAX_PARAMETERS_PER_CALL: usize = 20;

/// How long modify/reset retry while the group is still applying a change
const STATE_RETRY_TIMEOUT: Duration = Duration::from_secs(30);

const RETRY_INTERVAL: Duration = Duration::from_secs(5);

const INVALID_STATE: &str = "InvalidCacheParameterGroupState";
const INVALID_PARAMETER_VALUE: &str = "InvalidParameterValue";

/// Families that predate `reserved-memory-percent`
const FAMILIES_WITHOUT_RESERVED_MEMORY_PERCENT: [&str; 2] = ["redis2.6", "redis2.8"];

pub(crate) async fn read(
    api: &dyn ElastiCacheApi,
    id: &ResourceId,
    name: &str,
) -> ProviderResult<State> {
    let group = match api
        .describe_cache_parameter_group(name)
        .await
        .map_err(|e| e.into_provider_error(id, "read parameter group"))?
    {
        Some(group) => group,
        None => return Ok(State::not_found(id.clone())),
    };

    let parameters = api
        .describe_user_parameters(name)
        .await
        .map_err(|e| e.into_provider_error(id, "read parameters"))?;
    let parameters = ParameterSet::from_parameters(parameters).map_err(|e| {
        ProviderError::new("Parameter group reported conflicting parameters")
            .for_resource(id.clone())
            .with_cause(e)
    })?;

    let mut attributes = AttributeMap::new();
    attributes
        .string("name", Some(&group.name))
        .string("family", Some(&group.family))
        .string("description", Some(&group.description))
        .string("arn", group.arn.as_deref())
        .set("parameter", parameters_value(&parameters));

    Ok(State::existing(id.clone(), attributes.build()).with_identifier(group.name))
}

pub(crate) async fn create(api: &dyn ElastiCacheApi, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = Attributes::of(resource);
    let name = attrs.required_string("name")?.to_lowercase();
    let family = attrs.required_string("family")?;
    let description = attrs
        .string("description")?
        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());
    let parameters = attrs.parameters("parameter")?;

    api.create_cache_parameter_group(&name, &family, &description)
        .await
        .map_err(|e| e.into_provider_error(id, "create parameter group"))?;
    log::info!("Created parameter group {} ({})", name, family);

    modify_parameters(api, &name, &parameters.to_vec())
        .await
        .map_err(|e| e.into_provider_error(id, "set parameters"))?;

    read(api, id, &name).await
}

pub(crate) async fn update(
    api: &dyn ElastiCacheApi,
    id: &ResourceId,
    name: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let desired = Attributes::of(to);
    let current = Attributes::new(&from.id, &from.attributes);

    let mut immutable = Vec::new();
    if desired.required_string("name")?.to_lowercase() != name {
        immutable.push("name".to_string());
    }
    for key in ["family", "description"] {
        if let Some(value) = desired.string(key)?
            && current.string(key)?.as_deref() != Some(value.as_str())
        {
            immutable.push(key.to_string());
        }
    }
    if !immutable.is_empty() {
        return Err(ProviderError::requires_replacement(&immutable).for_resource(id.clone()));
    }

    let family = desired.required_string("family")?;
    let plan = reconcile(
        &current.parameters("parameter")?,
        &desired.parameters("parameter")?,
    );

    if !plan.to_remove.is_empty() {
        log::debug!("Resetting {} parameter(s) on {}", plan.to_remove.len(), name);
        reset_parameters(api, name, &family, &plan.to_remove, &plan.to_add_or_update)
            .await
            .map_err(|e| e.into_provider_error(id, "reset parameters"))?;
    }
    if !plan.to_add_or_update.is_empty() {
        log::debug!(
            "Setting {} parameter(s) on {}",
            plan.to_add_or_update.len(),
            name
        );
        modify_parameters(api, name, &plan.to_add_or_update)
            .await
            .map_err(|e| e.into_provider_error(id, "set parameters"))?;
    }

    read(api, id, name).await
}

pub(crate) async fn delete(
    api: &dyn ElastiCacheApi,
    id: &ResourceId,
    name: &str,
    timeout: Duration,
) -> ProviderResult<()> {
    let result = retry_when(
        timeout,
        RETRY_INTERVAL,
        || api.delete_cache_parameter_group(name),
        |e: &ApiError| e.is_code(INVALID_STATE),
    )
    .await;

    match result {
        Ok(()) => {
            log::info!("Deleted parameter group {}", name);
            Ok(())
        }
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e.into_provider_error(id, "delete parameter group")),
    }
}

async fn modify_parameters(
    api: &dyn ElastiCacheApi,
    name: &str,
    parameters: &[Parameter],
) -> ApiResult<()> {
    for batch in parameters.chunks(MAX_PARAMETERS_PER_CALL) {
        retry_when(
            STATE_RETRY_TIMEOUT,
            RETRY_INTERVAL,
            || api.modify_cache_parameter_group(name, batch),
            |e: &ApiError| e.is_code(INVALID_STATE),
        )
        .await?;
    }
    Ok(())
}

async fn reset_batch(api: &dyn ElastiCacheApi, name: &str, names: &[String]) -> ApiResult<()> {
    retry_when(
        STATE_RETRY_TIMEOUT,
        RETRY_INTERVAL,
        || api.reset_cache_parameter_group(name, names),
        |e: &ApiError| e.is_code(INVALID_STATE),
    )
    .await
}

/// Reset `removals` in batches.
///
/// `reserved-memory` cannot be reset directly: the API claims it does not
/// exist. When a batch fails that way it is dropped from the batch and
/// `reserved-memory-percent` is cycled instead, which restores the default
/// memory reservation, unless the new parameters set it themselves or the
/// family has no such parameter.
async fn reset_parameters(
    api: &dyn ElastiCacheApi,
    name: &str,
    family: &str,
    removals: &[Parameter],
    additions: &[Parameter],
) -> ApiResult<()> {
    for batch in removals.chunks(MAX_PARAMETERS_PER_CALL) {
        let names: Vec<String> = batch.iter().map(|p| p.name.clone()).collect();

        match reset_batch(api, name, &names).await {
            Err(e)
                if e.is_code_with_message(
                    INVALID_PARAMETER_VALUE,
                    "Parameter reserved-memory doesn't exist",
                ) =>
            {
                log::debug!("{} cannot reset {}", name, RESERVED_MEMORY_PARAMETER);
                let remaining: Vec<String> = names
                    .into_iter()
                    .filter(|n| n != RESERVED_MEMORY_PARAMETER)
                    .collect();

                let sets_percent = additions
                    .iter()
                    .any(|p| p.name == RESERVED_MEMORY_PERCENT_PARAMETER);
                if FAMILIES_WITHOUT_RESERVED_MEMORY_PERCENT.contains(&family) {
                    log::warn!(
                        "Cannot reset {} on parameter group {} with family {}",
                        RESERVED_MEMORY_PARAMETER,
                        name,
                        family
                    );
                } else if !sets_percent {
                    restore_reserved_memory_default(api, name).await?;
                }

                if !remaining.is_empty() {
                    reset_batch(api, name, &remaining).await?;
                }
            }
            result => result?,
        }
    }
    Ok(())
}

async fn restore_reserved_memory_default(api: &dyn ElastiCacheApi, name: &str) -> ApiResult<()> {
    modify_parameters(
        api,
        name,
        &[Parameter::new(RESERVED_MEMORY_PERCENT_PARAMETER, "0")],
    )
    .await?;
    reset_batch(api, name, &[RESERVED_MEMORY_PERCENT_PARAMETER.to_string()]).await
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use cairn_core::resource::Value;

    use super::*;
    use crate::testing::FakeElastiCache;

    fn param(name: &str, value: &str) -> Value {
        Value::Map(HashMap::from([
            ("name".to_string(), Value::String(name.to_string())),
            ("value".to_string(), Value::String(value.to_string())),
        ]))
    }

    fn parameter_names(value: &Value) -> Vec<&str> {
        value
            .as_list()
            .unwrap_or_default()
            .iter()
            .filter_map(|p| p.as_map()?.get("name")?.as_str())
            .collect()
    }

    fn group(family: &str, params: &[(&str, &str)]) -> Resource {
        Resource::new(RESOURCE_TYPE, "cache-params")
            .with_attribute("name", Value::String("Cache-Params".to_string()))
            .with_attribute("family", Value::String(family.to_string()))
            .with_attribute(
                "parameter",
                Value::List(params.iter().map(|(n, v)| param(n, v)).collect()),
            )
    }

    #[tokio::test]
    async fn create_lowercases_name_and_applies_parameters() {
        let api = FakeElastiCache::new();
        let resource = group("redis7", &[("appendonly", "yes"), ("appendfsync", "always")]);

        let state = create(&api, &resource).await.unwrap();

        assert_eq!(state.identifier.as_deref(), Some("cache-params"));
        assert_eq!(
            state.attributes.get("description"),
            Some(&Value::String(DEFAULT_DESCRIPTION.to_string()))
        );
        assert_eq!(parameter_names(&state.attributes["parameter"]), vec![
            "appendfsync",
            "appendonly"
        ]);
        assert_eq!(api.calls(), vec![
            "create cache-params redis7",
            "modify cache-params appendfsync=always,appendonly=yes",
        ]);
    }

    #[tokio::test]
    async fn modify_is_batched_by_twenty() {
        let api = FakeElastiCache::new();
        let params: Vec<(String, String)> =
            (0..45).map(|i| (format!("p{:02}", i), i.to_string())).collect();
        let params: Vec<(&str, &str)> = params
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect();

        create(&api, &group("redis7", &params)).await.unwrap();

        let sizes: Vec<usize> = api
            .calls()
            .iter()
            .filter_map(|c| c.strip_prefix("modify cache-params "))
            .map(|args| args.split(',').count())
            .collect();
        assert_eq!(sizes, vec![20, 20, 5]);
    }

    #[tokio::test]
    async fn read_missing_group_is_not_found() {
        let api = FakeElastiCache::new();
        let id = ResourceId::new(RESOURCE_TYPE, "missing");
        let state = read(&api, &id, "missing").await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn update_resets_removed_and_sets_changed_parameters() {
        let api = FakeElastiCache::new();
        let from = create(
            &api,
            &group("redis7", &[("appendonly", "yes"), ("appendfsync", "always")]),
        )
        .await
        .unwrap();
        api.clear_calls();

        let to = group("redis7", &[("appendonly", "no")]);
        let state = update(&api, &to.id, "cache-params", &from, &to).await.unwrap();

        assert_eq!(api.calls(), vec![
            "reset cache-params appendfsync",
            "modify cache-params appendonly=no",
        ]);
        assert_eq!(parameter_names(&state.attributes["parameter"]), vec!["appendonly"]);
    }

    #[tokio::test]
    async fn removing_reserved_memory_cycles_the_percent_parameter() {
        let api = FakeElastiCache::new().refusing_reserved_memory_reset();
        let from = create(
            &api,
            &group("redis3.2", &[("reserved-memory", "0"), ("tcp-keepalive", "360")]),
        )
        .await
        .unwrap();
        api.clear_calls();

        let to = group("redis3.2", &[]);
        update(&api, &to.id, "cache-params", &from, &to).await.unwrap();

        assert_eq!(api.calls(), vec![
            "reset cache-params reserved-memory,tcp-keepalive",
            "modify cache-params reserved-memory-percent=0",
            "reset cache-params reserved-memory-percent",
            "reset cache-params tcp-keepalive",
        ]);
    }

    #[tokio::test]
    async fn reserved_memory_swapped_for_percent_skips_the_workaround() {
        let api = FakeElastiCache::new().refusing_reserved_memory_reset();
        let from = create(&api, &group("redis3.2", &[("reserved-memory", "0")]))
            .await
            .unwrap();
        api.clear_calls();

        let to = group("redis3.2", &[("reserved-memory-percent", "25")]);
        update(&api, &to.id, "cache-params", &from, &to).await.unwrap();

        assert_eq!(api.calls(), vec![
            "reset cache-params reserved-memory",
            "modify cache-params reserved-memory-percent=25",
        ]);
    }

    #[tokio::test]
    async fn old_families_skip_the_workaround() {
        let api = FakeElastiCache::new().refusing_reserved_memory_reset();
        let from = create(&api, &group("redis2.8", &[("reserved-memory", "0")]))
            .await
            .unwrap();
        api.clear_calls();

        let to = group("redis2.8", &[]);
        update(&api, &to.id, "cache-params", &from, &to).await.unwrap();

        assert_eq!(api.calls(), vec!["reset cache-params reserved-memory"]);
    }

    #[tokio::test]
    async fn changing_family_requires_replacement() {
        let api = FakeElastiCache::new();
        let from = create(&api, &group("redis6.x", &[])).await.unwrap();
        api.clear_calls();

        let to = group("redis7", &[]);
        let err = update(&api, &to.id, "cache-params", &from, &to)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Changing family requires replacement"));
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_retries_while_in_use_and_tolerates_missing() {
        let api = FakeElastiCache::new();
        create(&api, &group("redis7", &[])).await.unwrap();
        api.fail_next_deletes(vec![
            ApiError::service(INVALID_STATE, "in use"),
            ApiError::service(INVALID_STATE, "in use"),
        ]);

        let id = ResourceId::new(RESOURCE_TYPE, "cache-params");
        delete(&api, &id, "cache-params", Duration::from_secs(180))
            .await
            .unwrap();
        assert_eq!(
            api.calls()
                .iter()
                .filter(|c| c.starts_with("delete cache-params"))
                .count(),
            3
        );

        // Already gone
        delete(&api, &id, "cache-params", Duration::from_secs(180))
            .await
            .unwrap();
    }
}
