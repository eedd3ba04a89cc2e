//! apprunner.auto_scaling_configuration_version - one revision of an App
//! Runner auto scaling configuration
//!
//! Revisions are immutable: any change means deleting the revision and
//! creating a new one. A deleted revision lingers as `inactive`, which is
//! treated as absent.

use std::time::Duration;

use cairn_core::differ::changed_attributes;
use cairn_core::provider::{ProviderError, ProviderResult};
use cairn_core::resource::{Resource, ResourceId, State, Value};
use cairn_core::waiter::{Shutdown, Waiter};

use super::{
    AppRunnerApi, AutoScalingConfiguration, AutoScalingConfigurationStatus,
    CreateAutoScalingConfigurationRequest,
};
use crate::attributes::{AttributeMap, Attributes};
use crate::error::ApiError;

pub(crate) const RESOURCE_TYPE: &str = "apprunner.auto_scaling_configuration_version";

const DEFAULT_MAX_CONCURRENCY: i32 = 100;
const DEFAULT_MAX_SIZE: i32 = 25;
const DEFAULT_MIN_SIZE: i32 = 1;

const DELETE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Look up a revision, hiding ones that have been deleted
async fn find_active(
    api: &dyn AppRunnerApi,
    arn: &str,
) -> Result<Option<(AutoScalingConfiguration, AutoScalingConfigurationStatus)>, ApiError> {
    Ok(api
        .describe_auto_scaling_configuration(arn)
        .await?
        .filter(|c| c.status != AutoScalingConfigurationStatus::Inactive)
        .map(|c| {
            let status = c.status.clone();
            (c, status)
        }))
}

pub(crate) async fn read(
    api: &dyn AppRunnerApi,
    id: &ResourceId,
    arn: &str,
) -> ProviderResult<State> {
    match find_active(api, arn)
        .await
        .map_err(|e| e.into_provider_error(id, "read auto scaling configuration"))?
    {
        Some((config, _)) => Ok(configuration_state(id, &config)),
        None => Ok(State::not_found(id.clone())),
    }
}

pub(crate) async fn create(api: &dyn AppRunnerApi, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = Attributes::of(resource);
    let request = CreateAutoScalingConfigurationRequest {
        name: attrs.required_string("auto_scaling_configuration_name")?,
        max_concurrency: attrs
            .int_in_range("max_concurrency", 1..=200)?
            .unwrap_or(DEFAULT_MAX_CONCURRENCY),
        max_size: attrs
            .int_in_range("max_size", 1..=25)?
            .unwrap_or(DEFAULT_MAX_SIZE),
        min_size: attrs
            .int_in_range("min_size", 1..=25)?
            .unwrap_or(DEFAULT_MIN_SIZE),
    };

    let config = api
        .create_auto_scaling_configuration(&request)
        .await
        .map_err(|e| e.into_provider_error(id, "create auto scaling configuration"))?;
    log::info!(
        "Created auto scaling configuration {} revision {}",
        config.name,
        config.revision
    );

    Ok(configuration_state(id, &config))
}

pub(crate) async fn update(
    api: &dyn AppRunnerApi,
    id: &ResourceId,
    arn: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let changed = changed_attributes(&to.attributes, &from.attributes);
    if !changed.is_empty() {
        return Err(ProviderError::requires_replacement(&changed).for_resource(id.clone()));
    }
    read(api, id, arn).await
}

pub(crate) async fn delete(
    api: &dyn AppRunnerApi,
    id: &ResourceId,
    arn: &str,
    timeout: Duration,
    shutdown: &Shutdown,
) -> ProviderResult<()> {
    match api.delete_auto_scaling_configuration(arn).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(e.into_provider_error(id, "delete auto scaling configuration")),
    }

    Waiter::new(format!("auto scaling configuration {}", arn), timeout)
        .pending([AutoScalingConfigurationStatus::Active])
        .min_interval(DELETE_POLL_INTERVAL)
        .wait_until_deleted(|| find_active(api, arn), shutdown.requested())
        .await
        .map_err(|e| {
            ProviderError::new("Auto scaling configuration was not deleted")
                .for_resource(id.clone())
                .with_cause(e)
        })?;
    log::info!("Deleted auto scaling configuration {}", arn);
    Ok(())
}

fn configuration_state(id: &ResourceId, config: &AutoScalingConfiguration) -> State {
    let mut attributes = AttributeMap::new();
    attributes
        .string("arn", Some(&config.arn))
        .string("auto_scaling_configuration_name", Some(&config.name))
        .int(
            "auto_scaling_configuration_revision",
            Some(i64::from(config.revision)),
        )
        .set("latest", Value::Bool(config.latest))
        .string("status", Some(&config.status.to_string()))
        .int("max_concurrency", Some(i64::from(config.max_concurrency)))
        .int("max_size", Some(i64::from(config.max_size)))
        .int("min_size", Some(i64::from(config.min_size)))
        .set(
            "has_associated_service",
            Value::Bool(config.has_associated_service),
        )
        .set("is_default", Value::Bool(config.is_default));

    State::existing(id.clone(), attributes.build()).with_identifier(config.arn.clone())
}
