//! Provider configuration

use std::time::Duration;

use serde::Deserialize;

/// Provider-wide settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// AWS region; falls back to the SDK's default chain (AWS_REGION, profile)
    pub region: Option<String>,

    /// How long each lifecycle operation may take
    pub timeouts: ResourceTimeouts,
}

/// Operation timeouts, in seconds when deserialized
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResourceTimeouts {
    #[serde(with = "seconds")]
    pub serverless_cache_create: Duration,
    #[serde(with = "seconds")]
    pub serverless_cache_update: Duration,
    #[serde(with = "seconds")]
    pub serverless_cache_delete: Duration,
    /// Retry window for deleting a parameter group that is still in use
    #[serde(with = "seconds")]
    pub parameter_group_delete: Duration,
    #[serde(with = "seconds")]
    pub auto_scaling_configuration_delete: Duration,
}

impl Default for ResourceTimeouts {
    fn default() -> Self {
        Self {
            serverless_cache_create: Duration::from_secs(40 * 60),
            serverless_cache_update: Duration::from_secs(80 * 60),
            serverless_cache_delete: Duration::from_secs(40 * 60),
            parameter_group_delete: Duration::from_secs(3 * 60),
            auto_scaling_configuration_delete: Duration::from_secs(5 * 60),
        }
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
