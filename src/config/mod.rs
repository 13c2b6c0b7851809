#[cfg(feature = "cli")]
pub mod cli;

use crate::domain::credentials::Credentials;
use crate::core::retry::RetryPolicy;
use crate::utils::error::{CloudError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("static env var pattern"));

/// Everything needed to build one provider context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: ProviderSection,
    #[serde(default)]
    pub compute: ComputeConfig,
    #[serde(default)]
    pub blobstore: BlobStoreConfig,
    #[serde(default)]
    pub keystone: KeystoneConfig,
    #[serde(default)]
    pub elasticstack: ElasticStackConfig,
    #[serde(default)]
    pub softlayer: SoftLayerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSection {
    pub name: String,
    /// Overrides the provider's default endpoint.
    pub endpoint: Option<String>,
    pub identity: Option<String>,
    pub credential: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    pub node_running_timeout_secs: u64,
    pub node_terminated_timeout_secs: u64,
    pub poll_period_ms: u64,
    pub max_poll_period_ms: u64,
    pub max_concurrent_operations: usize,
    pub max_name_attempts: usize,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            node_running_timeout_secs: 1200,
            node_terminated_timeout_secs: 30,
            poll_period_ms: 500,
            max_poll_period_ms: 5000,
            max_concurrent_operations: 10,
            max_name_attempts: 100,
        }
    }
}

impl ComputeConfig {
    pub fn node_running_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(self.node_running_timeout_secs),
            Duration::from_millis(self.poll_period_ms),
            Duration::from_millis(self.max_poll_period_ms),
        )
    }

    pub fn node_terminated_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(self.node_terminated_timeout_secs),
            Duration::from_millis(self.poll_period_ms),
            Duration::from_millis(self.max_poll_period_ms),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobStoreConfig {
    /// Root of the filesystem provider.
    pub base_dir: String,
    pub default_max_results: usize,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            base_dir: "./blobstore".to_string(),
            default_max_results: crate::domain::blob::DEFAULT_MAX_RESULTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeystoneCredentialType {
    #[default]
    Password,
    ApiAccessKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoneConfig {
    pub credential_type: KeystoneCredentialType,
    pub token_ttl_secs: u64,
    pub service_type: String,
}

impl Default for KeystoneConfig {
    fn default() -> Self {
        Self {
            credential_type: KeystoneCredentialType::Password,
            token_ttl_secs: 23 * 3600,
            service_type: "compute".to_string(),
        }
    }
}

/// A standard drive the image catalog offers when the API reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardDrive {
    pub uuid: String,
    pub name: String,
    #[serde(default = "default_drive_size_gb")]
    pub size_gb: u32,
}

fn default_drive_size_gb() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticStackConfig {
    pub standard_drives: Vec<StandardDrive>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftLayerConfig {
    pub package_name: String,
    pub domain: String,
    /// Prices added to every order (network, bandwidth, monitoring).
    pub default_prices: Vec<u64>,
}

impl Default for SoftLayerConfig {
    fn default() -> Self {
        Self {
            package_name: "Cloud Server".to_string(),
            domain: "polycloud.local".to_string(),
            default_prices: Vec::new(),
        }
    }
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: ProviderSection {
                name: provider.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content);
        toml::from_str(&processed).map_err(|e| CloudError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.provider.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credentials(mut self, identity: impl Into<String>, credential: impl Into<String>) -> Self {
        self.provider.identity = Some(identity.into());
        self.provider.credential = Some(credential.into());
        self
    }

    /// Identity and credential, both required for remote providers.
    pub fn credentials(&self) -> Result<Credentials> {
        let identity = validation::validate_required_field("provider.identity", &self.provider.identity)?;
        let credential =
            validation::validate_required_field("provider.credential", &self.provider.credential)?;
        Ok(Credentials::new(identity.clone(), credential.clone()))
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("provider.name", &self.provider.name)?;
        if let Some(endpoint) = &self.provider.endpoint {
            validation::validate_url("provider.endpoint", endpoint)?;
        }
        validation::validate_path("blobstore.base_dir", &self.blobstore.base_dir)?;
        validation::validate_range(
            "blobstore.default_max_results",
            self.blobstore.default_max_results,
            1,
            10_000,
        )?;
        validation::validate_positive_number(
            "compute.max_concurrent_operations",
            self.compute.max_concurrent_operations,
            1,
        )?;
        validation::validate_positive_number("compute.max_name_attempts", self.compute.max_name_attempts, 1)?;
        if self.compute.poll_period_ms == 0 {
            return Err(CloudError::InvalidConfigValueError {
                field: "compute.poll_period_ms".to_string(),
                value: "0".to_string(),
                reason: "Polling period must be positive".to_string(),
            });
        }
        if self.compute.max_poll_period_ms < self.compute.poll_period_ms {
            return Err(CloudError::InvalidConfigValueError {
                field: "compute.max_poll_period_ms".to_string(),
                value: self.compute.max_poll_period_ms.to_string(),
                reason: "Must not be smaller than compute.poll_period_ms".to_string(),
            });
        }
        Ok(())
    }
}

impl Validate for ProviderConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

/// Replaces `${VAR}` with the environment value; unknown variables are left as is.
fn substitute_env_vars(content: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
}
