//! Provider registry and the builder that wires a configured provider into a
//! portable `BlobStore` or `ComputeService`.

use crate::adapters::atmos::{self, AtmosBlobStore, AtmosClient};
use crate::adapters::elasticstack::{client as elasticstack_client, ElasticStackClient, ElasticStackComputeServiceAdapter};
use crate::adapters::filesystem::FilesystemBlobStore;
use crate::adapters::openstack::{NovaClient, NovaComputeServiceAdapter};
use crate::adapters::softlayer::{client as softlayer_client, SoftLayerClient, SoftLayerComputeServiceAdapter};
use crate::adapters::stub_compute::StubComputeServiceAdapter;
use crate::adapters::transient::TransientBlobStore;
use crate::config::ProviderConfig;
use crate::core::compute_service::AdapterComputeService;
use crate::domain::location::Location;
use crate::domain::ports::{BlobStore, ComputeService};
use crate::utils::error::{CloudError, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    BlobStore,
    Compute,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::BlobStore => f.write_str("blobstore"),
            ProviderKind::Compute => f.write_str("compute"),
        }
    }
}

/// Static facts about a provider: which API it speaks and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderMetadata {
    pub id: &'static str,
    pub name: &'static str,
    pub api: &'static str,
    pub default_endpoint: Option<&'static str>,
    pub kinds: &'static [ProviderKind],
    pub iso3166_codes: &'static [&'static str],
    /// Whether identity and credential must be configured.
    pub requires_credentials: bool,
}

impl ProviderMetadata {
    pub fn supports(&self, kind: ProviderKind) -> bool {
        self.kinds.contains(&kind)
    }
}

const PROVIDERS: [ProviderMetadata; 8] = [
    ProviderMetadata {
        id: "transient",
        name: "In-memory blob store",
        api: "transient",
        default_endpoint: None,
        kinds: &[ProviderKind::BlobStore],
        iso3166_codes: &[],
        requires_credentials: false,
    },
    ProviderMetadata {
        id: "filesystem",
        name: "Local filesystem blob store",
        api: "filesystem",
        default_endpoint: None,
        kinds: &[ProviderKind::BlobStore],
        iso3166_codes: &[],
        requires_credentials: false,
    },
    ProviderMetadata {
        id: "atmos",
        name: "EMC Atmos Online",
        api: "atmos",
        default_endpoint: Some(atmos::client::DEFAULT_ENDPOINT),
        kinds: &[ProviderKind::BlobStore],
        iso3166_codes: &["US-MA"],
        requires_credentials: true,
    },
    ProviderMetadata {
        id: "stub",
        name: "In-memory compute",
        api: "stub",
        default_endpoint: None,
        kinds: &[ProviderKind::Compute],
        iso3166_codes: &[],
        requires_credentials: false,
    },
    ProviderMetadata {
        id: "elastichosts-lon-p",
        name: "ElasticHosts London Peer 1",
        api: "elasticstack",
        default_endpoint: Some(elasticstack_client::ELASTICHOSTS_LON_P),
        kinds: &[ProviderKind::Compute],
        iso3166_codes: &["GB-LND"],
        requires_credentials: true,
    },
    ProviderMetadata {
        id: "cloudsigma-zrh",
        name: "CloudSigma Zurich",
        api: "elasticstack",
        default_endpoint: Some(elasticstack_client::CLOUDSIGMA_ZRH),
        kinds: &[ProviderKind::Compute],
        iso3166_codes: &["CH-ZH"],
        requires_credentials: true,
    },
    ProviderMetadata {
        id: "softlayer",
        name: "SoftLayer",
        api: "softlayer",
        default_endpoint: Some(softlayer_client::DEFAULT_ENDPOINT),
        kinds: &[ProviderKind::Compute],
        iso3166_codes: &["SG", "US-CA", "US-TX", "US-VA", "US-WA"],
        requires_credentials: true,
    },
    ProviderMetadata {
        id: "openstack-nova",
        name: "OpenStack Nova",
        api: "openstack-nova",
        default_endpoint: Some("http://localhost:5000/v2.0"),
        kinds: &[ProviderKind::Compute],
        iso3166_codes: &[],
        requires_credentials: true,
    },
];

pub fn providers() -> &'static [ProviderMetadata] {
    &PROVIDERS
}

pub fn provider(id: &str) -> Option<&'static ProviderMetadata> {
    PROVIDERS.iter().find(|p| p.id == id)
}

/// Builds provider contexts out of a `ProviderConfig`.
pub struct ContextBuilder {
    config: ProviderConfig,
    metadata: &'static ProviderMetadata,
}

impl ContextBuilder {
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let metadata = provider(&config.provider.name).ok_or_else(|| CloudError::UnsupportedProvider {
            provider: config.provider.name.clone(),
            reason: format!(
                "unknown provider, expected one of: {}",
                PROVIDERS.iter().map(|p| p.id).collect::<Vec<_>>().join(", ")
            ),
        })?;
        Ok(Self {
            config: config.clone(),
            metadata,
        })
    }

    pub fn metadata(&self) -> &'static ProviderMetadata {
        self.metadata
    }

    fn require(&self, kind: ProviderKind) -> Result<()> {
        if self.metadata.supports(kind) {
            Ok(())
        } else {
            Err(CloudError::UnsupportedProvider {
                provider: self.metadata.id.to_string(),
                reason: format!("does not offer a {} service", kind),
            })
        }
    }

    fn endpoint(&self) -> Result<String> {
        self.config
            .provider
            .endpoint
            .clone()
            .or_else(|| self.metadata.default_endpoint.map(str::to_string))
            .ok_or_else(|| CloudError::ConfigValidationError {
                field: "provider.endpoint".to_string(),
                message: format!("provider {} needs an endpoint", self.metadata.id),
            })
    }

    fn provider_location(&self) -> Location {
        Location::provider(self.metadata.id).with_iso3166_codes(self.metadata.iso3166_codes.iter().copied())
    }

    pub fn build_blob_store(&self) -> Result<Arc<dyn BlobStore>> {
        self.require(ProviderKind::BlobStore)?;
        tracing::info!(provider = self.metadata.id, "building blob store");
        let store: Arc<dyn BlobStore> = match self.metadata.api {
            "transient" => Arc::new(TransientBlobStore::new()),
            "filesystem" => Arc::new(FilesystemBlobStore::new(&self.config.blobstore.base_dir)),
            "atmos" => {
                let client = AtmosClient::new(&self.endpoint()?, &self.config.credentials()?)?;
                Arc::new(AtmosBlobStore::new(client))
            }
            api => return Err(self.unwired(api)),
        };
        Ok(store)
    }

    pub fn build_compute_service(&self) -> Result<Arc<dyn ComputeService>> {
        self.require(ProviderKind::Compute)?;
        tracing::info!(provider = self.metadata.id, "building compute service");
        let compute = self.config.compute.clone();
        let service: Arc<dyn ComputeService> = match self.metadata.api {
            "stub" => Arc::new(AdapterComputeService::new(StubComputeServiceAdapter::new(), compute)),
            "elasticstack" => {
                let client = ElasticStackClient::new(&self.endpoint()?, self.config.credentials()?)?;
                let adapter = ElasticStackComputeServiceAdapter::new(
                    client,
                    self.provider_location(),
                    self.config.elasticstack.standard_drives.clone(),
                )
                .with_imaging_policy(compute.node_running_policy());
                Arc::new(AdapterComputeService::new(adapter, compute))
            }
            "softlayer" => {
                let client = SoftLayerClient::new(&self.endpoint()?, self.config.credentials()?)?;
                let adapter = SoftLayerComputeServiceAdapter::new(client, self.config.softlayer.clone())
                    .with_login_policy(compute.node_running_policy());
                Arc::new(AdapterComputeService::new(adapter, compute))
            }
            "openstack-nova" => {
                let client = NovaClient::new(
                    &self.endpoint()?,
                    self.config.credentials()?,
                    &self.config.keystone,
                    self.config.provider.region.clone(),
                )?;
                Arc::new(AdapterComputeService::new(NovaComputeServiceAdapter::new(client), compute))
            }
            api => return Err(self.unwired(api)),
        };
        Ok(service)
    }

    fn unwired(&self, api: &str) -> CloudError {
        CloudError::UnsupportedProvider {
            provider: self.metadata.id.to_string(),
            reason: format!("no adapter for api {}", api),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_ids_are_unique_and_known() {
        let ids: Vec<_> = providers().iter().map(|p| p.id).collect();
        assert_eq!(
            ids,
            vec![
                "transient",
                "filesystem",
                "atmos",
                "stub",
                "elastichosts-lon-p",
                "cloudsigma-zrh",
                "softlayer",
                "openstack-nova"
            ]
        );
        assert_eq!(provider("cloudsigma-zrh").unwrap().api, "elasticstack");
        assert!(provider("aws-ec2").is_none());
    }

    #[test]
    fn test_unknown_provider_is_unsupported() {
        let err = ContextBuilder::from_config(&ProviderConfig::new("aws-ec2")).err().unwrap();
        assert!(matches!(err, CloudError::UnsupportedProvider { .. }));
    }

    #[test]
    fn test_wrong_kind_is_unsupported() {
        let builder = ContextBuilder::from_config(&ProviderConfig::new("transient")).unwrap();
        assert!(matches!(
            builder.build_compute_service().err().unwrap(),
            CloudError::UnsupportedProvider { .. }
        ));
        let builder = ContextBuilder::from_config(&ProviderConfig::new("stub")).unwrap();
        assert!(builder.build_blob_store().is_err());
    }

    #[test]
    fn test_remote_providers_need_credentials() {
        let builder = ContextBuilder::from_config(&ProviderConfig::new("atmos")).unwrap();
        assert!(matches!(
            builder.build_blob_store().err().unwrap(),
            CloudError::ConfigValidationError { .. }
        ));

        let config = ProviderConfig::new("softlayer").with_credentials("user", "key");
        let builder = ContextBuilder::from_config(&config).unwrap();
        assert!(builder.build_compute_service().is_ok());
    }

    #[tokio::test]
    async fn test_builds_local_contexts() {
        let store = ContextBuilder::from_config(&ProviderConfig::new("transient"))
            .unwrap()
            .build_blob_store()
            .unwrap();
        assert!(store.create_container_in_location(None, "c").await.unwrap());

        let compute = ContextBuilder::from_config(&ProviderConfig::new("stub"))
            .unwrap()
            .build_compute_service()
            .unwrap();
        assert_eq!(compute.list_hardware_profiles().await.unwrap().len(), 3);
    }
}
