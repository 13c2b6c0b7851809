use super::domain::{Access, CreateServerOptions, Flavor, NovaImage, RebootType, Server, ServerCreated};
use super::keystone::KeystoneClient;
use crate::config::KeystoneConfig;
use crate::core::http::{FallbackExt, RestClient};
use crate::domain::credentials::Credentials;
use crate::utils::error::{CloudError, Result};
use reqwest::header::ACCEPT;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

#[derive(Deserialize)]
struct ServersBody {
    servers: Vec<Server>,
}

#[derive(Deserialize)]
struct ServerBody {
    server: Server,
}

#[derive(Deserialize)]
struct CreatedBody {
    server: ServerCreated,
}

#[derive(Deserialize)]
struct FlavorsBody {
    flavors: Vec<Flavor>,
}

#[derive(Deserialize)]
struct ImagesBody {
    images: Vec<NovaImage>,
}

/// Nova v2 client. The compute endpoint and token come from Keystone; a
/// rejected token is dropped from the cache and the call is tried once more.
#[derive(Clone)]
pub struct NovaClient {
    keystone: Arc<KeystoneClient>,
    rest: RestClient,
    credentials: Credentials,
    service_type: String,
    region: Option<String>,
}

impl NovaClient {
    pub fn new(
        keystone_endpoint: &str,
        credentials: Credentials,
        config: &KeystoneConfig,
        region: Option<String>,
    ) -> Result<Self> {
        let rest = RestClient::new(keystone_endpoint)?;
        let keystone = Arc::new(KeystoneClient::with_rest(rest.clone(), config));
        Ok(Self {
            keystone,
            rest,
            credentials,
            service_type: config.service_type.clone(),
            region,
        })
    }

    pub fn keystone(&self) -> &KeystoneClient {
        &self.keystone
    }

    pub async fn access(&self) -> Result<Access> {
        self.keystone.access(&self.credentials).await
    }

    /// Regions that offer the compute service.
    pub async fn regions(&self) -> Result<Vec<String>> {
        Ok(self.access().await?.regions(&self.service_type))
    }

    /// The configured region, or the region of the first compute endpoint.
    pub async fn region(&self) -> Result<Option<String>> {
        if self.region.is_some() {
            return Ok(self.region.clone());
        }
        let access = self.access().await?;
        Ok(access
            .endpoint(&self.service_type, None)
            .and_then(|e| e.region.clone()))
    }

    async fn call_once(&self, method: &Method, path: &str, body: Option<&Value>) -> Result<Response> {
        let access = self.access().await?;
        let endpoint = access
            .endpoint(&self.service_type, self.region.as_deref())
            .ok_or_else(|| {
                CloudError::illegal_state(format!(
                    "no {} endpoint{} in the service catalog",
                    self.service_type,
                    self.region
                        .as_deref()
                        .map(|r| format!(" in region {}", r))
                        .unwrap_or_default()
                ))
            })?;
        let rest = self.rest.rebase(&endpoint.public_url)?;
        let mut builder = rest
            .request(method.clone(), path)?
            .header(AUTH_TOKEN_HEADER, &access.token.id)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }
        rest.execute(builder).await
    }

    async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response> {
        match self.call_once(&method, path, body).await {
            Err(CloudError::Unauthorized { message }) => {
                tracing::debug!(%method, path, %message, "token rejected, authenticating again");
                self.keystone.invalidate(&self.credentials).await;
                self.call_once(&method, path, body).await
            }
            other => other,
        }
    }

    async fn json<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<&Value>) -> Result<T> {
        let text = self.call(method, path, body).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn list_servers(&self) -> Result<Vec<Server>> {
        Ok(self.json::<ServersBody>(Method::GET, "servers/detail", None).await?.servers)
    }

    pub async fn get_server(&self, id: &str) -> Result<Option<Server>> {
        Ok(self
            .json::<ServerBody>(Method::GET, &format!("servers/{}", id), None)
            .await
            .or_none_on_not_found()?
            .map(|b| b.server))
    }

    pub async fn create_server(&self, options: &CreateServerOptions) -> Result<ServerCreated> {
        tracing::debug!(name = %options.name, image = %options.image_ref, flavor = %options.flavor_ref, ">> creating server");
        let body = json!({ "server": options });
        let created = self
            .json::<CreatedBody>(Method::POST, "servers", Some(&body))
            .await?
            .server;
        tracing::debug!(name = %options.name, id = %created.id, "<< created server");
        Ok(created)
    }

    /// False when the server was already gone.
    pub async fn delete_server(&self, id: &str) -> Result<bool> {
        tracing::debug!(server = id, ">> deleting server");
        let deleted = self
            .call(Method::DELETE, &format!("servers/{}", id), None)
            .await
            .or_false_on_not_found()?;
        tracing::debug!(server = id, deleted, "<< deleted server");
        Ok(deleted)
    }

    async fn action(&self, id: &str, body: Value) -> Result<()> {
        tracing::debug!(server = id, action = %body, ">> server action");
        self.call(Method::POST, &format!("servers/{}/action", id), Some(&body))
            .await?;
        tracing::debug!(server = id, "<< server action");
        Ok(())
    }

    pub async fn reboot_server(&self, id: &str, reboot: RebootType) -> Result<()> {
        self.action(id, json!({"reboot": {"type": reboot.as_str()}})).await
    }

    pub async fn suspend_server(&self, id: &str) -> Result<()> {
        self.action(id, json!({ "suspend": null })).await
    }

    pub async fn resume_server(&self, id: &str) -> Result<()> {
        self.action(id, json!({ "resume": null })).await
    }

    pub async fn list_flavors(&self) -> Result<Vec<Flavor>> {
        Ok(self.json::<FlavorsBody>(Method::GET, "flavors/detail", None).await?.flavors)
    }

    pub async fn list_images(&self) -> Result<Vec<NovaImage>> {
        Ok(self.json::<ImagesBody>(Method::GET, "images/detail", None).await?.images)
    }
}
