use super::domain::{Access, AccessResponse};
use crate::config::{KeystoneConfig, KeystoneCredentialType};
use crate::core::cache::LoadingCache;
use crate::core::http::RestClient;
use crate::domain::credentials::Credentials;
use crate::utils::error::Result;
use chrono::Utc;
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;

/// Splits `tenant:user`; a bare identity has no tenant.
pub fn tenant_and_user(identity: &str) -> (Option<&str>, &str) {
    match identity.split_once(':') {
        Some((tenant, user)) => (Some(tenant), user),
        None => (None, identity),
    }
}

/// The `auth` body for `POST /tokens`.
pub fn auth_body(credentials: &Credentials, credential_type: KeystoneCredentialType) -> Value {
    let (tenant, user) = tenant_and_user(&credentials.identity);
    let mut auth = match credential_type {
        KeystoneCredentialType::Password => json!({
            "passwordCredentials": {"username": user, "password": credentials.credential}
        }),
        KeystoneCredentialType::ApiAccessKey => json!({
            "apiAccessKeyCredentials": {"accessKey": user, "secretKey": credentials.credential}
        }),
    };
    if let Some(tenant) = tenant {
        auth["tenantName"] = json!(tenant);
    }
    json!({ "auth": auth })
}

/// Keystone v2.0 client with a token cache keyed by credentials.
pub struct KeystoneClient {
    rest: RestClient,
    credential_type: KeystoneCredentialType,
    tokens: LoadingCache<Credentials, Access>,
}

impl KeystoneClient {
    pub fn new(endpoint: &str, config: &KeystoneConfig) -> Result<Self> {
        Ok(Self::with_rest(RestClient::new(endpoint)?, config))
    }

    pub fn with_rest(rest: RestClient, config: &KeystoneConfig) -> Self {
        let tokens = LoadingCache::new(Duration::from_secs(config.token_ttl_secs)).with_expiry(|access: &Access| {
            Some((access.token.expires - Utc::now()).to_std().unwrap_or(Duration::ZERO))
        });
        Self {
            rest,
            credential_type: config.credential_type,
            tokens,
        }
    }

    /// Always goes to the server.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Access> {
        tracing::debug!(identity = %credentials.identity, ">> authenticating");
        let builder = self
            .rest
            .request(Method::POST, "tokens")?
            .header(ACCEPT, "application/json")
            .json(&auth_body(credentials, self.credential_type));
        let body = self.rest.execute(builder).await?.text().await?;
        let access = serde_json::from_str::<AccessResponse>(&body)?.access;
        tracing::debug!(identity = %credentials.identity, expires = %access.token.expires, "<< authenticated");
        Ok(access)
    }

    /// The cached access for `credentials`, authenticating on a miss.
    pub async fn access(&self, credentials: &Credentials) -> Result<Access> {
        self.tokens
            .get_or_load(credentials, || self.authenticate(credentials))
            .await
    }

    pub async fn invalidate(&self, credentials: &Credentials) {
        self.tokens.invalidate(credentials).await;
    }
}
