use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider login: an account identity plus its secret.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credentials {
    pub identity: String,
    pub credential: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            credential: credential.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Credentials for logging into a provisioned node.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub user: String,
    pub password: Option<String>,
    pub private_key: Option<String>,
    #[serde(default)]
    pub authenticate_sudo: bool,
}

impl LoginCredentials {
    pub fn password(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    pub fn private_key(user: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            private_key: Some(key.into()),
            ..Default::default()
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("authenticate_sudo", &self.authenticate_sudo)
            .finish()
    }
}
