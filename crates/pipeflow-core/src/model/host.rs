//! Host destino y credenciales.
//!
//! Para el core `Auth` es opaco salvo por `is_key_authentication()`; el
//! executor SSH es el único que mira dentro de `Credentials`.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: Uuid,
    pub address: String,
    pub port: u16,
    /// Auth por defecto del host; una Action puede sobrescribirla.
    pub auth_id: Option<Uuid>,
}

impl Host {
    pub fn new(address: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(),
               address: address.into(),
               port: 22,
               auth_id: None }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_auth(mut self, auth_id: Uuid) -> Self {
        self.auth_id = Some(auth_id);
        self
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    Password { password: String },
    KeyPair { private_key: String, public_key: String },
}

// El material secreto nunca debe terminar en logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password { .. } => f.write_str("Password(<redacted>)"),
            Credentials::KeyPair { .. } => f.write_str("KeyPair(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    pub id: Uuid,
    pub username: String,
    pub credentials: Credentials,
}

impl Auth {
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(),
               username: username.into(),
               credentials: Credentials::Password { password: password.into() } }
    }

    pub fn key_pair(username: impl Into<String>, private_key: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(),
               username: username.into(),
               credentials: Credentials::KeyPair { private_key: private_key.into(),
                                                   public_key: public_key.into() } }
    }

    pub fn is_key_authentication(&self) -> bool {
        matches!(self.credentials, Credentials::KeyPair { .. })
    }
}
