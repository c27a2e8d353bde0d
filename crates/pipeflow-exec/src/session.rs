//! Contrato del transporte de sesiones remotas.
//!
//! `open` devuelve una sesión lista para correr comandos; cada comando
//! devuelve su salida. El protocolo concreto queda del lado de la
//! implementación.
use std::path::PathBuf;

use pipeflow_core::Host;
use serde::{Deserialize, Serialize};

use crate::error::ExecError;

/// Credencial ya materializada para abrir una sesión.
#[derive(Clone, PartialEq, Eq)]
pub enum RemoteCredential {
    Password { username: String, secret: String },
    KeyFile { username: String, public_key_path: PathBuf, private_key_path: PathBuf },
}

impl RemoteCredential {
    pub fn username(&self) -> &str {
        match self {
            RemoteCredential::Password { username, .. } => username,
            RemoteCredential::KeyFile { username, .. } => username,
        }
    }
}

impl std::fmt::Debug for RemoteCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteCredential::Password { username, .. } => {
                f.debug_struct("Password").field("username", username).finish_non_exhaustive()
            }
            RemoteCredential::KeyFile { username,
                                        public_key_path,
                                        private_key_path } => f.debug_struct("KeyFile")
                                                               .field("username", username)
                                                               .field("public_key_path", public_key_path)
                                                               .field("private_key_path", private_key_path)
                                                               .finish(),
        }
    }
}

/// Salida de un comando remoto. `exit_code` se guarda pero el executor no
/// lo inspecciona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

pub trait RemoteSession: Send {
    fn run(&mut self, command: &str) -> Result<CommandOutput, ExecError>;
    fn close(&mut self) -> Result<(), ExecError>;
}

pub trait SessionTransport: Send + Sync {
    fn open(&self, host: &Host, credential: &RemoteCredential) -> Result<Box<dyn RemoteSession>, ExecError>;
}
