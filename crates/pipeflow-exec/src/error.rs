//! Errores de ejecución remota.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("action {0} has no host")]
    MissingHost(Uuid),
    #[error("action {0} has no auth")]
    MissingAuth(Uuid),
    /// Datos de credencial mal formados (usuario vacío, clave vacía, ...).
    #[error("authentication configuration: {0}")]
    AuthenticationConfiguration(String),
    #[error("remote connection to {host} failed: {message}")]
    RemoteConnection { host: String, message: String },
    #[error("remote command '{command}' failed: {message}")]
    RemoteCommand { command: String, message: String },
    #[error("key material io: {0}")]
    KeyMaterial(#[from] std::io::Error),
}
