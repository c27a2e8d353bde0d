//! Errores del core de traversal.
//!
//! Las brechas de resolución (`make` sin constructor registrado) NO son
//! errores: terminan la rama de forma intencional y nunca llegan aquí.

use thiserror::Error;

use crate::model::EntityRef;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// El store no tiene la entidad pedida.
    #[error("entity not found: {0}")]
    NotFound(EntityRef),
    /// Un identificador que fue válido apunta a una entidad ya borrada.
    #[error("dangling identifier: {0} no longer exists")]
    DanglingIdentifier(EntityRef),
    /// Una entrada del Bag (o el snapshot completo) no puede cruzar la cola.
    #[error("transport serialization failed: {0}")]
    TransportSerialization(String),
    /// Un identificador restaurado apunta a un kind sin Pipe registrado.
    #[error("no pipe registered for kind '{0}'")]
    UnregisteredKind(String),
    #[error("traveler has no next pipe to resume")]
    MissingNextPipe,
    #[error("store error: {0}")]
    Store(String),
    #[error("queue error: {0}")]
    Queue(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Convierte un `NotFound` en `DanglingIdentifier`; el resto pasa intacto.
    pub fn into_dangling(self) -> Self {
        match self {
            PipelineError::NotFound(r) => PipelineError::DanglingIdentifier(r),
            other => other,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::TransportSerialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
