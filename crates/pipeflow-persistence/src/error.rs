//! Errores de persistencia.
//! Mapea errores de Diesel / pool a variantes semánticas.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use pipeflow_core::PipelineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("not found")]
    NotFound,
    #[error("serialization conflict (retryable)")]
    SerializationConflict,
    #[error("transient IO / connection pool error: {0}")]
    TransientIo(String),
    /// Payload JSON que no deserializa al tipo esperado.
    #[error("corrupt row: {0}")]
    CorruptRow(String),
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("unknown database error: {0}")]
    Unknown(String),
}

impl From<DieselError> for PersistenceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::UniqueViolation => Self::UniqueViolation(info.message().to_string()),
                DatabaseErrorKind::CheckViolation => Self::CheckViolation(info.message().to_string()),
                DatabaseErrorKind::ForeignKeyViolation => Self::ForeignKeyViolation(info.message().to_string()),
                DatabaseErrorKind::SerializationFailure => Self::SerializationConflict,
                DatabaseErrorKind::ClosedConnection => Self::TransientIo(info.message().to_string()),
                other => Self::Unknown(format!("db error kind {:?}: {}", other, info.message())),
            },
            DieselError::DeserializationError(e) => Self::CorruptRow(format!("deser: {e}")),
            DieselError::SerializationError(e) => Self::Unknown(format!("ser: {e}")),
            DieselError::BrokenTransactionManager => Self::TransientIo("broken transaction manager".into()),
            DieselError::QueryBuilderError(e) => Self::Unknown(format!("query builder: {e}")),
            other => Self::Unknown(format!("unhandled diesel error: {other:?}")),
        }
    }
}

/// Fragmentos de mensajes de Postgres/libpq que indican una falla pasajera
/// cuando Diesel no la clasifica.
const TRANSIENT_MESSAGES: &[&str] = &["deadlock detected",
                                      "could not serialize access",
                                      "terminating connection",
                                      "connection closed",
                                      "connection refused",
                                      "timeout"];

impl PersistenceError {
    /// Vale la pena reintentar la operación completa.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::SerializationConflict | Self::TransientIo(_) => true,
            Self::Unknown(msg) => {
                let msg = msg.to_lowercase();
                TRANSIENT_MESSAGES.iter().any(|m| msg.contains(m))
            }
            _ => false,
        }
    }
}

/// Los traits del core sólo conocen `PipelineError`. `NotFound` sin
/// referencia no se traduce aquí: los stores lo convierten con la
/// referencia que estaban buscando.
impl From<PersistenceError> for PipelineError {
    fn from(err: PersistenceError) -> Self {
        PipelineError::Store(err.to_string())
    }
}
