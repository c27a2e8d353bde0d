//! Errores de la aplicación y su código de salida.
use pipeflow_core::PipelineError;
use pipeflow_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("uso: {0}")]
    Usage(String),
    #[error("fixture inválido: {0}")]
    Fixture(PipelineError),
    #[error("backend: {0}")]
    Backend(#[from] PersistenceError),
    #[error("pipeline: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("tarea interrumpida: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Usage(_) => 2,
            AppError::Fixture(_) => 3,
            AppError::Pipeline(_) | AppError::Task(_) => 4,
            AppError::Backend(_) => 5,
        }
    }
}
