//! Executors: corren los comandos de una Action en su host.

mod ssh;

pub use ssh::{ExecutionReport, SshExecutor};

use pipeflow_core::ActionBundle;

/// Contrato de un executor. `execute` nunca propaga errores: el fallo se
/// loguea y se reporta como `false`.
pub trait Executor: Send + Sync {
    /// Nombre corto del executor (para logs y registro).
    fn kind(&self) -> &'static str;
    fn execute(&self, bundle: &ActionBundle) -> bool;
}
