//! pipeflow-exec: ejecución remota de Actions.
//!
//! El executor SSH resuelve host y credencial desde la lectura compuesta
//! de la Action, materializa claves efímeras cuando hace falta y corre los
//! comandos en orden sobre una sesión del `SessionTransport`.
pub mod config;
pub mod error;
pub mod executor;
pub mod keys;
pub mod pipes;
pub mod session;
pub mod ssh_cli;

pub use config::SshConfig;
pub use error::ExecError;
pub use executor::{ExecutionReport, Executor, SshExecutor};
pub use keys::{CredentialLease, EphemeralKeyPair};
pub use pipes::{register_action_pipe, ActionPipe};
pub use session::{CommandOutput, RemoteCredential, RemoteSession, SessionTransport};
pub use ssh_cli::SshCliTransport;
