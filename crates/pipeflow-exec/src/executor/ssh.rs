use std::path::PathBuf;

use log::{error, info, warn};
use pipeflow_core::ActionBundle;

use super::Executor;
use crate::config::SshConfig;
use crate::error::ExecError;
use crate::keys::CredentialLease;
use crate::session::{CommandOutput, SessionTransport};

/// Executor SSH. Abre una sesión por Action, corre los comandos en orden
/// de `position` y libera el material de clave en cualquier salida.
pub struct SshExecutor<T: SessionTransport> {
    transport: T,
    key_dir: PathBuf,
}

impl<T: SessionTransport> SshExecutor<T> {
    pub fn new(transport: T, key_dir: impl Into<PathBuf>) -> Self {
        Self { transport,
               key_dir: key_dir.into() }
    }

    pub fn with_config(transport: T, config: &SshConfig) -> Self {
        Self::new(transport, config.key_dir.clone())
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Corre la Action y devuelve todo lo recogido, también cuando un
    /// comando corta la ejecución a mitad. Falla rápido sin host o sin
    /// auth, antes de tocar disco o red. Cada salida recogida se loguea.
    pub fn run_action(&self, bundle: &ActionBundle) -> ExecutionReport {
        let action_id = bundle.action.id;
        let Some(host) = bundle.host.as_ref() else {
            return ExecutionReport::failed(ExecError::MissingHost(action_id));
        };
        let Some(auth) = bundle.auth.as_ref() else {
            return ExecutionReport::failed(ExecError::MissingAuth(action_id));
        };

        let lease = match CredentialLease::acquire(auth, &self.key_dir) {
            Ok(lease) => lease,
            Err(e) => return ExecutionReport::failed(e),
        };
        let report = self.run_commands(bundle, host, &lease);
        // Liberación explícita; si algo entra en pánico antes, el drop de
        // `lease` borra igual los archivos.
        lease.release();

        for output in &report.outputs {
            info!("ssh:output action={action_id} host={} command={:?} exit={:?}\n{}{}",
                  host.address, output.command, output.exit_code, output.stdout, output.stderr);
        }
        report
    }

    /// Variante con error tipado de `execute`.
    pub fn try_execute(&self, bundle: &ActionBundle) -> Result<Vec<CommandOutput>, ExecError> {
        self.run_action(bundle).into_result()
    }

    fn run_commands(&self, bundle: &ActionBundle, host: &pipeflow_core::Host, lease: &CredentialLease) -> ExecutionReport {
        let mut session = match self.transport.open(host, lease.credential()) {
            Ok(session) => session,
            Err(e) => return ExecutionReport::failed(e),
        };
        let mut commands: Vec<_> = bundle.commands.iter().collect();
        commands.sort_by_key(|c| c.position);

        let mut report = ExecutionReport { outputs: Vec::with_capacity(commands.len()),
                                           error:   None };
        for command in commands {
            match session.run(&command.command) {
                Ok(output) => report.outputs.push(output),
                Err(e) => {
                    report.error = Some(e);
                    break;
                }
            }
        }
        if let Err(e) = session.close() {
            warn!("ssh:close failed action={} err={e}", bundle.action.id);
        }
        report
    }
}

/// Salidas de una Action y, si lo hubo, el error que la cortó. Las salidas
/// son las de los comandos que llegaron a correr antes del error.
#[derive(Debug)]
pub struct ExecutionReport {
    pub outputs: Vec<CommandOutput>,
    pub error:   Option<ExecError>,
}

impl ExecutionReport {
    fn failed(error: ExecError) -> Self {
        Self { outputs: Vec::new(),
               error:   Some(error) }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Vec<CommandOutput>, ExecError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.outputs),
        }
    }
}

impl<T: SessionTransport> Executor for SshExecutor<T> {
    fn kind(&self) -> &'static str {
        "ssh"
    }

    fn execute(&self, bundle: &ActionBundle) -> bool {
        let report = self.run_action(bundle);
        match &report.error {
            None => {
                info!("ssh:execute ok action={} commands={}", bundle.action.id, report.outputs.len());
                true
            }
            Some(e) => {
                error!("ssh:execute failed action={} completed={} err={e}",
                       bundle.action.id,
                       report.outputs.len());
                false
            }
        }
    }
}
