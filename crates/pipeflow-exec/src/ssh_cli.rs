//! Transporte que delega en el binario `ssh` del sistema.
//!
//! Cada comando es una invocación de `ssh` no interactiva. Para password se
//! envuelve con `sshpass -e` y el secreto viaja en `SSHPASS`, nunca en la
//! línea de comandos. `ssh` reserva el exit 255 para fallas propias
//! (conexión, autenticación); cualquier otro código es del comando remoto
//! y no se inspecciona.
use std::process::{Command, Stdio};

use log::{debug, warn};
use pipeflow_core::Host;

use crate::config::SshConfig;
use crate::error::ExecError;
use crate::session::{CommandOutput, RemoteCredential, RemoteSession, SessionTransport};

const SSH_TRANSPORT_EXIT: i32 = 255;

#[derive(Debug, Clone)]
pub struct SshCliTransport {
    config: SshConfig,
}

impl SshCliTransport {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Argumentos de `ssh` (sin el comando remoto).
    ///
    /// El destino va detrás de `--` y ni usuario ni dirección pueden empezar
    /// con `-`, para que `ssh` no los lea como opciones.
    pub fn build_ssh_args(&self, host: &Host, credential: &RemoteCredential) -> Result<Vec<String>, ExecError> {
        let destination = destination(credential.username(), &host.address)?;
        let mut args = Vec::new();
        if let RemoteCredential::KeyFile { private_key_path, .. } = credential {
            args.push("-i".to_string());
            args.push(private_key_path.display().to_string());
            args.extend(["-o".to_string(), "IdentitiesOnly=yes".to_string()]);
        }
        if host.port != 22 {
            args.push("-p".to_string());
            args.push(host.port.to_string());
        }
        let batch_mode = match credential {
            RemoteCredential::KeyFile { .. } => "BatchMode=yes".to_string(),
            // sshpass necesita el prompt de password.
            RemoteCredential::Password { .. } => "BatchMode=no".to_string(),
        };
        let options = [batch_mode,
                       format!("ConnectTimeout={}", self.config.connect_timeout_secs),
                       format!("ServerAliveInterval={}", self.config.server_alive_interval_secs),
                       format!("ServerAliveCountMax={}", self.config.server_alive_count_max),
                       format!("StrictHostKeyChecking={}", self.config.strict_host_key_checking)];
        for option in options {
            args.push("-o".to_string());
            args.push(option);
        }
        if matches!(credential, RemoteCredential::Password { .. }) {
            args.extend(["-o".to_string(), "PubkeyAuthentication=no".to_string()]);
        }
        args.push("--".to_string());
        args.push(destination);
        Ok(args)
    }
}

fn destination(username: &str, address: &str) -> Result<String, ExecError> {
    for (field, value) in [("username", username), ("host address", address)] {
        if value.is_empty() || value.starts_with('-') {
            return Err(ExecError::AuthenticationConfiguration(format!("invalid ssh {field} '{value}'")));
        }
    }
    Ok(format!("{username}@{address}"))
}

impl SessionTransport for SshCliTransport {
    fn open(&self, host: &Host, credential: &RemoteCredential) -> Result<Box<dyn RemoteSession>, ExecError> {
        let (program, prefix, secret) = match credential {
            RemoteCredential::Password { secret, .. } => {
                (self.config.sshpass_program.clone(),
                 vec!["-e".to_string(), self.config.program.clone()],
                 Some(secret.clone()))
            }
            RemoteCredential::KeyFile { .. } => (self.config.program.clone(), Vec::new(), None),
        };
        let mut args = prefix;
        args.extend(self.build_ssh_args(host, credential)?);
        let mut session = SshCliSession { target: format!("{}:{}", host.address, host.port),
                                          program,
                                          args,
                                          secret };
        // Sonda: valida conexión y autenticación antes del primer comando.
        match session.run("true") {
            Ok(_) => {
                debug!("ssh:open target={}", session.target);
                Ok(Box::new(session))
            }
            Err(ExecError::RemoteCommand { message, .. }) => Err(ExecError::RemoteConnection { host: session.target,
                                                                                                message }),
            Err(e) => Err(e),
        }
    }
}

struct SshCliSession {
    target: String,
    program: String,
    args: Vec<String>,
    secret: Option<String>,
}

impl RemoteSession for SshCliSession {
    fn run(&mut self, command: &str) -> Result<CommandOutput, ExecError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(command).stdin(Stdio::null());
        if let Some(secret) = &self.secret {
            cmd.env("SSHPASS", secret);
        }
        let out = cmd.output().map_err(|e| ExecError::RemoteConnection { host: self.target.clone(),
                                                                         message: format!("spawn {}: {e}",
                                                                                          self.program) })?;
        let output = CommandOutput { command: command.to_string(),
                                     stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                                     stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                                     exit_code: out.status.code() };
        if output.exit_code == Some(SSH_TRANSPORT_EXIT) {
            warn!("ssh:run transport failure target={} command={command}", self.target);
            return Err(ExecError::RemoteCommand { command: command.to_string(),
                                                  message: output.stderr.trim().to_string() });
        }
        Ok(output)
    }

    fn close(&mut self) -> Result<(), ExecError> {
        // Sin conexión persistente que cerrar.
        self.secret = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn transport() -> SshCliTransport {
        SshCliTransport::new(SshConfig::default())
    }

    #[test]
    fn key_credential_uses_identity_file_and_batch_mode() {
        let host = Host::new("10.0.0.5");
        let credential = RemoteCredential::KeyFile { username: "deploy".into(),
                                                     public_key_path: PathBuf::from("/tmp/key-x.pub"),
                                                     private_key_path: PathBuf::from("/tmp/key-x") };
        let args = transport().build_ssh_args(&host, &credential).unwrap();
        assert_eq!(&args[..2], &["-i".to_string(), "/tmp/key-x".to_string()]);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=10".to_string()));
        assert!(!args.contains(&"-p".to_string()));
        assert_eq!(&args[args.len() - 2..], &["--".to_string(), "deploy@10.0.0.5".to_string()]);
    }

    #[test]
    fn password_credential_never_puts_secret_in_args() {
        let host = Host::new("example.org").with_port(2222);
        let credential = RemoteCredential::Password { username: "root".into(),
                                                      secret: "hunter2".into() };
        let args = transport().build_ssh_args(&host, &credential).unwrap();
        assert!(args.iter().all(|a| !a.contains("hunter2")));
        assert!(args.contains(&"BatchMode=no".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-p" && w[1] == "2222"));
        assert!(!args.contains(&"-i".to_string()));
    }

    #[test]
    fn option_like_username_is_rejected() {
        let credential = RemoteCredential::Password { username: "-oProxyCommand=touch /tmp/x".into(),
                                                      secret: "s".into() };
        let err = transport().build_ssh_args(&Host::new("h"), &credential).unwrap_err();
        assert!(matches!(err, ExecError::AuthenticationConfiguration(msg) if msg.contains("username")));
    }

    #[test]
    fn option_like_address_is_rejected_before_spawning() {
        let config = SshConfig { program: "/nonexistent/pipeflow-ssh".into(),
                                 ..SshConfig::default() };
        let credential = RemoteCredential::Password { username: "deploy".into(),
                                                      secret: "s".into() };
        let err = SshCliTransport::new(config).open(&Host::new("-oProxyCommand=id"), &credential).err().unwrap();
        assert!(matches!(err, ExecError::AuthenticationConfiguration(msg) if msg.contains("host address")));
    }

    #[test]
    fn missing_binary_is_a_connection_error() {
        let config = SshConfig { program: "/nonexistent/pipeflow-ssh".into(),
                                 ..SshConfig::default() };
        let credential = RemoteCredential::KeyFile { username: "deploy".into(),
                                                     public_key_path: PathBuf::from("/tmp/k.pub"),
                                                     private_key_path: PathBuf::from("/tmp/k") };
        let err = SshCliTransport::new(config).open(&Host::new("localhost"), &credential).err().unwrap();
        assert!(matches!(err, ExecError::RemoteConnection { .. }));
    }
}
