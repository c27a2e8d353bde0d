//! Configuración del executor SSH desde variables de entorno.

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Binario de ssh (`PIPEFLOW_SSH_BIN`).
    pub program: String,
    /// Binario usado para autenticación por password (`PIPEFLOW_SSHPASS_BIN`).
    pub sshpass_program: String,
    /// Directorio de claves efímeras (`PIPEFLOW_SSH_KEY_DIR`).
    pub key_dir: PathBuf,
    /// `ConnectTimeout` en segundos (`PIPEFLOW_SSH_CONNECT_TIMEOUT`).
    pub connect_timeout_secs: u32,
    /// `ServerAliveInterval` en segundos (`PIPEFLOW_SSH_ALIVE_INTERVAL`).
    pub server_alive_interval_secs: u32,
    pub server_alive_count_max: u32,
    /// Valor de `StrictHostKeyChecking` (`PIPEFLOW_SSH_HOST_KEY_CHECKING`).
    pub strict_host_key_checking: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self { program: "ssh".into(),
               sshpass_program: "sshpass".into(),
               key_dir: PathBuf::from("storage/ssh/keys"),
               connect_timeout_secs: 10,
               server_alive_interval_secs: 15,
               server_alive_count_max: 3,
               strict_host_key_checking: "accept-new".into() }
    }
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl SshConfig {
    /// Lee la configuración; variables ausentes o inválidas usan los
    /// valores por defecto.
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let d = Self::default();
        Self { program: env::var("PIPEFLOW_SSH_BIN").unwrap_or(d.program),
               sshpass_program: env::var("PIPEFLOW_SSHPASS_BIN").unwrap_or(d.sshpass_program),
               key_dir: env::var("PIPEFLOW_SSH_KEY_DIR").map(PathBuf::from).unwrap_or(d.key_dir),
               connect_timeout_secs: parsed("PIPEFLOW_SSH_CONNECT_TIMEOUT").unwrap_or(d.connect_timeout_secs),
               server_alive_interval_secs: parsed("PIPEFLOW_SSH_ALIVE_INTERVAL").unwrap_or(d.server_alive_interval_secs),
               server_alive_count_max: parsed("PIPEFLOW_SSH_ALIVE_COUNT_MAX").unwrap_or(d.server_alive_count_max),
               strict_host_key_checking: env::var("PIPEFLOW_SSH_HOST_KEY_CHECKING").unwrap_or(d.strict_host_key_checking) }
    }

    pub fn with_key_dir(mut self, key_dir: impl Into<PathBuf>) -> Self {
        self.key_dir = key_dir.into();
        self
    }
}
