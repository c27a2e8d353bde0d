//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) una sola vez y arma `AppConfig`.
use std::env;
use std::time::Duration;

use once_cell::sync::Lazy;
use pipeflow_exec::SshConfig;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv();
});

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 500;

/// Configuración global (worker pool, ssh y base de datos opcional).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Entregas concurrentes como máximo (`PIPEFLOW_WORKERS`).
    pub workers: usize,
    /// Tiempo sin entregas tras el cual el pool se detiene
    /// (`PIPEFLOW_IDLE_TIMEOUT_MS`).
    pub idle_timeout: Duration,
    pub ssh: SshConfig,
    /// `DATABASE_URL`; sin ella se usan los backends en memoria.
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { workers: DEFAULT_WORKERS,
               idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
               ssh: SshConfig::default(),
               database_url: None }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let workers = env::var("PIPEFLOW_WORKERS").ok()
                                                  .and_then(|v| v.parse::<usize>().ok())
                                                  .filter(|w| *w > 0)
                                                  .unwrap_or(DEFAULT_WORKERS);
        let idle_ms = env::var("PIPEFLOW_IDLE_TIMEOUT_MS").ok()
                                                          .and_then(|v| v.parse().ok())
                                                          .unwrap_or(DEFAULT_IDLE_TIMEOUT_MS);
        Self { workers,
               idle_timeout: Duration::from_millis(idle_ms),
               ssh: SshConfig::from_env(),
               database_url: env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()) }
    }
}
