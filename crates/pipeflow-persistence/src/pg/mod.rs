//! Implementaciones Postgres (Diesel) de los traits del core.
//!
//! - `PgEntityStore`: entidades como JSONB por `(kind, id)` y comandos en
//!   tabla propia con `UNIQUE(action_id, position)`.
//! - `PgProgressLedger`: fila por linaje y entradas append-only; el cierre
//!   del linaje es insert-if-absent respaldado por un índice único parcial.
//! - Reintento con backoff corto ante errores transitorios.

mod entity_store;
mod ledger;

pub use entity_store::PgEntityStore;
pub use ledger::PgProgressLedger;

use std::time::Duration;

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};
use pipeflow_core::{EntityRef, PipelineError};

use crate::config::{pool_bounds, DbConfig};
use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;

/// Pool r2d2 de conexiones Postgres. Al construirlo se corren las
/// migraciones pendientes.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub type PgPooledConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones. Permite inyectar un pool real o uno
/// de test sin acoplar los stores a r2d2.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError>;
}

pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Reintentos ante fallas pasajeras: `max_retries` reintentos con espera
/// lineal `step * n`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub max_retries: u32,
    pub step: Duration,
}

pub(crate) const STORE_RETRY: RetryPolicy = RetryPolicy { max_retries: 3,
                                                          step:        Duration::from_millis(15) };

impl RetryPolicy {
    /// Corre `op` completa de nuevo mientras el error sea pasajero. Cada
    /// intento debe abrir su propia conexión y transacción.
    pub fn run<F, T>(&self, mut op: F) -> Result<T, PersistenceError>
        where F: FnMut() -> Result<T, PersistenceError>
    {
        let mut retries = 0;
        loop {
            match op() {
                Err(e) if e.is_transient() && retries < self.max_retries => {
                    retries += 1;
                    let wait = self.step * retries;
                    warn!("store: transient error, retry {retries}/{} in {wait:?}: {e}", self.max_retries);
                    std::thread::sleep(wait);
                }
                done => return done,
            }
        }
    }
}

pub(crate) fn with_retry<F, T>(op: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    STORE_RETRY.run(op)
}

/// Traduce un error de persistencia al core, usando `reference` para
/// `NotFound` y violaciones de FK.
pub(crate) fn into_pipeline(err: PersistenceError, reference: EntityRef) -> PipelineError {
    match err {
        PersistenceError::NotFound | PersistenceError::ForeignKeyViolation(_) => PipelineError::NotFound(reference),
        other => other.into(),
    }
}

/// Pool r2d2 ya migrado. Los tamaños se normalizan con
/// `DbConfig::pool_bounds`.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let (min_idle, max_open) = pool_bounds(min_size, max_size);
    if (min_idle, max_open) != (min_size, max_size) {
        warn!("pool: sizes {min_size}/{max_size} adjusted to {min_idle}/{max_open}");
    }
    let pool = r2d2::Pool::builder().min_idle(Some(min_idle))
                                    .max_size(max_open)
                                    .build(ConnectionManager::<PgConnection>::new(database_url))
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    let mut conn = pool.get()
                       .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
    let applied = run_pending_migrations(&mut conn)?;
    debug!("pool: ready max={max_open} migrations_applied={applied}");
    drop(conn);
    Ok(pool)
}

/// Pool a partir de `.env`/entorno.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    let cfg = DbConfig::from_env()?;
    let (min_idle, max_open) = cfg.pool_bounds();
    build_pool(&cfg.url, min_idle, max_open)
}
