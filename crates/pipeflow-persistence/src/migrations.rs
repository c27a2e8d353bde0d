//! Esquema embebido: `entities`, `commands`, `traveler_progress` y
//! `progress_entries`. Se aplica al construir el pool.

use diesel::pg::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::info;

use crate::error::PersistenceError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Aplica lo pendiente y devuelve cuántas migraciones corrieron.
pub fn run_pending_migrations(conn: &mut PgConnection) -> Result<usize, PersistenceError> {
    let applied = conn.run_pending_migrations(MIGRATIONS)
                      .map_err(|e| PersistenceError::Configuration(format!("schema migration: {e}")))?;
    for version in &applied {
        info!("schema: applied migration {version}");
    }
    Ok(applied.len())
}
