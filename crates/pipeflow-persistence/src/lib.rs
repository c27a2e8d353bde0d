//! pipeflow-persistence
//!
//! Backends Postgres (Diesel + r2d2) del entity store y del ledger de
//! progreso, más utilidades de conexión y migraciones.
//!
//! Módulos:
//! - `pg`: `PgEntityStore` y `PgProgressLedger`.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgEntityStore, PgPool, PgProgressLedger,
             PoolProvider};
