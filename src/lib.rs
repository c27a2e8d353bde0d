//! pipeflow
//!
//! Aplicación sobre los crates del workspace:
//! - `config`: configuración desde entorno.
//! - `errors`: errores de la aplicación y códigos de salida.
//! - `worker`: cola por canal y worker pool tokio.
//! - `fixture`: workflows declarados en JSON para el binario.

pub mod config;
pub mod errors;
pub mod fixture;
pub mod worker;

pub use config::AppConfig;
pub use errors::AppError;
pub use fixture::{Fixture, FixtureCommand};
pub use worker::{ChannelQueue, DeliverySource, WorkerPool, WorkerReport};
