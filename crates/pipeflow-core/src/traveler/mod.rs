//! Motor de traversal reanudable.
//!
//! Provee el `Traveler`, su snapshot transportable y el contexto de
//! colaboradores (store, ledger, factory, cola).

pub mod context;
pub mod core;
pub mod snapshot;

pub use self::core::{deliver, TravelOutcome, Traveler};
pub use context::TravelerContext;
pub use snapshot::TravelerSnapshot;
