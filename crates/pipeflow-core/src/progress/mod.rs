//! Ledger de progreso de un Traveler (una fila por linaje + entradas
//! append-only).

mod ledger;
mod types;

pub use ledger::{InMemoryProgressLedger, ProgressLedger};
pub use types::{entry_codes, ProgressEntry, ProgressEntryKind, TravelerProgress};
