//! pipeflow-core: motor de traversal reanudable sobre una cola.
//!
//! Un `Traveler` lleva el estado de una corrida (Bag, historial, próximo
//! pipe, linaje de progreso) entre entregas de la cola. Los steps se
//! resuelven desde entidades persistidas con el `PipeFactory`.
pub mod bag;
pub mod constants;
pub mod errors;
pub mod model;
pub mod pipe;
pub mod progress;
pub mod queue;
pub mod store;
pub mod traveler;

pub use bag::{Bag, BagValue};
pub use errors::{PipelineError, Result};
pub use model::{Action, ActionBundle, Auth, Command, Credentials, Entity, EntityKind, EntityRef, Host, Stream};
pub use pipe::{Pipe, PipeFactory, PipeIdentifier};
pub use progress::{entry_codes, InMemoryProgressLedger, ProgressEntry, ProgressEntryKind, ProgressLedger, TravelerProgress};
pub use queue::{drain, DrainReport, InMemoryQueue, QueueTransport};
pub use store::{EntityStore, InMemoryEntityStore};
pub use traveler::{deliver, TravelOutcome, Traveler, TravelerContext, TravelerSnapshot};
