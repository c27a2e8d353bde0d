use std::sync::Arc;

use crate::pipe::PipeFactory;
use crate::progress::ProgressLedger;
use crate::queue::QueueTransport;
use crate::store::EntityStore;

/// Colaboradores que un Traveler necesita en cada entrega.
///
/// Se clona barato (sólo `Arc`s) y se comparte entre workers.
#[derive(Clone)]
pub struct TravelerContext {
    pub store: Arc<dyn EntityStore>,
    pub ledger: Arc<dyn ProgressLedger>,
    pub factory: Arc<PipeFactory>,
    pub queue: Arc<dyn QueueTransport>,
}

impl TravelerContext {
    #[inline]
    pub fn new(store: Arc<dyn EntityStore>,
               ledger: Arc<dyn ProgressLedger>,
               factory: Arc<PipeFactory>,
               queue: Arc<dyn QueueTransport>)
               -> Self {
        Self { store,
               ledger,
               factory,
               queue }
    }
}
