//! Contrato de la cola y backend en memoria.
//!
//! La cola transporta el payload JSON de un `TravelerSnapshot`. Se asume
//! entrega at-least-once sin orden entre payloads distintos; los reintentos
//! son responsabilidad de la cola, nunca del core.

use std::collections::VecDeque;
use std::sync::Mutex;

use log::warn;

use crate::errors::{PipelineError, Result};
use crate::traveler::{deliver, TravelOutcome, TravelerContext, TravelerSnapshot};

pub trait QueueTransport: Send + Sync {
    /// Acepta un payload para entrega futura (posiblemente inmediata).
    fn enqueue(&self, payload: String) -> Result<()>;
}

/// Cola FIFO en memoria.
#[derive(Default)]
pub struct InMemoryQueue {
    inner: Mutex<VecDeque<String>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<String>>> {
        self.inner
            .lock()
            .map_err(|_| PipelineError::Queue("queue lock poisoned".into()))
    }

    pub fn pop(&self) -> Result<Option<String>> {
        Ok(self.lock()?.pop_front())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Decodifica los payloads pendientes sin consumirlos.
    pub fn peek_snapshots(&self) -> Result<Vec<TravelerSnapshot>> {
        self.lock()?
            .iter()
            .map(|p| TravelerSnapshot::decode(p))
            .collect()
    }
}

impl QueueTransport for InMemoryQueue {
    fn enqueue(&self, payload: String) -> Result<()> {
        self.lock()?.push_back(payload);
        Ok(())
    }
}

/// Resumen de un `drain`.
#[derive(Debug, Default)]
pub struct DrainReport {
    pub delivered: usize,
    pub finished_branches: usize,
    pub failures: Vec<PipelineError>,
}

/// Entrega secuencialmente hasta vaciar la cola o llegar a
/// `max_deliveries`. Un fallo de entrega se registra y no se reintenta.
pub fn drain(ctx: &TravelerContext, queue: &InMemoryQueue, max_deliveries: usize) -> Result<DrainReport> {
    let mut report = DrainReport::default();
    while report.delivered < max_deliveries {
        let Some(payload) = queue.pop()? else { break };
        report.delivered += 1;
        match deliver(ctx, &payload) {
            Ok(TravelOutcome::Finished { .. }) => report.finished_branches += 1,
            Ok(TravelOutcome::Continued { .. }) => {}
            Err(e) => {
                warn!("queue:delivery failed err={e}");
                report.failures.push(e);
            }
        }
    }
    Ok(report)
}
