use chrono::Utc;
use dashmap::DashMap;
use log::debug;
use uuid::Uuid;

use super::{ProgressEntry, ProgressEntryKind, TravelerProgress};
use crate::errors::{PipelineError, Result};
use crate::model::EntityRef;
use crate::pipe::PipeIdentifier;

/// Almacenamiento durable del progreso de un linaje.
///
/// Contrato:
/// - Todas las escrituras son inserts; ninguna entrada se actualiza.
/// - `append_once` inserta sólo si no existe ya una entrada del mismo tipo
///   para la fila (usado para `PipelineEnded`).
/// - Debe tolerar escrituras de procesos que no recuerdan pasos previos.
pub trait ProgressLedger: Send + Sync {
    /// Crea la fila del linaje y su entrada `PipelineStarted`.
    fn create(&self, stream_id: Uuid) -> Result<TravelerProgress>;
    /// Relee la fila desde el almacenamiento (nunca una copia cacheada).
    fn load(&self, progress_id: Uuid) -> Result<TravelerProgress>;
    fn append(&self, progress_id: Uuid, kind: ProgressEntryKind) -> Result<ProgressEntry>;
    /// Insert-if-absent por tipo de entrada. `None` si ya existía.
    fn append_once(&self, progress_id: Uuid, kind: ProgressEntryKind) -> Result<Option<ProgressEntry>>;
    /// Entradas del linaje en orden ascendente de `seq`.
    fn list(&self, progress_id: Uuid) -> Result<Vec<ProgressEntry>>;

    fn start_of_pipe(&self, progress: &TravelerProgress, pipe: &PipeIdentifier) -> Result<ProgressEntry> {
        self.append(progress.id, ProgressEntryKind::PipeStarted { pipe: *pipe })
    }

    fn end_of_pipe(&self, progress: &TravelerProgress, pipe: &PipeIdentifier, next: &PipeIdentifier) -> Result<ProgressEntry> {
        self.append(progress.id,
                    ProgressEntryKind::PipeEnded { pipe: *pipe,
                                                   next: *next })
    }

    fn end_of_branch(&self, progress: &TravelerProgress, pipe: &PipeIdentifier) -> Result<ProgressEntry> {
        self.append(progress.id, ProgressEntryKind::BranchEnded { pipe: *pipe })
    }

    fn end_of_pipeline(&self, progress: &TravelerProgress) -> Result<Option<ProgressEntry>> {
        self.append_once(progress.id, ProgressEntryKind::PipelineEnded)
    }
}

struct LedgerRow {
    progress: TravelerProgress,
    entries: Vec<ProgressEntry>,
}

/// Ledger en memoria. Cada fila se bloquea por entrada del `DashMap`, así
/// que appends concurrentes sobre el mismo linaje se serializan sin
/// perderse.
#[derive(Default)]
pub struct InMemoryProgressLedger {
    inner: DashMap<Uuid, LedgerRow>,
}

impl InMemoryProgressLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(progress_id: Uuid) -> PipelineError {
        PipelineError::NotFound(EntityRef::new(crate::model::EntityKind::TravelerProgress, progress_id))
    }
}

fn push_entry(row: &mut LedgerRow, kind: ProgressEntryKind) -> ProgressEntry {
    let entry = ProgressEntry { seq: row.entries.len() as u64,
                                progress_id: row.progress.id,
                                kind,
                                ts: Utc::now() };
    row.entries.push(entry.clone());
    entry
}

impl ProgressLedger for InMemoryProgressLedger {
    fn create(&self, stream_id: Uuid) -> Result<TravelerProgress> {
        let progress = TravelerProgress::new(stream_id);
        let mut row = LedgerRow { progress: progress.clone(),
                                  entries: Vec::new() };
        push_entry(&mut row, ProgressEntryKind::PipelineStarted);
        self.inner.insert(progress.id, row);
        debug!("progress:create id={} stream={}", progress.id, stream_id);
        Ok(progress)
    }

    fn load(&self, progress_id: Uuid) -> Result<TravelerProgress> {
        self.inner
            .get(&progress_id)
            .map(|row| row.progress.clone())
            .ok_or_else(|| Self::not_found(progress_id))
    }

    fn append(&self, progress_id: Uuid, kind: ProgressEntryKind) -> Result<ProgressEntry> {
        let mut row = self.inner.get_mut(&progress_id).ok_or_else(|| Self::not_found(progress_id))?;
        Ok(push_entry(&mut row, kind))
    }

    fn append_once(&self, progress_id: Uuid, kind: ProgressEntryKind) -> Result<Option<ProgressEntry>> {
        let mut row = self.inner.get_mut(&progress_id).ok_or_else(|| Self::not_found(progress_id))?;
        if row.entries.iter().any(|e| e.kind.as_str() == kind.as_str()) {
            return Ok(None);
        }
        Ok(Some(push_entry(&mut row, kind)))
    }

    fn list(&self, progress_id: Uuid) -> Result<Vec<ProgressEntry>> {
        self.inner
            .get(&progress_id)
            .map(|row| row.entries.clone())
            .ok_or_else(|| Self::not_found(progress_id))
    }
}
