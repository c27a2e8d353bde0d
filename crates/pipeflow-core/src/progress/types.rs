//! Tipos del ledger de progreso.
//!
//! Rol en el flujo:
//! - `TravelerProgress` es la fila única de un linaje; todas las ramas que
//!   nacen de un fan-out apuntan a la misma fila.
//! - Cada paso escribe entradas nuevas (`ProgressEntry`); nunca se
//!   modifica una entrada existente. Así dos ramas concurrentes no pierden
//!   escrituras.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{EntityKind, EntityRef};
use crate::pipe::PipeIdentifier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelerProgress {
    pub id: Uuid,
    pub stream_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl TravelerProgress {
    pub fn new(stream_id: Uuid) -> Self {
        Self { id: Uuid::new_v4(),
               stream_id,
               started_at: Utc::now() }
    }

    /// Referencia `{kind, id}` que viaja en el snapshot en lugar de la fila.
    pub fn reference(&self) -> EntityRef {
        EntityRef::new(EntityKind::TravelerProgress, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEntryKind {
    /// Primera entrada del linaje, escrita al construir el Traveler.
    PipelineStarted,
    /// Un pipe empezó. No implica éxito.
    PipeStarted { pipe: PipeIdentifier },
    /// Un pipe terminó y despachó una continuación hacia `next`. Hay una
    /// entrada por rama.
    PipeEnded { pipe: PipeIdentifier, next: PipeIdentifier },
    /// Una rama terminó sin sucesores resolubles.
    BranchEnded { pipe: PipeIdentifier },
    /// Cierre del linaje. A lo sumo una por fila.
    PipelineEnded,
}

impl ProgressEntryKind {
    /// Tag estable en minúsculas (columna `kind` en Postgres).
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressEntryKind::PipelineStarted => "pipeline_started",
            ProgressEntryKind::PipeStarted { .. } => "pipe_started",
            ProgressEntryKind::PipeEnded { .. } => "pipe_ended",
            ProgressEntryKind::BranchEnded { .. } => "branch_ended",
            ProgressEntryKind::PipelineEnded => "pipeline_ended",
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ProgressEntryKind::PipelineStarted => "I",
            ProgressEntryKind::PipeStarted { .. } => "S",
            ProgressEntryKind::PipeEnded { .. } => "E",
            ProgressEntryKind::BranchEnded { .. } => "B",
            ProgressEntryKind::PipelineEnded => "C",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub seq: u64, // asignado por el ledger (orden de append)
    pub progress_id: Uuid,
    pub kind: ProgressEntryKind,
    pub ts: DateTime<Utc>,
}

/// Variante compacta de las entradas, útil en tests y diagnóstico.
pub fn entry_codes(entries: &[ProgressEntry]) -> Vec<&'static str> {
    entries.iter().map(|e| e.kind.code()).collect()
}
