//! Forma transportable de un Traveler.
//!
//! Sólo lleva referencias `{kind, id}`: el Bag ya preparado, el historial
//! como `PipeIdentifier`s, el próximo pipe y la referencia a la fila de
//! progreso (nunca la fila cargada).
use serde::{Deserialize, Serialize};

use crate::bag::Bag;
use crate::constants::SNAPSHOT_FORMAT_VERSION;
use crate::errors::{PipelineError, Result};
use crate::model::{EntityKind, EntityRef};
use crate::pipe::PipeIdentifier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelerSnapshot {
    pub format_version: u32,
    pub bag: Bag,
    pub previous_pipes: Vec<PipeIdentifier>,
    pub next_pipe: PipeIdentifier,
    pub progress: EntityRef,
}

impl TravelerSnapshot {
    /// Construye el snapshot. El Bag debe venir preparado.
    pub fn new(bag: Bag, previous_pipes: Vec<PipeIdentifier>, next_pipe: PipeIdentifier, progress: EntityRef) -> Self {
        Self { format_version: SNAPSHOT_FORMAT_VERSION,
               bag,
               previous_pipes,
               next_pipe,
               progress }
    }

    /// Payload JSON que viaja por la cola.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(payload: &str) -> Result<Self> {
        let snapshot: TravelerSnapshot = serde_json::from_str(payload)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn validate(&self) -> Result<()> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(PipelineError::TransportSerialization(format!("unsupported snapshot format version {}",
                                                                     self.format_version)));
        }
        if self.progress.kind != EntityKind::TravelerProgress {
            return Err(PipelineError::TransportSerialization(format!("progress reference has kind '{}'",
                                                                     self.progress.kind)));
        }
        Ok(())
    }
}
