//! Carga de un workflow desde JSON para el binario.
//!
//! Formato:
//! ```json
//! { "stream": {...}, "entities": [...], "commands": [{"action_id": "...", "command": "ls"}],
//!   "entry": {"kind": "action", "id": "..."} }
//! ```
use std::path::Path;

use pipeflow_core::{Entity, EntityRef, EntityStore, PipelineError, Result, Stream, Traveler, TravelerContext,
                    TravelerProgress};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureCommand {
    pub action_id: Uuid,
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub stream: Stream,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub commands: Vec<FixtureCommand>,
    /// Primer pipeable de la corrida.
    pub entry: EntityRef,
}

impl Fixture {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| PipelineError::Internal(format!("read {}: {e}",
                                                                                            path.display())))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Guarda Stream, entidades y comandos (en orden) y devuelve la entidad
    /// de entrada recargada del store.
    pub fn seed(&self, store: &dyn EntityStore) -> Result<Entity> {
        store.save(Entity::Stream(self.stream.clone()))?;
        for entity in &self.entities {
            store.save(entity.clone())?;
        }
        for c in &self.commands {
            store.add_command(c.action_id, &c.command)?;
        }
        debug!("fixture: seeded {} entities, {} commands", self.entities.len(), self.commands.len());
        store.load(&self.entry)
    }

    /// Siembra, crea el Traveler y lo encola con el pipe de entrada. El
    /// primer paso también cruza la cola; ningún pipe corre acá.
    pub fn launch(&self, ctx: &TravelerContext) -> Result<TravelerProgress> {
        let entry = self.seed(ctx.store.as_ref())?;
        let pipe = ctx.factory
                      .make(entry)?
                      .ok_or_else(|| PipelineError::UnregisteredKind(self.entry.kind.to_string()))?;
        let mut traveler = Traveler::new(ctx.clone(), self.stream.clone())?;
        let next = traveler.queue_travel(pipe)?;
        debug!("fixture: queued entry {next} progress={}", traveler.progress().id);
        Ok(traveler.progress().clone())
    }
}
