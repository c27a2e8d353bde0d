//! Contrato del entity store y backend en memoria.

mod memory;

pub use memory::InMemoryEntityStore;

use uuid::Uuid;

use crate::errors::Result;
use crate::model::{ActionBundle, Command, Entity, EntityRef};

/// Store de entidades pipeables y relacionadas.
///
/// Contrato:
/// - `load` de una fila inexistente falla con `PipelineError::NotFound`.
/// - Las lecturas compuestas (`load_action_bundle`) traen todo lo necesario
///   en una sola operación; el core nunca carga relaciones de a poco.
/// - `add_command` es append-only: la posición es la cantidad de comandos
///   existentes.
pub trait EntityStore: Send + Sync {
    fn load(&self, reference: &EntityRef) -> Result<Entity>;
    /// Inserta o reemplaza la entidad y devuelve su referencia.
    fn save(&self, entity: Entity) -> Result<EntityRef>;
    fn delete(&self, reference: &EntityRef) -> Result<()>;
    fn load_action_bundle(&self, action_id: Uuid) -> Result<ActionBundle>;
    fn add_command(&self, action_id: Uuid, command: &str) -> Result<Command>;
    /// Comandos de una Action en orden de `position`.
    fn commands_for(&self, action_id: Uuid) -> Result<Vec<Command>>;
}
