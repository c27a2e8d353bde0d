use dashmap::DashMap;
use uuid::Uuid;

use super::EntityStore;
use crate::errors::{PipelineError, Result};
use crate::model::{ActionBundle, Command, Entity, EntityKind, EntityRef};

/// Entity store en memoria (tests y demo).
#[derive(Default)]
pub struct InMemoryEntityStore {
    entities: DashMap<EntityRef, Entity>,
    commands: DashMap<Uuid, Vec<Command>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn load_kind(&self, kind: EntityKind, id: Uuid) -> Result<Entity> {
        self.load(&EntityRef::new(kind, id))
    }
}

impl EntityStore for InMemoryEntityStore {
    fn load(&self, reference: &EntityRef) -> Result<Entity> {
        self.entities
            .get(reference)
            .map(|e| e.value().clone())
            .ok_or(PipelineError::NotFound(*reference))
    }

    fn save(&self, entity: Entity) -> Result<EntityRef> {
        let reference = entity.reference();
        self.entities.insert(reference, entity);
        Ok(reference)
    }

    fn delete(&self, reference: &EntityRef) -> Result<()> {
        self.entities
            .remove(reference)
            .ok_or(PipelineError::NotFound(*reference))?;
        if reference.kind == EntityKind::Action {
            self.commands.remove(&reference.id);
        }
        Ok(())
    }

    fn load_action_bundle(&self, action_id: Uuid) -> Result<ActionBundle> {
        let action = match self.load_kind(EntityKind::Action, action_id)? {
            Entity::Action(a) => a,
            other => return Err(PipelineError::Internal(format!("expected action, got {}", other.kind()))),
        };
        let host = match action.host_id {
            Some(id) => match self.load_kind(EntityKind::Host, id) {
                Ok(Entity::Host(h)) => Some(h),
                Ok(_) | Err(PipelineError::NotFound(_)) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };
        let auth = match ActionBundle::effective_auth_id(&action, host.as_ref()) {
            Some(id) => match self.load_kind(EntityKind::Auth, id) {
                Ok(Entity::Auth(a)) => Some(a),
                Ok(_) | Err(PipelineError::NotFound(_)) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };
        let commands = self.commands_for(action_id)?;
        Ok(ActionBundle { action,
                          host,
                          auth,
                          commands })
    }

    fn add_command(&self, action_id: Uuid, command: &str) -> Result<Command> {
        let action_ref = EntityRef::new(EntityKind::Action, action_id);
        if !self.entities.contains_key(&action_ref) {
            return Err(PipelineError::NotFound(action_ref));
        }
        let mut list = self.commands.entry(action_id).or_default();
        let cmd = Command { id: Uuid::new_v4(),
                            action_id,
                            position: list.len() as u32,
                            command: command.to_string() };
        list.push(cmd.clone());
        Ok(cmd)
    }

    fn commands_for(&self, action_id: Uuid) -> Result<Vec<Command>> {
        let mut list = self.commands
                           .get(&action_id)
                           .map(|l| l.value().clone())
                           .unwrap_or_default();
        list.sort_by_key(|c| c.position);
        Ok(list)
    }
}
