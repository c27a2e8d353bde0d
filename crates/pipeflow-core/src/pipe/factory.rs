//! Registro kind → constructor de Pipe.
//!
//! Asimetría deliberada:
//! - `make` con un kind sin constructor devuelve `None`: la rama termina
//!   ahí y no es un error.
//! - `make_from_identifier` con una entidad borrada falla con
//!   `DanglingIdentifier`, porque el identificador fue válido antes.
use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use super::{Pipe, PipeIdentifier};
use crate::errors::{PipelineError, Result};
use crate::model::{Entity, EntityKind};
use crate::store::EntityStore;

/// Constructor registrado para un kind. Recibe la entidad ya cargada.
pub type PipeConstructor = Arc<dyn Fn(Entity) -> Result<Box<dyn Pipe>> + Send + Sync>;

pub struct PipeFactory {
    store: Arc<dyn EntityStore>,
    registry: HashMap<EntityKind, PipeConstructor>,
}

impl PipeFactory {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store,
               registry: HashMap::new() }
    }

    /// Registra (o reemplaza) el constructor de un kind.
    pub fn register<F>(&mut self, kind: EntityKind, constructor: F) -> &mut Self
        where F: Fn(Entity) -> Result<Box<dyn Pipe>> + Send + Sync + 'static
    {
        self.registry.insert(kind, Arc::new(constructor));
        self
    }

    pub fn is_registered(&self, kind: EntityKind) -> bool {
        self.registry.contains_key(&kind)
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Adapta una entidad a su Pipe. `Ok(None)` si el kind no tiene
    /// constructor registrado.
    pub fn make(&self, entity: Entity) -> Result<Option<Box<dyn Pipe>>> {
        let kind = entity.kind();
        match self.registry.get(&kind) {
            Some(constructor) => constructor(entity).map(Some),
            None => {
                debug!("pipe_factory:make no pipe for kind={kind}, branch ends");
                Ok(None)
            }
        }
    }

    /// Recarga la entidad desde el store y delega en `make`.
    pub fn make_from_identifier(&self, identifier: &PipeIdentifier) -> Result<Box<dyn Pipe>> {
        let entity = self.store
                         .load(&identifier.entity_ref())
                         .map_err(PipelineError::into_dangling)?;
        self.make(entity)?
            .ok_or_else(|| PipelineError::UnregisteredKind(identifier.kind.to_string()))
    }
}
