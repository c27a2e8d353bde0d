//! Pipe de Action: ejecuta la Action y devuelve sus sucesores.
use std::sync::Arc;

use log::{debug, warn};
use pipeflow_core::constants::bag_keys;
use pipeflow_core::{Action, Bag, Entity, EntityKind, EntityStore, Pipe, PipeFactory, PipeIdentifier, PipelineError,
                    Result, Stream};

use crate::executor::Executor;

pub struct ActionPipe {
    action: Action,
    store: Arc<dyn EntityStore>,
    executor: Arc<dyn Executor>,
    stream: Option<Stream>,
}

impl ActionPipe {
    pub fn new(action: Action, store: Arc<dyn EntityStore>, executor: Arc<dyn Executor>) -> Self {
        Self { action,
               store,
               executor,
               stream: None }
    }

    /// Clave del Bag con el resultado de la Action.
    pub fn succeeded_key(action_id: uuid::Uuid) -> String {
        format!("action.{action_id}.succeeded")
    }
}

impl Pipe for ActionPipe {
    fn identifier(&self) -> PipeIdentifier {
        PipeIdentifier::new(EntityKind::Action, self.action.id)
    }

    fn set_stream(&mut self, stream: &Stream) {
        if stream.id != self.action.stream_id {
            warn!("action_pipe: action {} belongs to stream {} but runs in {}",
                  self.action.id, self.action.stream_id, stream.id);
        }
        self.stream = Some(stream.clone());
    }

    fn flow_through(&mut self, bag: &mut Bag) -> Result<Vec<Entity>> {
        let bundle = self.store
                         .load_action_bundle(self.action.id)
                         .map_err(PipelineError::into_dangling)?;
        let succeeded = self.executor.execute(&bundle);
        bag.put(Self::succeeded_key(bundle.action.id), succeeded);
        bag.put(bag_keys::LAST_ACTION, Entity::Action(bundle.action.clone()));

        if !succeeded {
            warn!("action_pipe: action {} failed via {}, branch ends", bundle.action.id, self.executor.kind());
            return Ok(Vec::new());
        }
        debug!("action_pipe: action {} ok, {} successor(s)", bundle.action.id, bundle.action.next.len());
        bundle.action
              .next
              .iter()
              .map(|r| self.store.load(r).map_err(PipelineError::into_dangling))
              .collect()
    }
}

/// Registra `ActionPipe` para el kind `Action` usando el store del factory.
pub fn register_action_pipe(factory: &mut PipeFactory, executor: Arc<dyn Executor>) {
    let store = factory.store().clone();
    factory.register(EntityKind::Action, move |entity| match entity {
               Entity::Action(action) => {
                   Ok(Box::new(ActionPipe::new(action, store.clone(), executor.clone())) as Box<dyn Pipe>)
               }
               other => Err(PipelineError::Internal(format!("action pipe cannot adapt {}", other.reference()))),
           });
}
