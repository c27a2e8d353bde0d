//! Action: secuencia ordenada de comandos sobre un host.
//!
//! `next` son las referencias a los pipeables que siguen a esta Action
//! (0..N, fan-out). Los comandos viven aparte y sólo se agregan al final
//! (`EntityStore::add_command`).
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Auth, EntityRef, Host};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub stream_id: Uuid,
    pub host_id: Option<Uuid>,
    pub auth_id: Option<Uuid>,
    pub next: Vec<EntityRef>,
}

impl Action {
    pub fn new(stream_id: Uuid) -> Self {
        Self { id: Uuid::new_v4(),
               stream_id,
               host_id: None,
               auth_id: None,
               next: Vec::new() }
    }

    pub fn on_host(mut self, host_id: Uuid) -> Self {
        self.host_id = Some(host_id);
        self
    }

    pub fn with_auth(mut self, auth_id: Uuid) -> Self {
        self.auth_id = Some(auth_id);
        self
    }

    /// Agrega un sucesor al final de la lista `next`.
    pub fn then(mut self, next: EntityRef) -> Self {
        self.next.push(next);
        self
    }
}

/// Un comando y su posición dentro de la Action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: Uuid,
    pub action_id: Uuid,
    pub position: u32,
    pub command: String,
}

/// Lectura compuesta: la Action con su Host, Auth efectiva y comandos
/// ordenados por `position` ascendente.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionBundle {
    pub action: Action,
    pub host: Option<Host>,
    pub auth: Option<Auth>,
    pub commands: Vec<Command>,
}

impl ActionBundle {
    /// Auth efectiva: la de la Action y, si no tiene, la del Host.
    pub fn effective_auth_id(action: &Action, host: Option<&Host>) -> Option<Uuid> {
        action.auth_id.or_else(|| host.and_then(|h| h.auth_id))
    }
}
