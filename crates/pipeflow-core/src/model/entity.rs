//! Kinds de entidad y referencias transportables.
//!
//! `EntityKind` es un conjunto cerrado: agregar un tipo de step nuevo
//! implica una variante nueva aquí y un constructor en el `PipeFactory`.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Action, Auth, Host, Stream};
use crate::errors::PipelineError;
use crate::progress::TravelerProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Stream,
    Action,
    Host,
    Auth,
    TravelerProgress,
}

impl EntityKind {
    /// Tag estable usado en la cola y en la base de datos.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Stream => "stream",
            EntityKind::Action => "action",
            EntityKind::Host => "host",
            EntityKind::Auth => "auth",
            EntityKind::TravelerProgress => "traveler_progress",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stream" => Ok(EntityKind::Stream),
            "action" => Ok(EntityKind::Action),
            "host" => Ok(EntityKind::Host),
            "auth" => Ok(EntityKind::Auth),
            "traveler_progress" => Ok(EntityKind::TravelerProgress),
            other => Err(PipelineError::Internal(format!("unknown entity kind '{other}'"))),
        }
    }
}

/// Referencia mínima `{kind, id}`. Nunca lleva comportamiento ni relaciones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Entidad cargada. El kind se descubre en runtime con `kind()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Entity {
    Stream(Stream),
    Action(Action),
    Host(Host),
    Auth(Auth),
    TravelerProgress(TravelerProgress),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Stream(_) => EntityKind::Stream,
            Entity::Action(_) => EntityKind::Action,
            Entity::Host(_) => EntityKind::Host,
            Entity::Auth(_) => EntityKind::Auth,
            Entity::TravelerProgress(_) => EntityKind::TravelerProgress,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Entity::Stream(s) => s.id,
            Entity::Action(a) => a.id,
            Entity::Host(h) => h.id,
            Entity::Auth(a) => a.id,
            Entity::TravelerProgress(p) => p.id,
        }
    }

    pub fn reference(&self) -> EntityRef {
        EntityRef::new(self.kind(), self.id())
    }
}

impl From<Stream> for Entity {
    fn from(v: Stream) -> Self {
        Entity::Stream(v)
    }
}

impl From<Action> for Entity {
    fn from(v: Action) -> Self {
        Entity::Action(v)
    }
}

impl From<Host> for Entity {
    fn from(v: Host) -> Self {
        Entity::Host(v)
    }
}

impl From<Auth> for Entity {
    fn from(v: Auth) -> Self {
        Entity::Auth(v)
    }
}
