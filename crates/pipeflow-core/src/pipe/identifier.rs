use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Entity, EntityKind, EntityRef};

/// Referencia compacta a la entidad de un pipe: `{kind, id}`.
///
/// Se crea en cada continuación y la consume
/// `PipeFactory::make_from_identifier`. No carga relaciones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipeIdentifier {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl PipeIdentifier {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn of(entity: &Entity) -> Self {
        Self::new(entity.kind(), entity.id())
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind, self.id)
    }
}

impl From<EntityRef> for PipeIdentifier {
    fn from(r: EntityRef) -> Self {
        Self::new(r.kind, r.id)
    }
}

impl fmt::Display for PipeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}
