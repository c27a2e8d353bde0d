use std::any::Any;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Entity, EntityRef};

/// Valor guardado en el Bag.
///
/// `Json` y `Reference` cruzan la cola tal cual. `Entity` viaja como
/// `Transported`, variante que sólo crea `prepare_for_transport` y sólo
/// consume `restore_after_transport`. `Handle` sólo vive en proceso y su
/// presencia hace fallar la preparación.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BagValue {
    Json(Value),
    Entity(Entity),
    Reference(EntityRef),
    /// Entidad en tránsito; sólo la crea `Bag::prepare_for_transport`.
    Transported(EntityRef),
    #[serde(skip)]
    Handle(Arc<dyn Any + Send + Sync>),
}

impl BagValue {
    pub fn handle(value: Arc<dyn Any + Send + Sync>) -> Self {
        BagValue::Handle(value)
    }

    /// `false` para handles y para filas de progreso, que viven en el
    /// ledger y no en el store.
    pub fn is_transportable(&self) -> bool {
        !matches!(self, BagValue::Handle(_) | BagValue::Entity(Entity::TravelerProgress(_)))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            BagValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_json().and_then(Value::as_bool)
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            BagValue::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&EntityRef> {
        match self {
            BagValue::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Referencia de una entidad en tránsito.
    pub fn in_transit(&self) -> Option<&EntityRef> {
        match self {
            BagValue::Transported(r) => Some(r),
            _ => None,
        }
    }
}

impl PartialEq for BagValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BagValue::Json(a), BagValue::Json(b)) => a == b,
            (BagValue::Entity(a), BagValue::Entity(b)) => a == b,
            (BagValue::Reference(a), BagValue::Reference(b)) => a == b,
            (BagValue::Transported(a), BagValue::Transported(b)) => a == b,
            (BagValue::Handle(a), BagValue::Handle(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for BagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BagValue::Json(v) => f.debug_tuple("Json").field(v).finish(),
            BagValue::Entity(e) => f.debug_tuple("Entity").field(e).finish(),
            BagValue::Reference(r) => f.debug_tuple("Reference").field(r).finish(),
            BagValue::Transported(r) => f.debug_tuple("Transported").field(r).finish(),
            BagValue::Handle(_) => f.write_str("Handle(..)"),
        }
    }
}

impl From<Value> for BagValue {
    fn from(v: Value) -> Self {
        BagValue::Json(v)
    }
}

impl From<Entity> for BagValue {
    fn from(v: Entity) -> Self {
        BagValue::Entity(v)
    }
}

impl From<EntityRef> for BagValue {
    fn from(v: EntityRef) -> Self {
        BagValue::Reference(v)
    }
}

impl From<&str> for BagValue {
    fn from(v: &str) -> Self {
        BagValue::Json(Value::from(v))
    }
}

impl From<String> for BagValue {
    fn from(v: String) -> Self {
        BagValue::Json(Value::from(v))
    }
}

impl From<bool> for BagValue {
    fn from(v: bool) -> Self {
        BagValue::Json(Value::from(v))
    }
}

impl From<i64> for BagValue {
    fn from(v: i64) -> Self {
        BagValue::Json(Value::from(v))
    }
}

impl From<i32> for BagValue {
    fn from(v: i32) -> Self {
        BagValue::Json(Value::from(v))
    }
}
