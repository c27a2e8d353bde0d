//! Bag: contexto clave/valor que acompaña a una corrida.
//!
//! - Conserva el orden de inserción (`IndexMap`).
//! - Lo mutan los Pipes; el engine nunca lo toca salvo para transportarlo.
//! - Antes de cruzar la cola toda entrada debe ser transportable:
//!   `prepare_for_transport` convierte entidades cargadas en
//!   `BagValue::Transported` y `restore_after_transport` las vuelve a
//!   cargar. Las `Reference` que guarda un Pipe no se tocan. Ambas son
//!   idempotentes.

mod value;

pub use value::BagValue;

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, Result};
use crate::store::EntityStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bag {
    items: IndexMap<String, BagValue>,
}

impl Bag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserta o reemplaza. Reemplazar conserva la posición original.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<BagValue>) {
        self.items.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&BagValue> {
        self.items.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<BagValue> {
        self.items.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BagValue)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Copia las entradas de `other`; en claves repetidas gana `other`.
    pub fn merge(&mut self, other: Bag) {
        for (k, v) in other.items {
            self.items.insert(k, v);
        }
    }

    /// Deja todas las entradas en forma transportable.
    ///
    /// Falla con `TransportSerialization` si alguna entrada sólo existe en
    /// proceso o es un `TravelerProgress` (vive en el ledger, no en el
    /// store). En ese caso el Bag queda sin tocar.
    pub fn prepare_for_transport(&mut self) -> Result<()> {
        if let Some((key, value)) = self.items.iter().find(|(_, v)| !v.is_transportable()) {
            let what = match value {
                BagValue::Handle(_) => "an in-process handle",
                _ => "a traveler progress row",
            };
            return Err(PipelineError::TransportSerialization(format!("bag entry '{key}' holds {what}")));
        }
        for value in self.items.values_mut() {
            if let BagValue::Entity(entity) = value {
                *value = BagValue::Transported(entity.reference());
            }
        }
        Ok(())
    }

    /// Recarga desde el store toda entidad en tránsito.
    ///
    /// Una referencia a una entidad borrada es un `DanglingIdentifier`.
    pub fn restore_after_transport(&mut self, store: &dyn EntityStore) -> Result<()> {
        for (key, value) in self.items.iter_mut() {
            if let BagValue::Transported(reference) = value {
                let entity = store.load(reference).map_err(PipelineError::into_dangling)?;
                debug!("bag:restore key={key} ref={reference}");
                *value = BagValue::Entity(entity);
            }
        }
        Ok(())
    }
}
