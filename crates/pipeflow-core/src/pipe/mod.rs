//! Resolución polimórfica de steps.
//!
//! Un `Pipe` es un adaptador de runtime sobre una entidad pipeable; vive
//! exactamente un paso de traversal y se reconstruye desde un
//! `PipeIdentifier` en cada entrega de la cola.

mod factory;
mod identifier;

pub use factory::{PipeConstructor, PipeFactory};
pub use identifier::PipeIdentifier;

use crate::bag::Bag;
use crate::errors::Result;
use crate::model::{Entity, Stream};

/// Capacidad de step.
pub trait Pipe: Send {
    /// Identidad transportable de la entidad detrás del pipe.
    fn identifier(&self) -> PipeIdentifier;

    /// Fija el Stream de la corrida como contexto.
    fn set_stream(&mut self, stream: &Stream);

    /// Ejecuta el efecto del step y devuelve los sucesores (0..N) en orden.
    /// Puede mutar el Bag.
    fn flow_through(&mut self, bag: &mut Bag) -> Result<Vec<Entity>>;
}

impl std::fmt::Debug for dyn Pipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pipe({})", self.identifier())
    }
}
