//! Constantes del core.

/// Versión del formato de `TravelerSnapshot`. Un snapshot con otra versión
/// se rechaza en `restore` en lugar de interpretarse a medias.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Claves que el core reserva en el Bag.
pub mod bag_keys {
    /// Última Action ejecutada en la rama.
    pub const LAST_ACTION: &str = "last_action";
}
