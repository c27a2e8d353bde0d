//! Entidades persistidas que el core lee (Stream, Action, Host, Auth,
//! Command) y la referencia genérica `{kind, id}`.

pub mod action;
pub mod entity;
pub mod host;
pub mod stream;

pub use action::{Action, ActionBundle, Command};
pub use entity::{Entity, EntityKind, EntityRef};
pub use host::{Auth, Credentials, Host};
pub use stream::Stream;
