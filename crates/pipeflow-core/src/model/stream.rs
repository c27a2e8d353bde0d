use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Una corrida de workflow. Inmutable para el core una vez creada.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Stream {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(),
               name: name.into(),
               created_at: Utc::now() }
    }
}
