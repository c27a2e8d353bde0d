//! `DbConfig`: URL y tamaños de pool para los backends Postgres.
//!
//! Variables: `DATABASE_URL` (obligatoria), `DATABASE_MIN_CONNECTIONS`,
//! `DATABASE_MAX_CONNECTIONS`. El `.env` se lee una sola vez por proceso.

use std::env;

use once_cell::sync::Lazy;

use crate::error::PersistenceError;

const DEFAULT_MIN_CONNECTIONS: u32 = 2;
const DEFAULT_MAX_CONNECTIONS: u32 = 16;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    // Sin .env no es error: manda el entorno del proceso.
    let _ = dotenvy::dotenv();
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, PersistenceError> {
        init_dotenv();
        let url = env::var("DATABASE_URL").map_err(|_| PersistenceError::Configuration("DATABASE_URL no definido".into()))?;
        Ok(Self { url,
                  min_connections: size_var("DATABASE_MIN_CONNECTIONS", DEFAULT_MIN_CONNECTIONS),
                  max_connections: size_var("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS) })
    }

    /// `(min_idle, max_size)` válidos para r2d2: nunca 0 y `min <= max`.
    pub fn pool_bounds(&self) -> (u32, u32) {
        pool_bounds(self.min_connections, self.max_connections)
    }
}

pub(crate) fn pool_bounds(min: u32, max: u32) -> (u32, u32) {
    let max = max.max(1);
    (min.clamp(1, max), max)
}

fn size_var(name: &str, default: u32) -> u32 {
    parse_size(env::var(name).ok().as_deref(), default)
}

fn parse_size(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparsable_sizes_fall_back() {
        assert_eq!(parse_size(Some(" 8 "), 2), 8);
        assert_eq!(parse_size(Some("ocho"), 2), 2);
        assert_eq!(parse_size(None, 16), 16);
    }

    #[test]
    fn bounds_never_zero_and_min_capped_by_max() {
        assert_eq!(pool_bounds(0, 0), (1, 1));
        assert_eq!(pool_bounds(8, 4), (4, 4));
        assert_eq!(pool_bounds(2, 16), (2, 16));
    }
}
