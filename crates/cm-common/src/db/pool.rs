use std::str::FromStr;

use deadpool_postgres::{
    Config, CreatePoolError, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime,
};
use thiserror::Error;
use tokio_postgres::NoTls;

pub type PgPool = Pool;

#[derive(Debug, Error)]
pub enum DbPoolError {
    #[error("malformed DATABASE_URL: {0}")]
    InvalidConfig(String),
    #[error("pool construction failed: {0}")]
    PoolCreation(#[from] CreatePoolError),
}

/// Pool sizing, overridable with `CM_DB_POOL_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_size: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self { max_size: 16 }
    }
}

impl PoolSettings {
    pub fn from_env() -> Self {
        match std::env::var("CM_DB_POOL_SIZE").map(|raw| raw.trim().parse::<usize>()) {
            Ok(Ok(size)) if size > 0 => Self { max_size: size },
            _ => Self::default(),
        }
    }

    /// No connection is opened until the first checkout; only the url syntax is checked here.
    pub fn build(self, db_url: &str) -> Result<PgPool, DbPoolError> {
        if let Err(err) = tokio_postgres::Config::from_str(db_url) {
            return Err(DbPoolError::InvalidConfig(err.to_string()));
        }

        let mut config = Config::new();
        config.url = Some(db_url.to_owned());
        config.pool = Some(PoolConfig::new(self.max_size.max(1)));
        config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        Ok(config.create_pool(Some(Runtime::Tokio1), NoTls)?)
    }
}

pub fn create_pool_from_url(db_url: &str) -> Result<PgPool, DbPoolError> {
    PoolSettings::from_env().build(db_url)
}
