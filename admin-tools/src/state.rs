//! Shared application state.

use crate::accounts::users::UserStore;
use crate::config::Config;
use crate::db::DbPool;
use crate::sessions::{SessionCodec, SessionStore};
use anyhow::{Context, Result};
use std::sync::Arc;

/// State shared by all routes and middleware.
pub struct AppState {
    pub config: Config,
    pub users: UserStore,
    pub sessions: SessionStore,
    pub codec: SessionCodec,
}

impl AppState {
    pub fn new(config: Config, pool: DbPool) -> Result<Arc<Self>> {
        let codec = SessionCodec::new(&config.secret_key).context("Invalid secret key")?;
        Ok(Arc::new(Self {
            users: UserStore::new(pool.clone()),
            sessions: SessionStore::new(pool),
            codec,
            config,
        }))
    }
}
