//! Browser session storage.
//!
//! Sessions live in Redis when `REDIS_URL` is set and in process memory
//! otherwise. Either way they expire after a period of inactivity, like the
//! short-lived browser store the token marker is meant to mirror.

use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fred::prelude::*;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, SessionStore};
use tower_sessions_redis_store::RedisStore;
use tracing::info;

use crate::config::Config as AppConfig;

/// Session backend chosen at startup.
#[derive(Clone)]
pub enum ConsoleSessionStore {
    Memory(MemoryStore),
    Redis(RedisStore<Pool>),
}

impl fmt::Debug for ConsoleSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleSessionStore::Memory(_) => f.write_str("ConsoleSessionStore::Memory"),
            ConsoleSessionStore::Redis(_) => f.write_str("ConsoleSessionStore::Redis"),
        }
    }
}

#[async_trait]
impl SessionStore for ConsoleSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        match self {
            ConsoleSessionStore::Memory(store) => store.create(record).await,
            ConsoleSessionStore::Redis(store) => store.create(record).await,
        }
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        match self {
            ConsoleSessionStore::Memory(store) => store.save(record).await,
            ConsoleSessionStore::Redis(store) => store.save(record).await,
        }
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        match self {
            ConsoleSessionStore::Memory(store) => store.load(session_id).await,
            ConsoleSessionStore::Redis(store) => store.load(session_id).await,
        }
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        match self {
            ConsoleSessionStore::Memory(store) => store.delete(session_id).await,
            ConsoleSessionStore::Redis(store) => store.delete(session_id).await,
        }
    }
}

/// Connect the configured session backend.
pub async fn create_session_store(config: &AppConfig) -> Result<ConsoleSessionStore> {
    let Some(redis_url) = config.redis_url.as_deref() else {
        info!("using in-memory session store");
        return Ok(ConsoleSessionStore::Memory(MemoryStore::default()));
    };

    let redis_config = Config::from_url(redis_url).context("failed to parse Redis URL")?;

    let pool = Builder::from_config(redis_config)
        .build_pool(1)
        .context("failed to create Redis pool")?;

    pool.init()
        .await
        .context("failed to connect to Redis for sessions")?;

    info!("using Redis session store");
    Ok(ConsoleSessionStore::Redis(RedisStore::new(pool)))
}

/// Build the session layer around a store.
pub fn session_layer<S>(store: S, config: &AppConfig) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_secure(config.cookie_secure)
        .with_http_only(true)
        .with_same_site(same_site(&config.cookie_same_site))
        .with_expiry(Expiry::OnInactivity(Duration::minutes(
            config.session_expiry_minutes,
        )))
}

fn same_site(policy: &str) -> SameSite {
    match policy {
        "lax" => SameSite::Lax,
        "none" => SameSite::None,
        _ => SameSite::Strict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_site_defaults_to_strict() {
        assert_eq!(same_site("lax"), SameSite::Lax);
        assert_eq!(same_site("none"), SameSite::None);
        assert_eq!(same_site("bogus"), SameSite::Strict);
    }
}
