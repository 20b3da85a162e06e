//! The persisted session marker.
//!
//! After login the token is written under one fixed key in the browser's
//! session record. It survives a restart of the in-memory console context
//! and is what silent re-login reads on the next request.

use tower_sessions::Session;
use tracing::error;

/// Fixed key holding the token.
pub const SHARED_SESSION_KEY: &str = "sharedSessionId";

/// Persist the token.
pub async fn persist_token(
    session: &Session,
    token: &str,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(SHARED_SESSION_KEY, token).await
}

/// The persisted token, or an empty string if none.
///
/// A store failure reads as no marker and is logged.
pub async fn persisted_token(session: &Session) -> String {
    match session.get::<String>(SHARED_SESSION_KEY).await {
        Ok(token) => token.unwrap_or_default(),
        Err(e) => {
            error!(error = %e, "failed to read session marker");
            String::new()
        }
    }
}

/// Whether a non-empty token is persisted.
pub async fn is_permanent(session: &Session) -> bool {
    !persisted_token(session).await.is_empty()
}

/// Remove the persisted token.
pub async fn clear_token(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<String>(SHARED_SESSION_KEY).await.map(|_| ())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tower_sessions::MemoryStore;
    use tower_sessions::session::{Id, Record};
    use tower_sessions::session_store::{self, SessionStore};

    use super::*;

    /// A store whose backend is unreachable.
    #[derive(Debug)]
    struct DownStore;

    #[async_trait]
    impl SessionStore for DownStore {
        async fn save(&self, _record: &Record) -> session_store::Result<()> {
            Err(session_store::Error::Backend("connection refused".to_string()))
        }

        async fn load(&self, _id: &Id) -> session_store::Result<Option<Record>> {
            Err(session_store::Error::Backend("connection refused".to_string()))
        }

        async fn delete(&self, _id: &Id) -> session_store::Result<()> {
            Err(session_store::Error::Backend("connection refused".to_string()))
        }
    }

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn persist_read_clear() {
        let session = session();
        assert!(!is_permanent(&session).await);

        persist_token(&session, "tok").await.unwrap();
        assert_eq!(persisted_token(&session).await, "tok");
        assert!(is_permanent(&session).await);

        clear_token(&session).await.unwrap();
        assert_eq!(persisted_token(&session).await, "");
    }

    #[tokio::test]
    async fn empty_token_is_not_permanent() {
        let session = session();
        persist_token(&session, "").await.unwrap();
        assert!(!is_permanent(&session).await);
    }

    #[tokio::test]
    async fn unreachable_store_reads_as_no_marker() {
        let session = Session::new(Some(Id::default()), Arc::new(DownStore), None);
        assert_eq!(persisted_token(&session).await, "");
        assert!(!is_permanent(&session).await);
        assert!(persist_token(&session, "tok").await.is_err());
    }
}
