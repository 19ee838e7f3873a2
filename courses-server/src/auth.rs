//! Access gate for incoming connections
//!
//! The gateway only ever asks "does this credential grant entry"; how
//! credentials are provisioned, stored or revoked is the admin tooling's
//! business.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::warn;

use courses_common::db::queries;

/// Capability check injected into the connection gateway
#[async_trait]
pub trait AccessGate: Send + Sync {
    async fn is_authorized(&self, credential: Option<&str>) -> bool;
}

/// Gate backed by the access_tokens table.
///
/// Revoking a token blocks new connections only; connections already
/// established keep their subscription until they disconnect.
pub struct TokenGate {
    db: SqlitePool,
    required: bool,
}

impl TokenGate {
    pub fn new(db: SqlitePool, required: bool) -> Self {
        Self { db, required }
    }
}

#[async_trait]
impl AccessGate for TokenGate {
    async fn is_authorized(&self, credential: Option<&str>) -> bool {
        if !self.required {
            return true;
        }
        let Some(token) = credential else {
            return false;
        };
        match queries::token_is_valid(&self.db, token).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!("access token check failed: {}", e);
                false
            }
        }
    }
}
