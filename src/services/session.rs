use crate::error::{AppError, Result};
use crate::models::TransferSession;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
}

/// In-memory map of active migration sessions. A session's identity is a
/// signed token handed to the client; everything else (linked accounts,
/// OAuth state) lives server-side and dies with the process. One session
/// per run keeps concurrent users isolated from each other.
pub struct SessionStore {
    jwt_secret: String,
    sessions: RwLock<HashMap<Uuid, TransferSession>>,
}

impl SessionStore {
    pub fn new(jwt_secret: String) -> Self {
        Self {
            jwt_secret,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a fresh session and return its id plus the signed token the
    /// client will present on every subsequent request.
    pub async fn create(&self) -> Result<(Uuid, String)> {
        let id = Uuid::new_v4();
        let token = self.issue_token(id)?;

        self.sessions.write().await.insert(id, TransferSession::new());
        tracing::debug!("Created session {}", id);

        Ok((id, token))
    }

    pub fn verify_token(&self, token: &str) -> Result<Uuid> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::Unauthorized)?;

        Ok(token_data.claims.sub)
    }

    pub async fn get(&self, id: Uuid) -> Option<TransferSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Mutate a session in place. Fails if the session is gone (process
    /// restart, reset from another tab).
    pub async fn update<F>(&self, id: Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut TransferSession),
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or(AppError::Unauthorized)?;
        f(session);
        Ok(())
    }

    /// Drop all linked accounts and state, keeping the session id valid.
    pub async fn reset(&self, id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or(AppError::Unauthorized)?;
        *session = TransferSession::new();
        Ok(())
    }

    fn issue_token(&self, id: Uuid) -> Result<String> {
        let claims = Claims {
            sub: id,
            exp: (Utc::now() + Duration::days(7)).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Token generation failed: {}", e)))
    }
}
