use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the migration an account is linked as. The source only
/// needs read scope; the destination also writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Source,
    Dest,
}

impl AccountRole {
    pub fn scopes(&self) -> &'static str {
        match self {
            AccountRole::Source => "user-library-read",
            AccountRole::Dest => "user-library-read user-library-modify",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Source => "source",
            AccountRole::Dest => "dest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "source" => Some(AccountRole::Source),
            "dest" => Some(AccountRole::Dest),
            _ => None,
        }
    }
}

/// Bearer credential returned by the token exchange. Held in the session
/// for the duration of a run; never persisted, never refreshed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    pub image_url: Option<String>,
}

/// A linked account: its credential plus the profile fetched with it.
#[derive(Debug, Clone)]
pub struct AccountLink {
    pub credential: TokenGrant,
    pub user: UserProfile,
}

/// Per-run state for one migration. One instance per session id; sessions
/// never share state, so concurrent runs stay isolated.
#[derive(Debug, Clone)]
pub struct TransferSession {
    pub source: Option<AccountLink>,
    pub dest: Option<AccountLink>,
    /// Expected OAuth state for the in-flight authorization, if any.
    pub oauth_state: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TransferSession {
    pub fn new() -> Self {
        Self {
            source: None,
            dest: None,
            oauth_state: None,
            created_at: Utc::now(),
        }
    }
}

impl Default for TransferSession {
    fn default() -> Self {
        Self::new()
    }
}
