use crate::error::{AppError, Result};
use crate::models::{AccountRole, TokenGrant};
use rand::Rng;
use reqwest::{Client, Url};
use uuid::Uuid;

/// Authorization-code flow against the accounts service. This service
/// never refreshes or persists tokens; a grant lives only inside its
/// session.
#[derive(Debug, Clone)]
pub struct OauthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    accounts_base: String,
    client: Client,
}

impl OauthClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        accounts_base: String,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            accounts_base,
            client: Client::new(),
        }
    }

    /// Opaque state round-tripped through the provider:
    /// `<role>:<session-id>:<nonce>`. The callback validates the whole
    /// string against the copy stored in the session.
    pub fn generate_state(role: AccountRole, session_id: Uuid) -> String {
        format!("{}:{}:{}", role.as_str(), session_id, Self::generate_nonce())
    }

    fn generate_nonce() -> String {
        let mut rng = rand::thread_rng();
        (0..16).map(|_| format!("{:x}", rng.gen::<u8>())).collect()
    }

    /// Split a callback state back into its parts.
    pub fn parse_state(state: &str) -> Option<(AccountRole, Uuid)> {
        let mut parts = state.splitn(3, ':');
        let role = AccountRole::parse(parts.next()?)?;
        let session_id = parts.next()?.parse().ok()?;
        parts.next()?;
        Some((role, session_id))
    }

    /// URL to send the user to. `show_dialog` forces the account chooser so
    /// a second, different account can be linked for the destination.
    pub fn authorize_url(&self, role: AccountRole, state: &str) -> Result<String> {
        let url = Url::parse_with_params(
            &format!("{}/authorize", self.accounts_base),
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", role.scopes()),
                ("state", state),
                ("show_dialog", "true"),
            ],
        )
        .map_err(|e| AppError::OAuth(format!("Invalid authorize URL: {}", e)))?;

        Ok(url.into())
    }

    /// Exchange an authorization code for a bearer grant.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        let url = format!("{}/api/token", self.accounts_base);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::OAuth(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Token exchange failed: {} - {}", status, body);
            return Err(AppError::OAuth(format!(
                "Token exchange returned status {}: {}",
                status, body
            )));
        }

        let grant: TokenGrant = response
            .json()
            .await
            .map_err(|e| AppError::OAuth(format!("Failed to parse token response: {}", e)))?;

        Ok(grant)
    }
}
