use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub redirect_uri: String,
    /// Base URL of the accounts service (authorize + token endpoints).
    pub accounts_base_url: String,
    /// Base URL of the Web API. Overridable so tests can point at a mock.
    pub api_base_url: String,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    /// Where the browser lands after an OAuth callback completes.
    pub frontend_url: String,
    /// Directory holding per-session library snapshots.
    pub snapshot_dir: PathBuf,
    /// Allowed CORS origins (comma-separated). Use "*" for any origin (development only).
    pub cors_origins: Vec<String>,
    pub pacing: Pacing,
}

/// Pacing knobs for the extraction/transfer pipelines. Injected at
/// construction so tests can run with near-zero delays.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Saved-tracks read page size.
    pub page_size: usize,
    /// Delay between successfully fetched pages.
    pub page_delay: Duration,
    /// Delay after every single-item insert attempt. Load-bearing: the
    /// destination orders liked items by insertion time, and back-to-back
    /// writes can land out of order in its index.
    pub insert_delay: Duration,
    /// Batch write size for unordered transfers.
    pub batch_size: usize,
    /// Delay between batch writes.
    pub batch_delay: Duration,
    /// Emit a transfer progress event every N successful inserts.
    pub progress_interval: usize,
    /// Backoff used when a 429 response carries no Retry-After header.
    pub default_retry_after: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            page_size: 50,
            page_delay: Duration::from_millis(300),
            insert_delay: Duration::from_millis(150),
            batch_size: 50,
            batch_delay: Duration::from_millis(500),
            progress_interval: 10,
            default_retry_after: Duration::from_secs(30),
        }
    }
}

impl Pacing {
    /// All delays zeroed. Test-only pacing so suspension points don't slow
    /// the suite down.
    #[cfg(test)]
    pub fn zero() -> Self {
        Self {
            page_delay: Duration::ZERO,
            insert_delay: Duration::ZERO,
            batch_delay: Duration::ZERO,
            default_retry_after: Duration::ZERO,
            ..Self::default()
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        // JWT_SECRET is required - no insecure defaults
        let jwt_secret = env::var("JWT_SECRET").map_err(|_| {
            anyhow::anyhow!(
                "JWT_SECRET environment variable must be set. \
                Generate a secure secret with: openssl rand -base64 32"
            )
        })?;

        // Validate JWT secret length (at least 32 bytes for HS256)
        if jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long for security. \
                Generate a secure secret with: openssl rand -base64 32"
            ));
        }

        let spotify_client_id = env::var("SPOTIFY_CLIENT_ID")
            .map_err(|_| anyhow::anyhow!("SPOTIFY_CLIENT_ID must be set"))?;
        let spotify_client_secret = env::var("SPOTIFY_CLIENT_SECRET")
            .map_err(|_| anyhow::anyhow!("SPOTIFY_CLIENT_SECRET must be set"))?;

        // Parse CORS origins - default to localhost for development
        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:8000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let server_port: u16 = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .unwrap_or(8000);

        let pacing = Pacing {
            page_delay: duration_ms_from_env("EXTRACT_PAGE_DELAY_MS", 300),
            insert_delay: duration_ms_from_env("TRANSFER_ITEM_DELAY_MS", 150),
            batch_delay: duration_ms_from_env("TRANSFER_BATCH_DELAY_MS", 500),
            ..Pacing::default()
        };

        Ok(Config {
            spotify_client_id,
            spotify_client_secret,
            redirect_uri: env::var("SPOTIFY_REDIRECT_URI").unwrap_or_else(|_| {
                format!("http://127.0.0.1:{}/api/v1/auth/callback", server_port)
            }),
            accounts_base_url: env::var("SPOTIFY_ACCOUNTS_URL")
                .unwrap_or_else(|_| "https://accounts.spotify.com".to_string()),
            api_base_url: env::var("SPOTIFY_API_URL")
                .unwrap_or_else(|_| "https://api.spotify.com/v1".to_string()),
            jwt_secret,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            snapshot_dir: env::var("SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./snapshots")),
            cors_origins,
            pacing,
        })
    }
}

fn duration_ms_from_env(key: &str, default_ms: u64) -> Duration {
    let ms = env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}
