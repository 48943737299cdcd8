pub mod extractor;
pub mod oauth;
pub mod session;
pub mod snapshot;
pub mod spotify;
pub mod transporter;

pub use oauth::OauthClient;
pub use session::SessionStore;
pub use snapshot::SnapshotStore;
pub use spotify::SpotifyClient;
