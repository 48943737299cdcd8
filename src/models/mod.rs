pub mod events;
pub mod session;
pub mod track;

pub use events::{ExtractEvent, TransferEvent};
pub use session::{AccountLink, AccountRole, TokenGrant, TransferSession, UserProfile};
pub use track::SavedTrack;
