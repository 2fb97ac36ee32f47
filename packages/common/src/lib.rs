//! Shared building blocks for the agora messaging backend: opaque
//! identifiers, the timestamp tuple stamped on every row, the listing
//! cursor codec and the small enums persisted alongside entities.

pub mod cursor;
pub mod ids;
pub mod stamp;
pub mod status;

pub use cursor::CursorError;
pub use ids::IdError;
pub use stamp::Stamp;
pub use status::{Status, UserState, VoteDirection};
