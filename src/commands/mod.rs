//! CLI commands implementation

pub mod analyze;
pub mod discover;
pub mod events;
pub mod init;
pub mod jobs;
pub mod send;
pub mod sequences;
pub mod status;
pub mod unsubscribe;

pub use analyze::*;
pub use discover::*;
pub use events::*;
pub use init::*;
pub use jobs::*;
pub use send::*;
pub use sequences::*;
pub use status::*;
pub use unsubscribe::*;
