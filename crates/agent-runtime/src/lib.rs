//! Chat runtime for agent-rs
//!
//! This crate drives conversations on top of the provider and tool layers:
//! the streaming tool-chat [`ChatSession`], its event handlers, the
//! [`TextToSql`] helper and the [`PaperReviewer`].

pub mod events;
pub mod review;
pub mod session;
pub mod sql;

// Re-export key types
pub use events::{ChatEventHandler, ConsoleEventHandler, NoOpEventHandler};
pub use review::{PaperReviewer, review_output_path};
pub use session::{ChatSession, ChatSessionBuilder, SessionConfig};
pub use sql::TextToSql;
