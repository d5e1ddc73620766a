//! Conversation memory keyed by session id

mod session;

pub use session::{ConversationMemory, SessionMemory};
