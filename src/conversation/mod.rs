//! Per-chat conversation flow: states, sessions, events and the manager.

pub mod events;
pub mod manager;
pub mod session;
pub mod state;

pub use events::{ConversationEvent, MenuAction};
pub use manager::{ConversationManager, NoProgress, ProgressSink, parse_age};
pub use session::{Session, SessionStore};
pub use state::ConversationState;
