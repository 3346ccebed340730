// Shared domain types and the realtime wire protocol.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use protocol::{ClientEvent, ServerEvent};
pub use types::{ConnectionStatus, ConversationId, Message, MessageId, ReadMarker, UserId, UserProfile};
