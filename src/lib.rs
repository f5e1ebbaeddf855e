//! Feedback widget conversation core
//!
//! Session identity, a transport to the assistant backend, local fallback
//! replies, and a conversation state machine that owns the chat history for
//! one widget mount.

pub mod config;
pub mod context;
pub mod fallback;
pub mod message;
pub mod runtime;
pub mod session;
pub mod state_machine;
pub mod transport;

pub use config::{ConfigError, WidgetConfig};
pub use context::{ContextSnapshot, PageError, PageType};
pub use message::{Message, Role};
pub use runtime::{spawn, ConversationHandle, ConversationSnapshot, HandleError, WidgetEvent};
pub use session::SessionId;
pub use transport::{
    ConversationTransport, HealthStatus, HttpTransport, LoggingTransport, TransportError,
    TransportErrorKind,
};
