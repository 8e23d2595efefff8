//! OfflineChat Runtime
//!
//! This crate drives peer discovery and group negotiation on top of the
//! transport seam defined in `offlinechat-core`:
//!
//! - `SessionStateMachine`: the single authority for the session state and
//!   the only component that commands the transport
//! - `NotificationDispatcher`: classifies raw platform notifications and
//!   owns the subscribe/unsubscribe lifecycle
//! - `SessionTask`: the event loop that serializes UI commands, notifications
//!   and transport replies onto one execution context
//! - `SessionHandle`: the cloneable, UI-facing API
//!
//! Transport replies never touch the state machine directly. Each callback
//! posts a message, tagged with the session generation that issued it, onto
//! the session inbox; replies from a superseded generation are dropped.

pub mod channels;
pub mod dispatcher;
pub mod machine;
pub mod task;

pub use channels::{
    create_command_channel, create_session_inbox, CommandReceiver, CommandSender, InboxReceiver,
    SessionCommand, SessionInbox, SessionInput, TransportReply,
};
pub use dispatcher::NotificationDispatcher;
pub use machine::{SessionStateMachine, SessionStats};
pub use task::{spawn_session, SessionHandle, SessionTask};

// Re-export core types for convenience
pub use offlinechat_core::{
    ConnectionInfo, GroupInfo, Peer, PeerAddress, PeerRegistry, PeerSnapshot, PeerStatus,
    RawNotification, Result, SessionConfig, SessionError, SessionState, TransportError,
    TransportEvent,
};
