//! OfflineChat Core
//!
//! This crate provides the foundational pieces shared by the OfflineChat
//! session runtime and any transport implementation:
//!
//! - [`types`] - peers, groups and the session readiness state
//! - [`errors`] - the error taxonomy for transport commands and sessions
//! - [`config`] - session configuration
//! - [`registry`] - the shared, snapshot-based peer registry
//! - [`transport`] - the seam between the session and the local
//!   peer-to-peer radio layer
//!
//! The radio layer itself is abstract: anything that can enable a radio,
//! discover peers, form groups and post notifications can sit behind
//! [`TransportAdapter`] and [`NotificationSource`].

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod registry;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::SessionConfig;
pub use errors::{ConfigError, FailureReason, SessionError, TransportError};
pub use registry::{PeerRegistry, PeerSnapshot};
pub use transport::{
    AdapterCapabilities, NotificationHandler, NotificationSource, RawNotification, ReplyCallback,
    SubscriptionHandle, TransportAdapter, TransportEvent,
};
pub use types::{
    ConnectionInfo, GroupInfo, LocalDeviceIdentity, Peer, PeerAddress, PeerStatus, SessionState,
};

/// Result type for session operations
pub type Result<T> = core::result::Result<T, SessionError>;
