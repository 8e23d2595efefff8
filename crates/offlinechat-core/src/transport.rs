//! Transport seam for the local peer-to-peer radio layer
//!
//! The radio layer is split across two traits:
//!
//! - [`TransportAdapter`] takes imperative commands. Every command returns
//!   immediately; its outcome arrives later through the supplied callback.
//! - [`NotificationSource`] delivers raw platform notifications to a single
//!   subscribed handler.
//!
//! Notifications only say *that* something changed. The session always
//! follows a peer-list or connection notification with an explicit query.

use core::fmt;
use std::sync::Arc;

use crate::errors::TransportError;
use crate::types::{ConnectionInfo, GroupInfo, Peer};

/// One-shot completion callback for a transport command
pub type ReplyCallback<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Handler invoked for every raw notification while subscribed
pub type NotificationHandler = Arc<dyn Fn(RawNotification) + Send + Sync + 'static>;

// ----------------------------------------------------------------------------
// Transport Adapter
// ----------------------------------------------------------------------------

/// Optional commands an adapter may or may not support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterCapabilities {
    /// Whether the local device can be renamed
    pub rename_local_device: bool,
}

impl Default for AdapterCapabilities {
    fn default() -> Self {
        Self {
            rename_local_device: true,
        }
    }
}

/// Imperative side of the radio layer
pub trait TransportAdapter: Send {
    /// Describe the optional commands this adapter supports
    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::default()
    }

    /// Switch the peer-to-peer radio on or off
    fn set_radio_enabled(&mut self, enabled: bool);

    /// Push a new display name for the local device
    fn rename_local_device(&mut self, name: &str, done: ReplyCallback<Result<(), TransportError>>);

    /// Begin scanning for nearby peers
    fn start_discovery(&mut self, done: ReplyCallback<Result<(), TransportError>>);

    /// Stop scanning and release discovery resources
    fn stop_discovery(&mut self, done: ReplyCallback<Result<(), TransportError>>);

    /// Fetch the full current peer list
    fn request_peer_list(&mut self, done: ReplyCallback<Vec<Peer>>);

    /// Fetch the current connection info
    fn request_connection_info(&mut self, done: ReplyCallback<ConnectionInfo>);

    /// Fetch details of the group this device belongs to, if any
    fn request_group_info(&mut self, done: ReplyCallback<Option<GroupInfo>>);

    /// Leave and dissolve the current group
    fn request_group_teardown(&mut self, done: ReplyCallback<Result<(), TransportError>>);
}

// ----------------------------------------------------------------------------
// Notification Source
// ----------------------------------------------------------------------------

/// Token returned by [`NotificationSource::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Broadcast side of the radio layer
pub trait NotificationSource: Send {
    fn subscribe(&mut self, handler: NotificationHandler) -> SubscriptionHandle;

    fn unsubscribe(&mut self, handle: SubscriptionHandle);
}

// ----------------------------------------------------------------------------
// Notifications
// ----------------------------------------------------------------------------

/// Action names carried by raw platform notifications
pub mod actions {
    pub const STATE_CHANGED: &str = "wifi_p2p.STATE_CHANGED";
    pub const PEERS_CHANGED: &str = "wifi_p2p.PEERS_CHANGED";
    pub const CONNECTION_CHANGED: &str = "wifi_p2p.CONNECTION_STATE_CHANGE";
    pub const THIS_DEVICE_CHANGED: &str = "wifi_p2p.THIS_DEVICE_CHANGED";

    /// Radio state extra: peer-to-peer disabled
    pub const RADIO_STATE_DISABLED: i32 = 1;
    /// Radio state extra: peer-to-peer enabled
    pub const RADIO_STATE_ENABLED: i32 = 2;
}

/// Unclassified notification as posted by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    /// Platform action name
    pub action: String,
    /// Radio state extra, present on state-change notifications
    pub state_code: Option<i32>,
    /// Device extra, present on local-device notifications
    pub device: Option<Peer>,
}

impl RawNotification {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            state_code: None,
            device: None,
        }
    }

    pub fn radio_state(enabled: bool) -> Self {
        let code = if enabled {
            actions::RADIO_STATE_ENABLED
        } else {
            actions::RADIO_STATE_DISABLED
        };
        Self {
            state_code: Some(code),
            ..Self::new(actions::STATE_CHANGED)
        }
    }

    pub fn peers_changed() -> Self {
        Self::new(actions::PEERS_CHANGED)
    }

    pub fn connection_changed() -> Self {
        Self::new(actions::CONNECTION_CHANGED)
    }

    pub fn this_device_changed(device: Option<Peer>) -> Self {
        Self {
            device,
            ..Self::new(actions::THIS_DEVICE_CHANGED)
        }
    }
}

/// Classified notification consumed by the session state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The peer-to-peer radio was switched on or off
    RadioStateChanged { enabled: bool },
    /// The set of nearby peers changed; the list must be pulled
    PeerListChanged,
    /// Group connectivity changed; connection info must be pulled
    ConnectionChanged,
    /// Details of the local device changed
    LocalDeviceChanged(Option<Peer>),
}

impl TransportEvent {
    /// Event kind for logging
    pub fn kind(&self) -> &'static str {
        match self {
            TransportEvent::RadioStateChanged { .. } => "RadioStateChanged",
            TransportEvent::PeerListChanged => "PeerListChanged",
            TransportEvent::ConnectionChanged => "ConnectionChanged",
            TransportEvent::LocalDeviceChanged(_) => "LocalDeviceChanged",
        }
    }
}

impl fmt::Display for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportEvent::RadioStateChanged { enabled } => {
                write!(f, "RadioStateChanged(enabled={enabled})")
            }
            other => f.write_str(other.kind()),
        }
    }
}
