//! Core types for OfflineChat peer discovery
//!
//! Peers are immutable snapshot values: the registry replaces them wholesale
//! on every refresh and never edits one in place.

use core::fmt;
use core::str::FromStr;
use std::net::IpAddr;

use crate::errors::ConfigError;

// ----------------------------------------------------------------------------
// Peer Address
// ----------------------------------------------------------------------------

/// Stable hardware address of a device on the local peer-to-peer layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerAddress([u8; 6]);

impl PeerAddress {
    /// Create an address from its six raw octets
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for PeerAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Invalid {
            reason: format!("invalid peer address: {s:?}"),
        };

        let mut octets = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

// ----------------------------------------------------------------------------
// Peer
// ----------------------------------------------------------------------------

/// Reachability of a peer as reported by the radio layer
///
/// Discriminants match the platform's integer status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerStatus {
    Connected = 0,
    Invited = 1,
    Failed = 2,
    /// Discovered and reachable
    Available = 3,
    /// Seen before but no longer reachable
    Unavailable = 4,
}

impl PeerStatus {
    /// Map a platform status code, treating unknown codes as unreachable
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => PeerStatus::Connected,
            1 => PeerStatus::Invited,
            2 => PeerStatus::Failed,
            3 => PeerStatus::Available,
            _ => PeerStatus::Unavailable,
        }
    }

    pub fn is_reachable(&self) -> bool {
        !matches!(self, PeerStatus::Unavailable | PeerStatus::Failed)
    }
}

/// A nearby device as seen in the latest peer list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peer {
    /// Stable device address
    pub address: PeerAddress,
    /// Display name advertised by the device
    pub name: String,
    /// Reachability
    pub status: PeerStatus,
}

impl Peer {
    pub fn new(address: PeerAddress, name: impl Into<String>, status: PeerStatus) -> Self {
        Self {
            address,
            name: name.into(),
            status,
        }
    }

    /// Shorthand for a freshly discovered, reachable peer
    pub fn available(address: PeerAddress, name: impl Into<String>) -> Self {
        Self::new(address, name, PeerStatus::Available)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {:?})", self.name, self.address, self.status)
    }
}

// ----------------------------------------------------------------------------
// Group and Connection Info
// ----------------------------------------------------------------------------

/// A negotiated peer-to-peer group
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupInfo {
    /// Address of the group owner once the group is formed
    pub endpoint: Option<IpAddr>,
    /// Whether the local device was elected group owner
    pub is_group_owner: bool,
}

impl GroupInfo {
    pub fn with_endpoint(endpoint: IpAddr) -> Self {
        Self {
            endpoint: Some(endpoint),
            is_group_owner: false,
        }
    }
}

/// Reply to a connection-info query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionInfo {
    pub group_formed: bool,
    pub group: GroupInfo,
}

impl ConnectionInfo {
    pub fn formed(group: GroupInfo) -> Self {
        Self {
            group_formed: true,
            group,
        }
    }

    pub fn not_formed() -> Self {
        Self::default()
    }
}

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// Overall peer-to-peer readiness of the local device
///
/// Exactly one value is live at a time and it only changes in response to a
/// classified notification or an explicit command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    RadioDisabled,
    RadioEnabled,
    Discovering,
    Connecting,
    Connected(GroupInfo),
    Disconnected,
}

impl SessionState {
    /// State name for logging
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::RadioDisabled => "RadioDisabled",
            SessionState::RadioEnabled => "RadioEnabled",
            SessionState::Discovering => "Discovering",
            SessionState::Connecting => "Connecting",
            SessionState::Connected(_) => "Connected",
            SessionState::Disconnected => "Disconnected",
        }
    }

    /// Whether a group is formed and chat traffic can flow
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected(_))
    }

    /// Group details while connected
    pub fn group(&self) -> Option<&GroupInfo> {
        match self {
            SessionState::Connected(group) => Some(group),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ----------------------------------------------------------------------------
// Local Device Identity
// ----------------------------------------------------------------------------

/// Display name chosen for the local device
///
/// Supplied once by the naming screen and pushed to the transport at session
/// start; never re-derived afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalDeviceIdentity(String);

impl LocalDeviceIdentity {
    /// Build an identity, truncating the name to `max_len` characters
    pub fn new(name: &str, max_len: usize) -> Self {
        let name = name.trim();
        let truncated = match name.char_indices().nth(max_len) {
            Some((idx, _)) => &name[..idx],
            None => name,
        };
        Self(truncated.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalDeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_address_display_and_parse() {
        let address = PeerAddress::new([0x02, 0x1a, 0xff, 0x00, 0x10, 0xab]);
        assert_eq!(address.to_string(), "02:1a:ff:00:10:ab");
        assert_eq!("02:1a:ff:00:10:ab".parse::<PeerAddress>().unwrap(), address);
        assert_eq!("02-1A-FF-00-10-AB".parse::<PeerAddress>().unwrap(), address);
    }

    #[test]
    fn test_peer_address_rejects_malformed() {
        assert!("02:1a:ff:00:10".parse::<PeerAddress>().is_err());
        assert!("02:1a:ff:00:10:ab:cd".parse::<PeerAddress>().is_err());
        assert!("02:1a:ff:00:10:zz".parse::<PeerAddress>().is_err());
        assert!("021a:ff:00:10:ab".parse::<PeerAddress>().is_err());
    }

    #[test]
    fn test_peer_status_codes() {
        assert_eq!(PeerStatus::from_code(3), PeerStatus::Available);
        assert_eq!(PeerStatus::from_code(4), PeerStatus::Unavailable);
        assert_eq!(PeerStatus::from_code(42), PeerStatus::Unavailable);
        assert!(PeerStatus::Available.is_reachable());
        assert!(!PeerStatus::Unavailable.is_reachable());
    }

    #[test]
    fn test_session_state_helpers() {
        let group = GroupInfo::with_endpoint("10.0.0.1".parse().unwrap());
        let state = SessionState::Connected(group.clone());
        assert!(state.is_connected());
        assert_eq!(state.group(), Some(&group));
        assert_eq!(state.name(), "Connected");
        assert_eq!(SessionState::default(), SessionState::RadioDisabled);
        assert!(SessionState::Connecting.group().is_none());
    }

    #[test]
    fn test_local_identity_truncates_on_char_boundary() {
        let identity = LocalDeviceIdentity::new("  Zoë's phone  ", 4);
        assert_eq!(identity.as_str(), "Zoë'");

        let identity = LocalDeviceIdentity::new("alice", 32);
        assert_eq!(identity.as_str(), "alice");
    }
}
