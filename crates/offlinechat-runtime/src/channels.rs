//! Channel plumbing for the session runtime
//!
//! Two channels feed the session task:
//!
//! - the command channel (UI → session), bounded by
//!   `SessionConfig::command_buffer_size`
//! - the session inbox (dispatcher and transport callbacks → session),
//!   unbounded because callbacks run synchronously and cannot wait

use core::fmt;

use offlinechat_core::{ConnectionInfo, GroupInfo, Peer, SessionConfig, TransportError, TransportEvent};
use tokio::sync::mpsc;
use tracing::trace;

// ----------------------------------------------------------------------------
// Command: UI → Session
// ----------------------------------------------------------------------------

/// Commands sent from the UI to the session task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Start (or retry) discovery under the given local name
    Start { local_name: String },
    /// Tear down the group and release discovery resources
    Stop,
    /// The app returned to the foreground
    Resume,
    /// The app moved to the background
    Pause,
    /// Switch the peer-to-peer radio on or off
    SetRadioEnabled(bool),
    /// Stop the session and exit the task loop
    Shutdown,
}

pub type CommandSender = mpsc::Sender<SessionCommand>;
pub type CommandReceiver = mpsc::Receiver<SessionCommand>;

pub fn create_command_channel(config: &SessionConfig) -> (CommandSender, CommandReceiver) {
    mpsc::channel(config.command_buffer_size)
}

// ----------------------------------------------------------------------------
// Session Input: Dispatcher / Transport → Session
// ----------------------------------------------------------------------------

/// Outcome of a transport query, routed back to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportReply {
    Rename(Result<(), TransportError>),
    DiscoveryStarted(Result<(), TransportError>),
    PeerList(Vec<Peer>),
    /// `query` is the sequence number of the request that produced `info`
    ConnectionInfo { query: u64, info: ConnectionInfo },
    GroupInfo(Option<GroupInfo>),
    GroupTeardown(Result<(), TransportError>),
    DiscoveryStopped(Result<(), TransportError>),
}

impl TransportReply {
    pub fn kind(&self) -> &'static str {
        match self {
            TransportReply::Rename(_) => "Rename",
            TransportReply::DiscoveryStarted(_) => "DiscoveryStarted",
            TransportReply::PeerList(_) => "PeerList",
            TransportReply::ConnectionInfo { .. } => "ConnectionInfo",
            TransportReply::GroupInfo(_) => "GroupInfo",
            TransportReply::GroupTeardown(_) => "GroupTeardown",
            TransportReply::DiscoveryStopped(_) => "DiscoveryStopped",
        }
    }
}

/// Everything the session consumes on its execution context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    /// Classified platform notification
    Notification(TransportEvent),
    /// Transport reply tagged with the generation that issued the request
    Reply { generation: u64, reply: TransportReply },
    /// Re-pull transport state after the subscription was re-registered
    Resync,
}

impl fmt::Display for SessionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionInput::Notification(event) => write!(f, "notification {event}"),
            SessionInput::Reply { generation, reply } => {
                write!(f, "reply {} (generation {generation})", reply.kind())
            }
            SessionInput::Resync => f.write_str("resync"),
        }
    }
}

pub type InboxReceiver = mpsc::UnboundedReceiver<SessionInput>;

/// Sending half of the session inbox
#[derive(Debug, Clone)]
pub struct SessionInbox {
    sender: mpsc::UnboundedSender<SessionInput>,
}

impl SessionInbox {
    /// Post an input; returns false once the session has gone away
    pub fn post(&self, input: SessionInput) -> bool {
        match self.sender.send(input) {
            Ok(()) => true,
            Err(mpsc::error::SendError(input)) => {
                trace!("Session inbox closed, dropping {}", input);
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

pub fn create_session_inbox() -> (SessionInbox, InboxReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (SessionInbox { sender }, receiver)
}
