//! Session State Machine
//!
//! Single authority for [`SessionState`] and the only component allowed to
//! command the transport. Every mutation happens on one execution context:
//! notifications arrive through [`SessionStateMachine::on_notification`] and
//! transport replies are posted onto the session inbox, then applied by
//! [`SessionStateMachine::handle_input`].
//!
//! Transition table:
//!
//! | Current state          | Input                          | Action                    | New state       |
//! |------------------------|--------------------------------|---------------------------|-----------------|
//! | any                    | `RadioStateChanged(false)`     | none                      | `RadioDisabled` |
//! | `RadioDisabled`        | `RadioStateChanged(true)`      | none                      | `RadioEnabled`  |
//! | any but connecting/ed  | `PeerListChanged`              | pull peer list            | `Discovering`   |
//! | `Connecting/Connected` | `PeerListChanged`              | pull peer list            | unchanged       |
//! | any                    | `ConnectionChanged`            | pull connection info      | `Connecting`    |
//! | `Connecting`           | connection info, formed        | store group               | `Connected`     |
//! | `Connecting`           | connection info, not formed    | none                      | `Disconnected`  |
//! | any                    | `LocalDeviceChanged`           | remember device           | unchanged       |
//!
//! Pulls happen whether or not a session is running. Only replies to
//! requests issued before the latest `start` or `stop` are dropped.

use offlinechat_core::{
    ConnectionInfo, LocalDeviceIdentity, Peer, PeerRegistry, PeerSnapshot, ReplyCallback,
    SessionConfig, SessionState, TransportAdapter, TransportError, TransportEvent,
};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::channels::{
    create_session_inbox, InboxReceiver, SessionInbox, SessionInput, TransportReply,
};

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Counters for the session, reported alongside logs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub notifications_processed: u64,
    pub peer_list_refreshes: u64,
    pub peer_list_changes: u64,
    pub connection_queries: u64,
    pub stale_replies_discarded: u64,
    pub transport_failures: u64,
    pub unsupported_operations: u64,
    pub state_transitions: u64,
}

// ----------------------------------------------------------------------------
// Session State Machine
// ----------------------------------------------------------------------------

/// Drives discovery and group negotiation for one device
pub struct SessionStateMachine<A: TransportAdapter> {
    adapter: A,
    registry: PeerRegistry,
    config: SessionConfig,
    state: SessionState,
    state_sender: watch::Sender<SessionState>,
    identity: Option<LocalDeviceIdentity>,
    local_device: Option<Peer>,
    running: bool,
    /// Advanced by every start and stop; replies carry the value they were issued under
    generation: u64,
    /// Sequence number of the latest connection-info request
    connection_query: u64,
    inbox: SessionInbox,
    inbox_receiver: InboxReceiver,
    stats: SessionStats,
}

impl<A: TransportAdapter> SessionStateMachine<A> {
    /// Create a stopped session in the `RadioDisabled` state
    pub fn new(adapter: A, registry: PeerRegistry, config: SessionConfig) -> Self {
        let (inbox, inbox_receiver) = create_session_inbox();
        let (state_sender, _) = watch::channel(SessionState::default());
        Self {
            adapter,
            registry,
            config,
            state: SessionState::default(),
            state_sender,
            identity: None,
            local_device: None,
            running: false,
            generation: 0,
            connection_query: 0,
            inbox,
            inbox_receiver,
            stats: SessionStats::default(),
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Start the session under `local_name`
    ///
    /// On a stopped session this opens a new generation, probes for a group
    /// left over from an earlier session, pushes the name to the transport
    /// once and starts discovery. On a running session it only re-issues
    /// discovery, which is how callers retry after a discovery failure.
    pub fn start(&mut self, local_name: &str) {
        if self.running {
            info!("Session already running, retrying discovery");
            self.issue_start_discovery();
            return;
        }

        self.generation += 1;
        self.running = true;
        self.connection_query = 0;

        let identity = LocalDeviceIdentity::new(local_name, self.config.max_local_name_len);
        info!(
            "Starting session generation {} as {:?}",
            self.generation,
            identity.as_str()
        );

        let probe = self.reply_to(TransportReply::GroupInfo);
        self.adapter.request_group_info(probe);

        if self.adapter.capabilities().rename_local_device {
            let done = self.reply_to(TransportReply::Rename);
            self.adapter.rename_local_device(identity.as_str(), done);
        } else {
            self.record_transport_error(&TransportError::unsupported("rename_local_device"));
        }
        self.identity = Some(identity);

        self.issue_start_discovery();
    }

    /// Stop the session
    ///
    /// Tears down any group being formed or already formed, releases discovery
    /// and discards the peer list. Replies still in flight are dropped when they
    /// arrive. Calling this on a stopped session does nothing.
    pub fn stop(&mut self) {
        if !self.running {
            debug!("Stop requested on a stopped session");
            return;
        }

        self.running = false;
        self.generation += 1;
        info!("Stopping session, generation now {}", self.generation);

        if matches!(
            self.state,
            SessionState::Connecting | SessionState::Connected(_)
        ) {
            let done = self.reply_to(TransportReply::GroupTeardown);
            self.adapter.request_group_teardown(done);
        }
        let done = self.reply_to(TransportReply::DiscoveryStopped);
        self.adapter.stop_discovery(done);
        self.registry.clear();

        let next = match self.state {
            SessionState::Connecting | SessionState::Connected(_) => {
                Some(SessionState::Disconnected)
            }
            SessionState::Discovering => Some(SessionState::RadioEnabled),
            _ => None,
        };
        if let Some(next) = next {
            self.set_state(next, "stop");
        }
    }

    /// Ask the transport to switch the radio on or off
    ///
    /// The state follows only once the radio reports the change.
    pub fn set_radio_enabled(&mut self, enabled: bool) {
        debug!("Requesting radio enabled={}", enabled);
        self.adapter.set_radio_enabled(enabled);
    }

    /// Re-pull the peer list after the notification subscription was re-registered
    pub fn resync(&mut self) {
        debug!("Resyncing peer list");
        self.issue_peer_list_request();
    }

    // ------------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------------

    /// Apply one classified notification
    pub fn on_notification(&mut self, event: TransportEvent) {
        self.stats.notifications_processed += 1;
        trace!("Notification {} in state {}", event, self.state);

        match event {
            TransportEvent::RadioStateChanged { enabled: false } => {
                self.set_state(SessionState::RadioDisabled, "RadioStateChanged(false)");
            }
            TransportEvent::RadioStateChanged { enabled: true } => {
                if self.state == SessionState::RadioDisabled {
                    self.set_state(SessionState::RadioEnabled, "RadioStateChanged(true)");
                }
            }
            TransportEvent::PeerListChanged => {
                self.issue_peer_list_request();
                if !matches!(
                    self.state,
                    SessionState::Connecting | SessionState::Connected(_)
                ) {
                    self.set_state(SessionState::Discovering, "PeerListChanged");
                }
            }
            TransportEvent::ConnectionChanged => {
                self.connection_query += 1;
                self.stats.connection_queries += 1;
                let query = self.connection_query;
                let done = self.reply_to(move |info: ConnectionInfo| {
                    TransportReply::ConnectionInfo { query, info }
                });
                self.adapter.request_connection_info(done);
                self.set_state(SessionState::Connecting, "ConnectionChanged");
            }
            TransportEvent::LocalDeviceChanged(device) => {
                debug!("Local device changed: {:?}", device);
                self.local_device = device;
            }
        }
    }

    /// Apply one input from the session inbox
    pub fn handle_input(&mut self, input: SessionInput) {
        match input {
            SessionInput::Notification(event) => self.on_notification(event),
            SessionInput::Reply { generation, reply } => self.handle_reply(generation, reply),
            SessionInput::Resync => self.resync(),
        }
    }

    /// Apply every input already waiting in the inbox, returning how many ran
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(input) = self.inbox_receiver.try_recv() {
            self.handle_input(input);
            handled += 1;
        }
        handled
    }

    /// Wait for the next inbox input
    pub async fn next_input(&mut self) -> Option<SessionInput> {
        self.inbox_receiver.recv().await
    }

    fn handle_reply(&mut self, generation: u64, reply: TransportReply) {
        match reply {
            // Cleanup outcomes are counted whichever session issued them
            TransportReply::GroupTeardown(result) => {
                self.record_outcome("request_group_teardown", result);
            }
            TransportReply::DiscoveryStopped(result) => {
                self.record_outcome("stop_discovery", result);
            }
            reply if generation != self.generation => {
                self.stats.stale_replies_discarded += 1;
                trace!(
                    "Discarding stale {} reply from generation {} (current {})",
                    reply.kind(),
                    generation,
                    self.generation
                );
            }
            TransportReply::Rename(Ok(())) => {
                info!("Local device renamed");
            }
            TransportReply::Rename(Err(err)) | TransportReply::DiscoveryStarted(Err(err)) => {
                self.record_transport_error(&err);
            }
            TransportReply::DiscoveryStarted(Ok(())) => {
                debug!("Peer discovery started");
            }
            TransportReply::PeerList(peers) => self.apply_peer_list(peers),
            TransportReply::ConnectionInfo { query, info } => self.apply_connection_info(query, info),
            TransportReply::GroupInfo(Some(group)) => {
                if self.config.remove_stale_group_on_start {
                    info!("Removing group left over from a previous session: {:?}", group);
                    let done = self.reply_to(TransportReply::GroupTeardown);
                    self.adapter.request_group_teardown(done);
                } else {
                    debug!("Existing group found at start: {:?}", group);
                }
            }
            TransportReply::GroupInfo(None) => {
                debug!("No existing group at start");
            }
        }
    }

    fn apply_peer_list(&mut self, peers: Vec<Peer>) {
        let count = peers.len();
        let reachable = peers.iter().filter(|peer| peer.status.is_reachable()).count();
        if self.registry.replace(peers) {
            self.stats.peer_list_changes += 1;
            info!("Peer list refreshed: {} peers, {} reachable", count, reachable);
        }
        if self.registry.is_empty() {
            debug!("No devices found");
        }
    }

    fn apply_connection_info(&mut self, query: u64, info: ConnectionInfo) {
        if query != self.connection_query {
            self.stats.stale_replies_discarded += 1;
            trace!(
                "Discarding connection info for query {} (latest {})",
                query,
                self.connection_query
            );
            return;
        }
        if self.state != SessionState::Connecting {
            debug!("Ignoring connection info in state {}", self.state);
            return;
        }

        if info.group_formed {
            self.set_state(SessionState::Connected(info.group), "ConnectionInfoAvailable");
        } else {
            self.set_state(SessionState::Disconnected, "ConnectionInfoAvailable");
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn current_state(&self) -> SessionState {
        self.state.clone()
    }

    pub fn peer_snapshot(&self) -> PeerSnapshot {
        self.registry.snapshot()
    }

    /// Shared handle to the registry for readers
    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Receiver that observes every state change
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_sender.subscribe()
    }

    /// Sender for the session inbox, handed to the dispatcher
    pub fn inbox(&self) -> SessionInbox {
        self.inbox.clone()
    }

    /// Name pushed to the transport for the current session
    pub fn identity(&self) -> Option<&LocalDeviceIdentity> {
        self.identity.as_ref()
    }

    /// Last local device details reported by the transport
    pub fn local_device(&self) -> Option<&Peer> {
        self.local_device.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn set_state(&mut self, next: SessionState, cause: &str) {
        if self.state == next {
            return;
        }
        info!("Session state {} -> {} on {}", self.state, next, cause);
        self.state = next;
        self.stats.state_transitions += 1;
        self.state_sender.send_replace(self.state.clone());
    }

    fn issue_start_discovery(&mut self) {
        let done = self.reply_to(TransportReply::DiscoveryStarted);
        self.adapter.start_discovery(done);
    }

    fn issue_peer_list_request(&mut self) {
        self.stats.peer_list_refreshes += 1;
        let done = self.reply_to(TransportReply::PeerList);
        self.adapter.request_peer_list(done);
    }

    fn record_outcome(&mut self, operation: &str, result: Result<(), TransportError>) {
        match result {
            Ok(()) => debug!("{} succeeded", operation),
            Err(err) => self.record_transport_error(&err),
        }
    }

    fn record_transport_error(&mut self, err: &TransportError) {
        if err.is_unsupported() {
            self.stats.unsupported_operations += 1;
            info!("{}; continuing without it", err);
        } else {
            self.stats.transport_failures += 1;
            warn!("{}", err);
        }
    }

    /// Build a callback that posts its value back onto the inbox under the current generation
    fn reply_to<T, F>(&self, wrap: F) -> ReplyCallback<T>
    where
        T: 'static,
        F: FnOnce(T) -> TransportReply + Send + 'static,
    {
        let inbox = self.inbox.clone();
        let generation = self.generation;
        Box::new(move |value| {
            inbox.post(SessionInput::Reply {
                generation,
                reply: wrap(value),
            });
        })
    }
}


// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
