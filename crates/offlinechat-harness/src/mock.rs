//! Mock transport for deterministic session testing
//!
//! [`MockTransport`] implements both halves of the transport seam on one
//! shared handle. Clone it once for the adapter and once for the notification
//! source, keep a third clone in the test to drive it.
//!
//! In the default mode every callback is parked until the test completes it,
//! which makes late, reordered and post-stop replies easy to produce. In
//! auto-reply mode each command completes immediately with scripted values.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use offlinechat_core::{
    AdapterCapabilities, ConnectionInfo, GroupInfo, NotificationHandler, NotificationSource, Peer,
    RawNotification, ReplyCallback, SubscriptionHandle, TransportAdapter, TransportError,
};
use tracing::trace;

type Completion = ReplyCallback<Result<(), TransportError>>;

// ----------------------------------------------------------------------------
// Issued Commands
// ----------------------------------------------------------------------------

/// Record of one call made against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuedCommand {
    SetRadioEnabled(bool),
    RenameLocalDevice(String),
    StartDiscovery,
    StopDiscovery,
    RequestPeerList,
    RequestConnectionInfo,
    RequestGroupInfo,
    RequestGroupTeardown,
    Subscribe(SubscriptionHandle),
    Unsubscribe(SubscriptionHandle),
}

// ----------------------------------------------------------------------------
// Mock Transport
// ----------------------------------------------------------------------------

/// Scriptable radio layer shared between the session and the test
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    capabilities: AdapterCapabilities,
    auto_reply: bool,

    // Values used in auto-reply mode
    peers: Vec<Peer>,
    connection_info: ConnectionInfo,
    group_info: Option<GroupInfo>,
    rename_result: Option<TransportError>,
    discovery_result: Option<TransportError>,

    commands: Vec<IssuedCommand>,

    // Parked callbacks, oldest first
    renames: VecDeque<Completion>,
    discovery_starts: VecDeque<Completion>,
    discovery_stops: VecDeque<Completion>,
    teardowns: VecDeque<Completion>,
    peer_lists: VecDeque<ReplyCallback<Vec<Peer>>>,
    connection_infos: VecDeque<ReplyCallback<ConnectionInfo>>,
    group_infos: VecDeque<ReplyCallback<Option<GroupInfo>>>,

    subscribers: Vec<(SubscriptionHandle, NotificationHandler)>,
    next_subscription: u64,
}

fn outcome(error: &Option<TransportError>) -> Result<(), TransportError> {
    match error {
        Some(err) => Err(err.clone()),
        None => Ok(()),
    }
}

impl MockTransport {
    /// Create a mock that parks every callback
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that completes every command immediately
    pub fn auto_reply() -> Self {
        let mock = Self::default();
        mock.lock().auto_reply = true;
        mock
    }

    pub fn with_capabilities(self, capabilities: AdapterCapabilities) -> Self {
        self.lock().capabilities = capabilities;
        self
    }

    /// Peer list returned in auto-reply mode
    pub fn with_peers(self, peers: Vec<Peer>) -> Self {
        self.set_peers(peers);
        self
    }

    /// Connection info returned in auto-reply mode
    pub fn with_connection_info(self, info: ConnectionInfo) -> Self {
        self.set_connection_info(info);
        self
    }

    /// Group info returned in auto-reply mode
    pub fn with_group_info(self, group: Option<GroupInfo>) -> Self {
        self.lock().group_info = group;
        self
    }

    /// Make rename fail in auto-reply mode
    pub fn with_rename_error(self, err: TransportError) -> Self {
        self.lock().rename_result = Some(err);
        self
    }

    /// Make discovery start fail in auto-reply mode
    pub fn with_discovery_error(self, err: TransportError) -> Self {
        self.lock().discovery_result = Some(err);
        self
    }

    pub fn set_peers(&self, peers: Vec<Peer>) {
        self.lock().peers = peers;
    }

    pub fn set_connection_info(&self, info: ConnectionInfo) {
        self.lock().connection_info = info;
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// Every command issued so far, in order
    pub fn commands(&self) -> Vec<IssuedCommand> {
        self.lock().commands.clone()
    }

    /// How many issued commands match `predicate`
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&IssuedCommand) -> bool,
    {
        self.lock().commands.iter().filter(|c| predicate(c)).count()
    }

    pub fn count_of(&self, command: &IssuedCommand) -> usize {
        self.count(|c| c == command)
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn pending_peer_lists(&self) -> usize {
        self.lock().peer_lists.len()
    }

    pub fn pending_connection_infos(&self) -> usize {
        self.lock().connection_infos.len()
    }

    // ------------------------------------------------------------------------
    // Completing parked callbacks
    // ------------------------------------------------------------------------

    /// Complete the oldest rename; false if none is parked
    pub fn complete_rename(&self, result: Result<(), TransportError>) -> bool {
        let callback = self.lock().renames.pop_front();
        finish(callback, result)
    }

    pub fn complete_start_discovery(&self, result: Result<(), TransportError>) -> bool {
        let callback = self.lock().discovery_starts.pop_front();
        finish(callback, result)
    }

    pub fn complete_stop_discovery(&self, result: Result<(), TransportError>) -> bool {
        let callback = self.lock().discovery_stops.pop_front();
        finish(callback, result)
    }

    pub fn complete_teardown(&self, result: Result<(), TransportError>) -> bool {
        let callback = self.lock().teardowns.pop_front();
        finish(callback, result)
    }

    pub fn reply_peer_list(&self, peers: Vec<Peer>) -> bool {
        let callback = self.lock().peer_lists.pop_front();
        finish(callback, peers)
    }

    pub fn reply_connection_info(&self, info: ConnectionInfo) -> bool {
        let callback = self.lock().connection_infos.pop_front();
        finish(callback, info)
    }

    /// Complete the most recent connection-info request first
    pub fn reply_newest_connection_info(&self, info: ConnectionInfo) -> bool {
        let callback = self.lock().connection_infos.pop_back();
        finish(callback, info)
    }

    pub fn reply_group_info(&self, group: Option<GroupInfo>) -> bool {
        let callback = self.lock().group_infos.pop_front();
        finish(callback, group)
    }

    // ------------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------------

    /// Deliver a raw notification to every subscriber, returning how many got it
    pub fn emit(&self, notification: RawNotification) -> usize {
        let handlers: Vec<NotificationHandler> = self
            .lock()
            .subscribers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        trace!("Emitting {:?} to {} subscribers", notification.action, handlers.len());
        for handler in &handlers {
            handler(notification.clone());
        }
        handlers.len()
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record `command`, then either complete `done` with the scripted value or park it
    fn dispatch<T>(
        &self,
        command: IssuedCommand,
        done: ReplyCallback<T>,
        scripted: fn(&MockState) -> T,
        queue: fn(&mut MockState) -> &mut VecDeque<ReplyCallback<T>>,
    ) {
        let mut state = self.lock();
        state.commands.push(command);
        if state.auto_reply {
            let value = scripted(&*state);
            drop(state);
            done(value);
        } else {
            queue(&mut *state).push_back(done);
        }
    }
}

fn finish<T>(callback: Option<ReplyCallback<T>>, value: T) -> bool {
    match callback {
        Some(callback) => {
            callback(value);
            true
        }
        None => false,
    }
}

impl TransportAdapter for MockTransport {
    fn capabilities(&self) -> AdapterCapabilities {
        self.lock().capabilities
    }

    fn set_radio_enabled(&mut self, enabled: bool) {
        self.lock().commands.push(IssuedCommand::SetRadioEnabled(enabled));
    }

    fn rename_local_device(&mut self, name: &str, done: Completion) {
        self.dispatch(
            IssuedCommand::RenameLocalDevice(name.to_string()),
            done,
            |s| outcome(&s.rename_result),
            |s| &mut s.renames,
        );
    }

    fn start_discovery(&mut self, done: Completion) {
        self.dispatch(
            IssuedCommand::StartDiscovery,
            done,
            |s| outcome(&s.discovery_result),
            |s| &mut s.discovery_starts,
        );
    }

    fn stop_discovery(&mut self, done: Completion) {
        self.dispatch(
            IssuedCommand::StopDiscovery,
            done,
            |_| Ok(()),
            |s| &mut s.discovery_stops,
        );
    }

    fn request_peer_list(&mut self, done: ReplyCallback<Vec<Peer>>) {
        self.dispatch(
            IssuedCommand::RequestPeerList,
            done,
            |s| s.peers.clone(),
            |s| &mut s.peer_lists,
        );
    }

    fn request_connection_info(&mut self, done: ReplyCallback<ConnectionInfo>) {
        self.dispatch(
            IssuedCommand::RequestConnectionInfo,
            done,
            |s| s.connection_info.clone(),
            |s| &mut s.connection_infos,
        );
    }

    fn request_group_info(&mut self, done: ReplyCallback<Option<GroupInfo>>) {
        self.dispatch(
            IssuedCommand::RequestGroupInfo,
            done,
            |s| s.group_info.clone(),
            |s| &mut s.group_infos,
        );
    }

    fn request_group_teardown(&mut self, done: Completion) {
        self.dispatch(
            IssuedCommand::RequestGroupTeardown,
            done,
            |_| Ok(()),
            |s| &mut s.teardowns,
        );
    }
}

impl NotificationSource for MockTransport {
    fn subscribe(&mut self, handler: NotificationHandler) -> SubscriptionHandle {
        let mut state = self.lock();
        state.next_subscription += 1;
        let handle = SubscriptionHandle::new(state.next_subscription);
        state.subscribers.push((handle, handler));
        state.commands.push(IssuedCommand::Subscribe(handle));
        handle
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle) {
        let mut state = self.lock();
        state.subscribers.retain(|(existing, _)| *existing != handle);
        state.commands.push(IssuedCommand::Unsubscribe(handle));
    }
}
