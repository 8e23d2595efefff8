//! Scenario tests for the session state machine and notification dispatcher
//!
//! Raw notifications are emitted through the mock transport, classified by
//! the dispatcher and applied by pumping the session inbox, so every step
//! runs deterministically on the test thread.

use std::net::{IpAddr, Ipv4Addr};

use offlinechat_core::{AdapterCapabilities, GroupInfo};
use offlinechat_harness::{IssuedCommand, MockTransport};
use offlinechat_runtime::{
    ConnectionInfo, NotificationDispatcher, Peer, PeerAddress, PeerRegistry, RawNotification,
    SessionConfig, SessionState, SessionStateMachine, TransportError,
};
use proptest::prelude::*;

struct Scenario {
    mock: MockTransport,
    machine: SessionStateMachine<MockTransport>,
    dispatcher: NotificationDispatcher<MockTransport>,
}

impl Scenario {
    fn new(mock: MockTransport) -> Self {
        Self::with_config(mock, SessionConfig::default())
    }

    fn with_config(mock: MockTransport, config: SessionConfig) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let machine = SessionStateMachine::new(mock.clone(), PeerRegistry::new(), config.clone());
        let dispatcher =
            NotificationDispatcher::new(mock.clone(), machine.inbox(), config.resync_on_resume);
        Self {
            mock,
            machine,
            dispatcher,
        }
    }

    /// Emit a raw notification and apply whatever it produced
    fn emit(&mut self, raw: RawNotification) -> usize {
        self.mock.emit(raw);
        self.machine.pump()
    }
}

fn create_test_peer(last: u8, name: &str) -> Peer {
    Peer::available(PeerAddress::new([0x02, 0, 0, 0, 0, last]), name)
}

fn group_at(last: u8) -> GroupInfo {
    GroupInfo::with_endpoint(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)))
}

fn without_resync() -> SessionConfig {
    SessionConfig::default().with_resync_on_resume(false)
}

#[test]
fn test_radio_on_then_peers_discovered() {
    let mut scenario = Scenario::with_config(MockTransport::new(), without_resync());
    scenario.dispatcher.resume();
    assert_eq!(scenario.machine.current_state(), SessionState::RadioDisabled);

    scenario.emit(RawNotification::radio_state(true));
    assert_eq!(scenario.machine.current_state(), SessionState::RadioEnabled);

    scenario.emit(RawNotification::peers_changed());
    assert_eq!(scenario.machine.current_state(), SessionState::Discovering);

    let a = create_test_peer(1, "A");
    let b = create_test_peer(2, "B");
    assert!(scenario.mock.reply_peer_list(vec![a.clone(), b.clone()]));
    scenario.machine.pump();

    assert_eq!(&*scenario.machine.peer_snapshot(), &[a, b]);
}

#[test]
fn test_connection_changed_then_group_formed() {
    let mut scenario = Scenario::new(MockTransport::new());
    scenario.dispatcher.resume();
    scenario.machine.start("alice");
    scenario.machine.pump();

    scenario.emit(RawNotification::connection_changed());
    assert_eq!(scenario.machine.current_state(), SessionState::Connecting);

    scenario
        .mock
        .reply_connection_info(ConnectionInfo::formed(group_at(1)));
    scenario.machine.pump();

    let state = scenario.machine.current_state();
    assert!(state.is_connected());
    assert_eq!(
        state.group().and_then(|group| group.endpoint),
        Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)))
    );
}

#[test]
fn test_notification_burst_never_repeats_start_commands() {
    let mut scenario = Scenario::with_config(MockTransport::new(), without_resync());
    scenario.dispatcher.resume();
    scenario.machine.start("alice");

    for _ in 0..25 {
        scenario.emit(RawNotification::peers_changed());
        scenario.emit(RawNotification::connection_changed());
        scenario.emit(RawNotification::radio_state(true));
    }

    let mock = &scenario.mock;
    assert_eq!(mock.count(|c| matches!(c, IssuedCommand::RenameLocalDevice(_))), 1);
    assert_eq!(mock.count_of(&IssuedCommand::StartDiscovery), 1);
    assert_eq!(mock.count_of(&IssuedCommand::RequestPeerList), 25);
    assert_eq!(mock.count_of(&IssuedCommand::RequestConnectionInfo), 25);
}

#[test]
fn test_connection_info_after_stop_is_ignored() {
    let mut scenario = Scenario::new(MockTransport::new());
    scenario.dispatcher.resume();
    scenario.machine.start("alice");
    scenario.emit(RawNotification::connection_changed());

    scenario.machine.stop();
    let stopped = scenario.machine.current_state();

    scenario
        .mock
        .reply_connection_info(ConnectionInfo::formed(group_at(1)));
    scenario.machine.pump();

    assert_eq!(scenario.machine.current_state(), stopped);
    assert_eq!(stopped, SessionState::Disconnected);
    assert_eq!(scenario.machine.stats().stale_replies_discarded, 1);
}

#[test]
fn test_unsupported_rename_still_discovers() {
    let mock = MockTransport::auto_reply()
        .with_rename_error(TransportError::unsupported("rename_local_device"))
        .with_peers(vec![create_test_peer(3, "C")]);
    let mut scenario = Scenario::new(mock);
    scenario.dispatcher.resume();

    scenario.machine.start("alice");
    scenario.machine.pump();
    assert_eq!(scenario.mock.count_of(&IssuedCommand::StartDiscovery), 1);
    assert_eq!(scenario.machine.stats().unsupported_operations, 1);

    scenario.emit(RawNotification::peers_changed());
    scenario.machine.pump();
    assert_eq!(scenario.machine.peer_snapshot().len(), 1);
}

#[test]
fn test_discovery_failure_is_retried_by_start() {
    let mock = MockTransport::auto_reply()
        .with_discovery_error(TransportError::failure("start_discovery", 2));
    let mut scenario = Scenario::new(mock);
    scenario.dispatcher.resume();
    scenario.emit(RawNotification::radio_state(true));

    scenario.machine.start("alice");
    scenario.machine.pump();
    assert_eq!(scenario.machine.stats().transport_failures, 1);
    assert_eq!(scenario.machine.current_state(), SessionState::RadioEnabled);

    scenario.machine.start("alice");
    scenario.machine.pump();
    assert_eq!(scenario.mock.count_of(&IssuedCommand::StartDiscovery), 2);
    assert_eq!(scenario.machine.stats().transport_failures, 2);
}

#[test]
fn test_adapter_without_rename_capability() {
    let mock = MockTransport::auto_reply().with_capabilities(AdapterCapabilities {
        rename_local_device: false,
    });
    let mut scenario = Scenario::new(mock);

    scenario.machine.start("alice");
    scenario.machine.pump();

    assert_eq!(
        scenario.mock.commands(),
        vec![IssuedCommand::RequestGroupInfo, IssuedCommand::StartDiscovery]
    );
}

#[test]
fn test_unknown_action_is_dropped() {
    let mut scenario = Scenario::new(MockTransport::new());
    scenario.dispatcher.resume();
    scenario.machine.start("alice");
    scenario.machine.pump();

    let handled = scenario.emit(RawNotification::new("wifi_p2p.DISCOVERY_STATE_CHANGE"));

    assert_eq!(handled, 0);
    assert_eq!(scenario.machine.stats().notifications_processed, 0);
}

#[test]
fn test_resume_subscribes_once_and_resyncs() {
    let mut scenario = Scenario::new(MockTransport::new());
    scenario.machine.start("alice");

    assert!(scenario.dispatcher.resume());
    assert!(!scenario.dispatcher.resume());
    assert!(scenario.dispatcher.is_subscribed());
    assert_eq!(scenario.mock.subscriber_count(), 1);

    scenario.machine.pump();
    assert_eq!(scenario.mock.count_of(&IssuedCommand::RequestPeerList), 1);

    assert!(scenario.dispatcher.pause());
    assert!(!scenario.dispatcher.pause());
    assert!(!scenario.dispatcher.is_subscribed());
    assert_eq!(scenario.mock.subscriber_count(), 0);
    assert_eq!(scenario.mock.emit(RawNotification::peers_changed()), 0);
}

#[test]
fn test_dropping_dispatcher_unsubscribes() {
    let mock = MockTransport::new();
    let scenario = Scenario::new(mock.clone());
    let Scenario {
        machine,
        mut dispatcher,
        ..
    } = scenario;
    dispatcher.resume();
    assert_eq!(mock.subscriber_count(), 1);

    drop(dispatcher);
    drop(machine);
    assert_eq!(mock.subscriber_count(), 0);
}

#[test]
fn test_stale_group_from_previous_session_is_removed() {
    let mock = MockTransport::auto_reply().with_group_info(Some(group_at(49)));
    let mut scenario = Scenario::new(mock);

    scenario.machine.start("alice");
    scenario.machine.pump();

    assert_eq!(scenario.mock.count_of(&IssuedCommand::RequestGroupTeardown), 1);
    assert_eq!(scenario.machine.current_state(), SessionState::RadioDisabled);
}

#[test]
fn test_local_device_notification() {
    let mut scenario = Scenario::new(MockTransport::new());
    scenario.dispatcher.resume();
    let me = create_test_peer(9, "alice");

    scenario.emit(RawNotification::this_device_changed(Some(me.clone())));

    assert_eq!(scenario.machine.local_device(), Some(&me));
}

// ----------------------------------------------------------------------------
// Properties
// ----------------------------------------------------------------------------

fn peer_pool() -> Vec<Peer> {
    (1..=8).map(|i| create_test_peer(i, &format!("peer-{i}"))).collect()
}

proptest! {
    #[test]
    fn registry_tracks_last_pulled_list(
        lists in prop::collection::vec(prop::sample::subsequence(peer_pool(), 0..=8), 1..6)
    ) {
        let mut scenario = Scenario::with_config(MockTransport::new(), without_resync());
        scenario.dispatcher.resume();
        scenario.machine.start("alice");

        for list in &lists {
            scenario.emit(RawNotification::peers_changed());
            prop_assert!(scenario.mock.reply_peer_list(list.clone()));
            scenario.machine.pump();
        }

        let last = lists.last().cloned().unwrap_or_default();
        prop_assert_eq!(scenario.machine.peer_snapshot().to_vec(), last);
    }
}
