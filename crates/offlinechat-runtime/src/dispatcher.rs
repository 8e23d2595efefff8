//! Notification Dispatcher
//!
//! Bridges the platform's broadcast channel to the session. While the app is
//! in the foreground exactly one subscription is registered; every raw
//! notification is classified into a [`TransportEvent`] and posted onto the
//! session inbox. Unrecognized actions are dropped.

use std::sync::Arc;

use offlinechat_core::transport::actions;
use offlinechat_core::{
    NotificationSource, RawNotification, SubscriptionHandle, TransportEvent,
};
use tracing::{debug, info, trace};

use crate::channels::{SessionInbox, SessionInput};

// ----------------------------------------------------------------------------
// Dispatcher
// ----------------------------------------------------------------------------

/// Owns the notification subscription for one session
pub struct NotificationDispatcher<S: NotificationSource> {
    source: S,
    inbox: SessionInbox,
    subscription: Option<SubscriptionHandle>,
    resync_on_resume: bool,
}

impl<S: NotificationSource> NotificationDispatcher<S> {
    /// Create a dispatcher that is not yet subscribed
    pub fn new(source: S, inbox: SessionInbox, resync_on_resume: bool) -> Self {
        Self {
            source,
            inbox,
            subscription: None,
            resync_on_resume,
        }
    }

    /// Register the subscription when the app enters the foreground
    ///
    /// Returns false if a subscription is already registered. After a fresh
    /// registration the session is asked to re-pull its peer list, so nothing
    /// seen before the gap is carried across it.
    pub fn resume(&mut self) -> bool {
        if self.subscription.is_some() {
            debug!("Notification subscription already registered");
            return false;
        }

        let inbox = self.inbox.clone();
        let handler = Arc::new(move |raw: RawNotification| match classify(&raw) {
            Some(event) => {
                inbox.post(SessionInput::Notification(event));
            }
            None => trace!("Ignoring unrecognized notification {:?}", raw.action),
        });

        let handle = self.source.subscribe(handler);
        info!("Subscribed to transport notifications (id {})", handle.id());
        self.subscription = Some(handle);

        if self.resync_on_resume {
            self.inbox.post(SessionInput::Resync);
        }
        true
    }

    /// Unregister the subscription when the app moves to the background
    ///
    /// Returns false if nothing was registered.
    pub fn pause(&mut self) -> bool {
        match self.subscription.take() {
            Some(handle) => {
                self.source.unsubscribe(handle);
                info!("Unsubscribed from transport notifications (id {})", handle.id());
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}

impl<S: NotificationSource> Drop for NotificationDispatcher<S> {
    fn drop(&mut self) {
        self.pause();
    }
}

// ----------------------------------------------------------------------------
// Classification
// ----------------------------------------------------------------------------

/// Map a raw platform notification to one of the four event kinds
///
/// A state-change notification without a state code reads as "not enabled".
pub fn classify(raw: &RawNotification) -> Option<TransportEvent> {
    match raw.action.as_str() {
        actions::STATE_CHANGED => Some(TransportEvent::RadioStateChanged {
            enabled: raw.state_code == Some(actions::RADIO_STATE_ENABLED),
        }),
        actions::PEERS_CHANGED => Some(TransportEvent::PeerListChanged),
        actions::CONNECTION_CHANGED => Some(TransportEvent::ConnectionChanged),
        actions::THIS_DEVICE_CHANGED => {
            Some(TransportEvent::LocalDeviceChanged(raw.device.clone()))
        }
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
