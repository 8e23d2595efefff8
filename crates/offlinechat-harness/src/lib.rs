#![doc = "OfflineChat Harness\n\nTest support for the session runtime: a mock radio layer that records\nevery command and lets tests decide when, and with what, each callback\ncompletes."]

#[cfg(feature = "testing")]
pub mod mock;

#[cfg(feature = "testing")]
pub use mock::{IssuedCommand, MockTransport};
