//! # mapbridge callback
//!
//! Inbound channel from the browser map. The browser reports user
//! interaction as numbered requests against a loopback listener, or, where
//! the browser refuses loopback requests, through a polled buffer.
//!
//! ```text
//! request line ──► Host check ──► sequence gate ──► MapCallback::parse ──► consumer
//! polled buffer ─────────────────────┘
//! ```
//!
//! Out-of-order and duplicate requests are dropped by the gate; bodies that
//! do not parse are counted and ignored. The channel never touches the model:
//! callbacks go to a single `flume` consumer.

pub mod callback;
pub mod channel;
pub mod gate;
pub mod listener;
pub mod metrics;
pub mod poller;
pub mod protocol;
pub mod sink;

pub use callback::{BrowserCoordinate, MapCallback};
pub use channel::{CallbackChannel, ChannelState, ProbeScripts};
pub use gate::SequenceGate;
pub use metrics::ChannelStats;
