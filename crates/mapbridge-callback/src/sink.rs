//! Gate, parse and forward
//!
//! Both the socket listener and the polling loop end here: the sequence
//! number passes the gate, every body is parsed, and the parsed callbacks go
//! to the single consumer.

use crate::callback::MapCallback;
use crate::gate::SequenceGate;
use crate::metrics::ChannelMetrics;
use flume::Sender;
use mapbridge_core::error::ChannelError;
use std::sync::Arc;
use tracing::{debug, trace};

/// Outcome of delivering one numbered request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sequence accepted; the number of callbacks forwarded
    Dispatched(usize),
    /// Sequence was not newer than the last accepted one
    Stale,
}

/// Shared tail of the listener and the polling loop.
#[derive(Clone)]
pub struct CallbackSink {
    gate: Arc<SequenceGate>,
    metrics: Arc<ChannelMetrics>,
    sender: Sender<MapCallback>,
}

impl CallbackSink {
    pub fn new(gate: Arc<SequenceGate>, metrics: Arc<ChannelMetrics>, sender: Sender<MapCallback>) -> Self {
        Self { gate, metrics, sender }
    }

    /// Gates `sequence` and forwards every parsable body.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ConsumerGone`] once the receiving side has
    /// been dropped.
    pub fn deliver<'a, I>(&self, sequence: u64, bodies: I) -> Result<Delivery, ChannelError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if !self.gate.accept(sequence) {
            self.metrics.record_stale();
            debug!(sequence, "Discarding stale callback");
            return Ok(Delivery::Stale);
        }

        let mut dispatched = 0;
        for body in bodies {
            match MapCallback::parse(body) {
                Some(callback) => {
                    trace!(sequence, kind = callback.kind(), "Dispatching callback");
                    self.sender.send(callback).map_err(|_| ChannelError::ConsumerGone)?;
                    self.metrics.record_dispatched();
                    dispatched += 1;
                }
                None => {
                    self.metrics.record_malformed();
                    debug!(sequence, body, "Ignoring malformed callback");
                }
            }
        }
        Ok(Delivery::Dispatched(dispatched))
    }

    pub fn gate(&self) -> &SequenceGate {
        &self.gate
    }

    pub fn metrics(&self) -> &ChannelMetrics {
        &self.metrics
    }
}
