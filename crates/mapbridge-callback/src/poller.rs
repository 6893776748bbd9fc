//! Polling fallback
//!
//! Some embedded browsers refuse requests to the loopback listener. The
//! browser then buffers its callbacks and the polling loop fetches them by
//! evaluating a script at a fixed interval.

use crate::protocol::parse_poll_buffer;
use crate::sink::CallbackSink;
use mapbridge_core::engine::MapEngine;
use mapbridge_core::error::ChannelError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Fetches one buffer from the browser and delivers its callbacks.
///
/// Returns the number of entries found in the buffer.
pub fn poll_once(engine: &dyn MapEngine, script: &str, sink: &CallbackSink) -> Result<usize, ChannelError> {
    sink.metrics().record_poll();
    let buffer = match engine.evaluate_script(script) {
        Ok(Some(buffer)) => buffer,
        Ok(None) => return Ok(0),
        Err(e) => {
            debug!(error = %e, "Polling callbacks failed");
            return Ok(0);
        }
    };

    let entries = parse_poll_buffer(&buffer);
    for (sequence, body) in &entries {
        sink.deliver(*sequence, [body.as_str()])?;
    }
    Ok(entries.len())
}

/// Spawns the polling loop.
pub fn spawn_poll_loop(
    engine: Arc<dyn MapEngine>,
    script: String,
    interval: Duration,
    sink: CallbackSink,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Callback polling loop started");

        while running.load(Ordering::Acquire) {
            match poll_once(engine.as_ref(), &script, &sink) {
                Ok(0) => {}
                Ok(count) => debug!(count, "Polled callbacks"),
                Err(e) => {
                    warn!(error = %e, "Stopping callback polling");
                    break;
                }
            }

            tokio::select! {
                _ = shutdown.notified() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Callback polling loop stopped");
    })
}
