//! Loopback callback listener
//!
//! # Architecture
//!
//! ```text
//!              browser (XMLHttpRequest / image pings)
//!                            │
//!                  ┌─────────▼──────────┐
//!                  │ 127.0.0.1:<port>   │
//!                  │  - timed accept    │
//!                  │  - connection limit│
//!                  └─────────┬──────────┘
//!             ┌──────────────┼──────────────┐
//!        ┌────▼────┐    ┌────▼────┐    ┌────▼────┐
//!        │ worker  │    │ worker  │    │ worker  │  ← read request, check Host
//!        └────┬────┘    └────┬────┘    └────┬────┘
//!             └──────────────┼──────────────┘
//!                            ▼
//!                      CallbackSink  (gate → parse → consumer)
//! ```

use crate::metrics::ChannelMetrics;
use crate::protocol::{complete_request_length, CallbackRequest, FORBIDDEN_RESPONSE, OK_RESPONSE};
use crate::sink::{CallbackSink, Delivery};
use mapbridge_core::config::CallbackConfig;
use mapbridge_core::error::ChannelError;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Initial buffer capacity for reading a request
const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Binds the listener socket.
///
/// # Errors
///
/// Returns [`ChannelError::BindFailed`] if the address is unusable.
pub async fn bind(config: &CallbackConfig) -> Result<(TcpListener, u16), ChannelError> {
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| ChannelError::bind_failed(&address, e.to_string()))?;
    let port = listener
        .local_addr()
        .map_err(|e| ChannelError::bind_failed(&address, e.to_string()))?
        .port();
    Ok((listener, port))
}

/// Settings each connection worker needs.
#[derive(Debug, Clone, Copy)]
struct ConnectionLimits {
    port: u16,
    read_timeout: Duration,
    max_request_bytes: usize,
}

/// Spawns the accept loop on an already bound listener.
///
/// The loop waits at most `accept_timeout` per accept so the `running` flag
/// is rechecked regularly, and exits immediately when `shutdown` fires.
/// Connection workers are spawned on `workers` so the owner can join them.
#[allow(clippy::too_many_arguments)]
pub fn spawn_accept_loop(
    listener: TcpListener,
    port: u16,
    config: &CallbackConfig,
    sink: CallbackSink,
    metrics: Arc<ChannelMetrics>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    workers: TaskTracker,
) -> JoinHandle<()> {
    let accept_timeout = config.accept_timeout();
    let max_connections = config.max_connections as u64;
    let limits = ConnectionLimits {
        port,
        read_timeout: config.read_timeout(),
        max_request_bytes: config.max_request_bytes,
    };

    tokio::spawn(async move {
        info!(port, "Callback accept loop started");

        while running.load(Ordering::Acquire) {
            let accepted = tokio::select! {
                _ = shutdown.notified() => break,
                accepted = tokio::time::timeout(accept_timeout, listener.accept()) => accepted,
            };

            match accepted {
                // timed out, recheck the running flag
                Err(_) => continue,
                Ok(Ok((stream, remote_addr))) => {
                    let active = metrics.active_connections();
                    if active >= max_connections {
                        warn!(
                            remote_addr = %remote_addr,
                            current = active,
                            max = max_connections,
                            "Connection limit reached, rejecting"
                        );
                        metrics.record_rejected();
                        drop(stream);
                        continue;
                    }

                    metrics.record_accepted();
                    debug!(remote_addr = %remote_addr, active = active + 1, "Accepted callback connection");

                    let sink = sink.clone();
                    let metrics = Arc::clone(&metrics);
                    let running = Arc::clone(&running);
                    workers.spawn(async move {
                        if let Err(e) = handle_connection(stream, remote_addr, limits, &sink, &running).await {
                            debug!(remote_addr = %remote_addr, error = %e, "Callback connection error");
                        }
                        metrics.record_closed();
                    });
                }
                Ok(Err(e)) => {
                    if running.load(Ordering::Acquire) {
                        error!(port, error = %e, "Accept error");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        }

        info!(port, "Callback accept loop stopped");
    })
}

/// Reads one request, answers it and forwards its callbacks.
async fn handle_connection(
    mut stream: TcpStream,
    remote_addr: SocketAddr,
    limits: ConnectionLimits,
    sink: &CallbackSink,
    running: &AtomicBool,
) -> std::io::Result<()> {
    let Some(raw) = read_request(&mut stream, limits).await? else {
        debug!(remote_addr = %remote_addr, "Connection closed before a complete request");
        return Ok(());
    };

    let text = String::from_utf8_lossy(&raw);
    let response = match CallbackRequest::parse(&text) {
        None => {
            sink.metrics().record_malformed();
            debug!(remote_addr = %remote_addr, "Ignoring request that is not a callback");
            OK_RESPONSE
        }
        Some(request) if !request.is_addressed_to(limits.port) => {
            sink.metrics().record_forbidden();
            warn!(
                remote_addr = %remote_addr,
                host = request.host.as_deref().unwrap_or("<none>"),
                "Rejecting callback for foreign host"
            );
            FORBIDDEN_RESPONSE
        }
        Some(request) if !running.load(Ordering::Acquire) => {
            debug!(sequence = request.sequence, "Channel stopped, dropping callback");
            OK_RESPONSE
        }
        Some(request) => {
            match sink.deliver(request.sequence, request.bodies()) {
                Ok(Delivery::Dispatched(count)) => {
                    debug!(sequence = request.sequence, count, "Callback request processed");
                }
                Ok(Delivery::Stale) => {}
                Err(e) => warn!(sequence = request.sequence, error = %e, "Dropping callback"),
            }
            OK_RESPONSE
        }
    };

    stream.write_all(response).await?;
    stream.flush().await?;
    stream.shutdown().await
}

/// Buffers until the request head and its declared body are complete.
///
/// Returns `None` when the peer closes early, times out or exceeds the size
/// limit.
async fn read_request(stream: &mut TcpStream, limits: ConnectionLimits) -> std::io::Result<Option<Vec<u8>>> {
    let mut buffer = Vec::with_capacity(INITIAL_BUFFER_CAPACITY);
    let mut chunk = [0u8; INITIAL_BUFFER_CAPACITY];

    loop {
        if let Some(length) = complete_request_length(&buffer) {
            buffer.truncate(length);
            return Ok(Some(buffer));
        }
        if buffer.len() > limits.max_request_bytes {
            return Ok(None);
        }

        let read = match tokio::time::timeout(limits.read_timeout, stream.read(&mut chunk)).await {
            Ok(read) => read?,
            Err(_) => return Ok(None),
        };
        if read == 0 {
            return Ok(None);
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
}
