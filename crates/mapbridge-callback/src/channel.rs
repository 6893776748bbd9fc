//! Callback channel lifecycle
//!
//! Owns the listener, the optional polling loop and the startup probe that
//! decides between them.
//!
//! ```text
//!   Stopped ──start()──► Listening ──probe timeout, nothing received──► Polling
//!      ▲                     │                                            │
//!      └────────────────shutdown()────────────────────────────────────────┘
//! ```

use crate::callback::MapCallback;
use crate::gate::SequenceGate;
use crate::listener::{bind, spawn_accept_loop};
use crate::metrics::{ChannelMetrics, ChannelStats};
use crate::poller::spawn_poll_loop;
use crate::sink::CallbackSink;
use mapbridge_core::config::CallbackConfig;
use mapbridge_core::engine::MapEngine;
use mapbridge_core::error::{ChannelError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Where callbacks currently come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Not started or shut down
    Stopped,
    /// Socket listener accepting requests
    Listening,
    /// Listener unused by the browser; callbacks are polled
    Polling,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Stopped => write!(f, "stopped"),
            ChannelState::Listening => write!(f, "listening"),
            ChannelState::Polling => write!(f, "polling"),
        }
    }
}

/// Scripts the startup probe runs in the browser.
#[derive(Debug, Clone)]
pub struct ProbeScripts {
    /// Asks the browser to send a callback to the listener
    pub check_listener: String,
    /// Switches the browser to buffering callbacks for polling
    pub enable_polling: String,
}

/// Inbound callback channel from the browser map.
pub struct CallbackChannel {
    config: CallbackConfig,
    sink: CallbackSink,
    metrics: Arc<ChannelMetrics>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    state: Arc<Mutex<ChannelState>>,
    port: Mutex<Option<u16>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    workers: TaskTracker,
}

impl CallbackChannel {
    /// Creates a channel forwarding parsed callbacks to `sender`.
    pub fn new(config: CallbackConfig, sender: flume::Sender<MapCallback>) -> Self {
        let metrics = Arc::new(ChannelMetrics::new());
        let sink = CallbackSink::new(Arc::new(SequenceGate::new()), Arc::clone(&metrics), sender);
        Self {
            config,
            sink,
            metrics,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            state: Arc::new(Mutex::new(ChannelState::Stopped)),
            port: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            workers: TaskTracker::new(),
        }
    }

    /// Binds the listener and starts accepting callbacks.
    ///
    /// Returns the bound port, which the browser must address as
    /// `127.0.0.1:<port>`.
    ///
    /// # Errors
    ///
    /// Fails if the channel is already running or the socket cannot be bound.
    pub async fn start(&self) -> Result<u16> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(ChannelError::AlreadyRunning.into());
        }

        let (listener, port) = match bind(&self.config).await {
            Ok(bound) => bound,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                return Err(e.into());
            }
        };

        info!(host = %self.config.host, port, "Callback listener bound");

        let handle = spawn_accept_loop(
            listener,
            port,
            &self.config,
            self.sink.clone(),
            Arc::clone(&self.metrics),
            Arc::clone(&self.running),
            Arc::clone(&self.shutdown),
            self.workers.clone(),
        );
        self.tasks.lock().push(handle);
        *self.port.lock() = Some(port);
        *self.state.lock() = ChannelState::Listening;
        Ok(port)
    }

    /// Runs the startup probe: asks the browser to call back and, if
    /// nothing arrives within the probe timeout, switches to polling.
    pub fn probe(&self, engine: Arc<dyn MapEngine>, scripts: ProbeScripts) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        let config = self.config.clone();
        let sink = self.sink.clone();
        let running = Arc::clone(&self.running);
        let shutdown = Arc::clone(&self.shutdown);
        let state = Arc::clone(&self.state);

        let handle = tokio::spawn(async move {
            if let Err(e) = engine.execute_script(&scripts.check_listener) {
                warn!(error = %e, "Callback listener probe failed");
            }

            tokio::select! {
                _ = shutdown.notified() => return,
                _ = tokio::time::sleep(config.probe_timeout()) => {}
            }

            if !running.load(Ordering::Acquire) || sink.gate().last_accepted().is_some() {
                return;
            }
            if !config.polling_fallback {
                warn!(
                    timeout_ms = config.probe_timeout_ms,
                    "No callback received and polling fallback disabled"
                );
                return;
            }

            info!(timeout_ms = config.probe_timeout_ms, "No callback received, entering polling mode");
            if let Err(e) = engine.execute_script(&scripts.enable_polling) {
                warn!(error = %e, "Enabling browser-side polling failed");
            }
            *state.lock() = ChannelState::Polling;

            let poll = spawn_poll_loop(
                engine,
                config.poll_script.clone(),
                config.poll_interval(),
                sink,
                Arc::clone(&running),
                shutdown,
            );
            // the poll loop ends on its own once `running` is cleared
            if poll.await.is_err() {
                warn!("Callback polling loop panicked");
            }
        });
        self.tasks.lock().push(handle);
    }

    /// Stops the listener and the polling loop, waiting at most `timeout`
    /// for each task.
    pub async fn shutdown(&self, timeout: Duration) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.shutdown.notify_waiters();

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let abort = task.abort_handle();
            if tokio::time::timeout(timeout, task).await.is_err() {
                warn!(timeout_ms = timeout.as_millis() as u64, "Callback task did not stop in time");
                abort.abort();
            }
        }

        // connection workers still answering; they no longer dispatch
        self.workers.close();
        if tokio::time::timeout(timeout, self.workers.wait()).await.is_err() {
            warn!(
                pending = self.workers.len(),
                timeout_ms = timeout.as_millis() as u64,
                "Callback connections did not finish in time"
            );
        }

        *self.state.lock() = ChannelState::Stopped;
        *self.port.lock() = None;
        info!("Callback channel stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    /// Bound listener port while running.
    pub fn port(&self) -> Option<u16> {
        *self.port.lock()
    }

    /// Last sequence number let through by the gate.
    pub fn last_sequence(&self) -> Option<u64> {
        self.sink.gate().last_accepted()
    }

    pub fn stats(&self) -> ChannelStats {
        self.metrics.stats()
    }
}
