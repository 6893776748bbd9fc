//! Map view facade
//!
//! Wires the reducer, the bridge, the update loops, the callback channel and
//! the dispatcher together and exposes the notification entry points the UI
//! calls after changing the model.

use crate::bridge::ViewBridge;
use crate::command::MapCommand;
use crate::correction::CoordinateCorrector;
use crate::dirty::RenderSettings;
use crate::dispatch::CallbackDispatcher;
use crate::model::{MapEvent, ModelChange, RouteSource, ViewPreference};
use crate::scheduler::MapUpdateScheduler;
use crate::state::MapState;
use mapbridge_callback::{CallbackChannel, ChannelStats, MapCallback, ProbeScripts};
use mapbridge_core::config::AppConfig;
use mapbridge_core::engine::MapEngine;
use mapbridge_core::error::{MapError, Result};
use mapbridge_reduce::PositionReducer;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Browser map view.
pub struct MapView {
    config: AppConfig,
    engine: Arc<dyn MapEngine>,
    route: Arc<dyn RouteSource>,
    state: Arc<MapState>,
    reducer: Arc<PositionReducer>,
    bridge: Arc<ViewBridge>,
    scheduler: Arc<MapUpdateScheduler>,
    channel: CallbackChannel,
    events: flume::Sender<MapEvent>,
    callbacks: Mutex<Option<flume::Receiver<MapCallback>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl MapView {
    /// Creates a view rendering `route` into `engine` and reporting browser
    /// edits to `events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: AppConfig,
        engine: Arc<dyn MapEngine>,
        route: Arc<dyn RouteSource>,
        events: flume::Sender<MapEvent>,
    ) -> Result<Self> {
        config.validate()?;

        let state = Arc::new(MapState::new(config.view.initial_map_type.clone()));
        let reducer = Arc::new(PositionReducer::new(config.reducer.clone(), state.clone()));
        let bridge = Arc::new(ViewBridge::new(
            CoordinateCorrector::from_config(&config.view),
            Arc::clone(&state),
        ));
        let render = RenderSettings {
            route_color: config.view.route_color.clone(),
            track_width: config.view.track_width,
            show_waypoint_descriptions: config.view.show_waypoint_descriptions,
        };
        let scheduler = Arc::new(MapUpdateScheduler::new(
            config.scheduler.clone(),
            render,
            Arc::clone(&reducer),
            Arc::clone(&bridge),
            Arc::clone(&engine),
            Arc::clone(&route),
        ));

        let (callback_tx, callback_rx) = flume::unbounded();
        let channel = CallbackChannel::new(config.callback.clone(), callback_tx);

        Ok(Self {
            config,
            engine,
            route,
            state,
            reducer,
            bridge,
            scheduler,
            channel,
            events,
            callbacks: Mutex::new(Some(callback_rx)),
            dispatcher: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    /// Starts the callback listener, the dispatcher and the update loops.
    ///
    /// Returns the callback port.
    pub async fn start(&self) -> Result<u16> {
        let callbacks = self
            .callbacks
            .lock()
            .take()
            .ok_or_else(|| MapError::Internal("map view already started".to_string()))?;

        let port = self.channel.start().await?;

        let dispatcher = CallbackDispatcher::new(
            Arc::clone(&self.state),
            Arc::clone(&self.bridge),
            Arc::clone(&self.reducer),
            Arc::clone(&self.scheduler),
            Arc::clone(&self.route),
            self.events.clone(),
        );
        *self.dispatcher.lock() = Some(dispatcher.spawn(callbacks, self.cancel.clone()));

        self.scheduler.start();
        info!(port, "Map view started");
        Ok(port)
    }

    /// Waits for the map page to become scriptable, then probes the
    /// callback channel and requests the first render.
    ///
    /// Polls `is_initialized` up to `init_attempts` times, doubling the
    /// delay after each miss.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InitializationFailed`] after the last attempt.
    pub async fn initialize(&self) -> Result<()> {
        let attempts = self.config.view.init_attempts;
        let mut backoff = self.config.view.init_backoff();

        let mut initialized = false;
        for attempt in 1..=attempts {
            if self.engine.is_initialized() {
                initialized = true;
                break;
            }
            debug!(attempt, backoff_ms = backoff.as_millis() as u64, "Map not initialized yet");
            if attempt < attempts {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
        if !initialized {
            warn!(attempts, "Map did not initialize");
            return Err(MapError::InitializationFailed { attempts });
        }

        self.engine
            .execute_script(&MapCommand::SetMapType(self.state.map_type()).to_script())?;
        if let Some(port) = self.channel.port() {
            self.channel.probe(
                Arc::clone(&self.engine),
                ProbeScripts {
                    check_listener: MapCommand::CheckCallbackListener { port }.to_script(),
                    enable_polling: MapCommand::SetPolling(true).to_script(),
                },
            );
        }

        self.reducer.clear_cache();
        self.scheduler.mark(|dirty| {
            dirty.mark_replace_route("initialized");
            dirty.mark_repaint("initialized");
        });
        info!("Map view initialized");
        Ok(())
    }

    /// Stops the update loops, the callback channel and the dispatcher.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        self.channel.shutdown(self.config.scheduler.shutdown_timeout()).await;

        self.cancel.cancel();
        let dispatcher = self.dispatcher.lock().take();
        if let Some(dispatcher) = dispatcher {
            let abort = dispatcher.abort_handle();
            if tokio::time::timeout(self.config.scheduler.shutdown_timeout(), dispatcher)
                .await
                .is_err()
            {
                abort.abort();
            }
        }
        info!("Map view stopped");
    }

    /// The loaded route was replaced by another one.
    pub fn route_replaced(&self) {
        self.reducer.clear_cache();
        self.scheduler.mark(|dirty| {
            dirty.mark_replace_route("replace route");
            dirty.mark_selection(Vec::new(), false, "replace route");
        });
    }

    /// Positions of the loaded route changed.
    ///
    /// Structural changes repaint at once; single-row edits wait for the
    /// route update interval. Location and description edits also redraw
    /// the selection markers.
    pub fn model_changed(&self, change: ModelChange) {
        let reason = match change {
            ModelChange::AllRowsChanged => "positions changed",
            ModelChange::RowsInserted { .. } => "insert positions",
            ModelChange::RowsDeleted { .. } => "delete positions",
            ModelChange::RowsUpdated { .. } => "update positions",
            ModelChange::CellUpdated { column, .. } if column.affects_rendering() => "update position",
            ModelChange::CellUpdated { .. } => return,
        };

        self.reducer.clear_cache();
        self.scheduler.mark(|dirty| {
            if change.is_structural() {
                dirty.mark_repaint(reason);
            } else {
                dirty.mark_update_route(reason);
                if change.affects_selection() {
                    dirty.mark_selection_changed(reason);
                }
            }
        });
    }

    /// The selected rows changed.
    pub fn selection_changed(&self, indices: Vec<usize>, recenter: bool) {
        self.scheduler
            .mark(|dirty| dirty.mark_selection(indices, recenter, "selection changed"));
    }

    pub fn preferences_changed(&self, preference: ViewPreference) {
        match preference {
            ViewPreference::Characteristics(characteristics) => {
                debug!(characteristics = %characteristics, "Route characteristics changed");
                self.reducer.clear_cache();
                self.scheduler
                    .mark(|dirty| dirty.mark_replace_route("characteristics changed"));
            }
            ViewPreference::ShowWaypointDescriptions(show) => self.scheduler.mark(|dirty| {
                dirty.render.show_waypoint_descriptions = show;
                dirty.mark_repaint("waypoint descriptions");
            }),
            ViewPreference::RouteColor(color) => self.scheduler.mark(|dirty| {
                dirty.render.route_color = color;
                dirty.mark_repaint("route color");
            }),
            ViewPreference::TrackWidth(width) => self.scheduler.mark(|dirty| {
                dirty.render.track_width = width;
                dirty.mark_repaint("track width");
            }),
            ViewPreference::FixMapMode(mode) => {
                self.bridge
                    .set_fix_map_mode(mode, self.config.view.offset_map_types.clone());
                self.scheduler.mark(|dirty| dirty.mark_repaint("fix map mode"));
            }
            ViewPreference::UnitSystem => self.repaint(),
        }
    }

    /// Shows or hides the map. Hidden maps keep their flags until shown.
    pub fn set_visible(&self, visible: bool) {
        self.scheduler.mark(|dirty| {
            dirty.visible = visible;
            if visible {
                dirty.mark_repaint("visible");
            }
        });
    }

    /// Forces an immediate redraw of route and selection.
    pub fn repaint(&self) {
        self.scheduler.mark(|dirty| dirty.mark_repaint("repaint"));
    }

    /// The map widget was resized.
    pub fn resize(&self, width: u32, height: u32) {
        self.state.set_size(width, height);
        if self.engine.is_initialized() {
            if let Err(e) = self.engine.execute_script(&MapCommand::Resize.to_script()) {
                warn!(error = %e, "Resizing map failed");
            }
        }
    }

    pub fn state(&self) -> &Arc<MapState> {
        &self.state
    }

    pub fn reducer(&self) -> &Arc<PositionReducer> {
        &self.reducer
    }

    pub fn scheduler(&self) -> &Arc<MapUpdateScheduler> {
        &self.scheduler
    }

    pub fn channel_stats(&self) -> ChannelStats {
        self.channel.stats()
    }

    /// Callback port while the channel is running.
    pub fn callback_port(&self) -> Option<u16> {
        self.channel.port()
    }

    pub fn over_query_limit_count(&self) -> u64 {
        self.state.over_query_limit_count()
    }

    pub fn zero_results_count(&self) -> u64 {
        self.state.zero_results_count()
    }
}
