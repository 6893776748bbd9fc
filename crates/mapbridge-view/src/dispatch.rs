//! Browser callback dispatch
//!
//! Internal callbacks (zoom, center, map type, port, directions counters)
//! update [`MapState`]; edits become [`MapEvent`]s for the UI thread. Browser
//! coordinates are turned into model positions here and nowhere else.

use crate::bridge::ViewBridge;
use crate::model::{MapEvent, RouteSource};
use crate::scheduler::MapUpdateScheduler;
use crate::state::MapState;
use flume::{Receiver, Sender};
use mapbridge_callback::MapCallback;
use mapbridge_core::types::{BoundingBox, Position};
use mapbridge_reduce::significance::haversine_distance;
use mapbridge_reduce::PositionReducer;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Index of the position closest to `target`, if within `threshold` meters.
pub fn closest_position(positions: &[Position], target: &Position, threshold: f64) -> Option<usize> {
    let (target_lon, target_lat) = target.coordinates()?;
    positions
        .iter()
        .enumerate()
        .filter_map(|(index, position)| {
            let (lon, lat) = position.coordinates()?;
            Some((index, haversine_distance(lon, lat, target_lon, target_lat)))
        })
        .filter(|(_, distance)| *distance <= threshold)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

/// Indices of the positions inside `bounds`, ascending.
pub fn positions_within(positions: &[Position], bounds: &BoundingBox) -> Vec<usize> {
    positions
        .iter()
        .enumerate()
        .filter(|(_, position)| bounds.contains_position(position))
        .map(|(index, _)| index)
        .collect()
}

/// Turns callbacks into state updates and UI events.
pub struct CallbackDispatcher {
    state: Arc<MapState>,
    bridge: Arc<ViewBridge>,
    reducer: Arc<PositionReducer>,
    scheduler: Arc<MapUpdateScheduler>,
    route: Arc<dyn RouteSource>,
    events: Sender<MapEvent>,
}

impl CallbackDispatcher {
    pub fn new(
        state: Arc<MapState>,
        bridge: Arc<ViewBridge>,
        reducer: Arc<PositionReducer>,
        scheduler: Arc<MapUpdateScheduler>,
        route: Arc<dyn RouteSource>,
        events: Sender<MapEvent>,
    ) -> Self {
        Self {
            state,
            bridge,
            reducer,
            scheduler,
            route,
            events,
        }
    }

    fn positions(&self) -> Vec<Position> {
        self.route.snapshot().map(|route| route.positions).unwrap_or_default()
    }

    fn emit(&self, event: MapEvent) {
        if self.events.send(event).is_err() {
            warn!("UI event queue closed, dropping map event");
        }
    }

    /// Handles one callback.
    pub fn handle(&self, callback: MapCallback) {
        debug!(kind = callback.kind(), "Handling callback");
        match callback {
            MapCallback::AddPosition { coordinate } => {
                let index = self.positions().len();
                self.emit(MapEvent::InsertPositions {
                    index,
                    positions: vec![self.bridge.from_browser(&coordinate)],
                });
            }
            MapCallback::AddPositionAt { index, coordinate } => {
                self.emit(MapEvent::InsertPositions {
                    index,
                    positions: vec![self.bridge.from_browser(&coordinate)],
                });
            }
            MapCallback::MovePosition { index, coordinate } => {
                self.emit(MapEvent::MovePosition {
                    index,
                    position: self.bridge.from_browser(&coordinate),
                });
            }
            MapCallback::DeletePosition { coordinate, threshold } => {
                let target = self.bridge.from_browser(&coordinate);
                if let Some(index) = closest_position(&self.positions(), &target, threshold) {
                    self.emit(MapEvent::DeletePositions { indices: vec![index] });
                }
            }
            MapCallback::SelectPosition {
                coordinate,
                threshold,
                replace,
            } => {
                let target = self.bridge.from_browser(&coordinate);
                if let Some(index) = closest_position(&self.positions(), &target, threshold) {
                    self.emit(MapEvent::SelectPositions {
                        indices: vec![index],
                        replace,
                    });
                }
            }
            MapCallback::SelectPositions {
                northeast,
                southwest,
                replace,
            } => {
                if let Some(bounds) = self.bridge.bounds_from_browser(&northeast, &southwest) {
                    let indices = positions_within(&self.positions(), &bounds);
                    self.emit(MapEvent::SelectPositions { indices, replace });
                }
            }
            MapCallback::MapTypeChanged { map_type } => {
                if map_type != self.state.map_type() {
                    info!(map_type = %map_type, "Map type changed");
                    self.state.set_map_type(map_type);
                    // correction may now differ
                    self.scheduler.mark(|dirty| dirty.mark_repaint("map type changed"));
                }
            }
            MapCallback::ZoomChanged { zoom } => {
                let previous = self.state.zoom();
                self.state.set_zoom(zoom);
                if previous != zoom {
                    self.scheduler.mark(|dirty| dirty.mark_repaint("zoom changed"));
                }
                self.viewport_changed();
            }
            MapCallback::CenterChanged { coordinate } => {
                self.state.set_center(self.bridge.from_browser(&coordinate));
                self.viewport_changed();
            }
            MapCallback::CallbackPort { port } => {
                debug!(port, "Browser reported callback port");
                self.state.set_callback_port(port);
            }
            MapCallback::OverQueryLimit => {
                let count = self.state.record_over_query_limit();
                debug!(count, "Directions over query limit");
            }
            MapCallback::ZeroResults => {
                let count = self.state.record_zero_results();
                debug!(count, "Directions found no route");
            }
            MapCallback::DirectionsLoad { meters, seconds } => {
                self.state.set_last_directions(meters, seconds);
                self.emit(MapEvent::DirectionsLoaded { meters, seconds });
            }
            MapCallback::InsertWaypointsResult {
                after_index,
                coordinates,
            } => {
                let Some(index) = after_index.checked_add(1) else {
                    warn!(after_index, "Dropping waypoints inserted after an impossible index");
                    return;
                };
                let positions: Vec<Position> = coordinates
                    .iter()
                    .map(|coordinate| self.bridge.from_browser(coordinate))
                    .collect();
                self.emit(MapEvent::InsertPositions { index, positions });
            }
        }
    }

    /// Forces a full redraw when the viewport left the filtered area.
    fn viewport_changed(&self) {
        let bounds = self.state.bounds();
        if let Some(bounds) = bounds {
            if !self.reducer.is_within_visible_area(&bounds) {
                debug!(bounds = %bounds, "Viewport left the filtered area");
                self.reducer.clear_cache();
                self.scheduler.mark(|dirty| dirty.mark_repaint("viewport left filtered area"));
            }
        }
        self.emit(MapEvent::ViewportChanged {
            zoom: self.state.zoom(),
            bounds,
        });
    }

    /// Spawns the dispatch task, which runs until `cancel` fires or the
    /// callback channel closes.
    pub fn spawn(self, callbacks: Receiver<MapCallback>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    callback = callbacks.recv_async() => match callback {
                        Ok(callback) => self.handle(callback),
                        Err(_) => break,
                    },
                }
            }
            debug!("Callback dispatcher stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::CoordinateCorrector;
    use crate::dirty::RenderSettings;
    use crate::model::SharedRoute;
    use mapbridge_core::config::{FixMapMode, ReducerConfig, SchedulerConfig};
    use mapbridge_core::engine::RecordingEngine;
    use mapbridge_core::types::{Route, RouteCharacteristics};

    fn dispatcher() -> (CallbackDispatcher, Receiver<MapEvent>) {
        let state = Arc::new(MapState::new("roadmap"));
        let reducer = Arc::new(PositionReducer::new(ReducerConfig::default(), state.clone()));
        let bridge = Arc::new(ViewBridge::new(
            CoordinateCorrector::new(FixMapMode::Never, Vec::new()),
            Arc::clone(&state),
        ));
        let route = Arc::new(SharedRoute::new(Some(Route::new(
            RouteCharacteristics::Route,
            vec![Position::new(11.0, 48.0), Position::new(11.1, 48.1)],
        ))));
        let scheduler = Arc::new(MapUpdateScheduler::new(
            SchedulerConfig::default(),
            RenderSettings {
                route_color: "#3388ff".to_string(),
                track_width: 2,
                show_waypoint_descriptions: false,
            },
            Arc::clone(&reducer),
            Arc::clone(&bridge),
            Arc::new(RecordingEngine::new()),
            route.clone(),
        ));
        let (tx, rx) = flume::unbounded();
        (CallbackDispatcher::new(state, bridge, reducer, scheduler, route, tx), rx)
    }

    #[test]
    fn test_inserted_waypoints_follow_after_index() {
        let (dispatcher, events) = dispatcher();
        let callback = MapCallback::parse("insert-waypoints-result/0/48.05/11.05").unwrap();
        dispatcher.handle(callback);
        assert_eq!(
            events.try_recv().unwrap(),
            MapEvent::InsertPositions {
                index: 1,
                positions: vec![Position::new(11.05, 48.05)],
            }
        );
    }

    #[test]
    fn test_waypoints_after_last_index_are_dropped() {
        let (dispatcher, events) = dispatcher();
        let body = format!("insert-waypoints-result/{}/1/2", usize::MAX);
        dispatcher.handle(MapCallback::parse(&body).unwrap());
        assert!(events.is_empty());

        // still dispatching afterwards
        dispatcher.handle(MapCallback::parse("directions-load/10/20").unwrap());
        assert_eq!(
            events.try_recv().unwrap(),
            MapEvent::DirectionsLoaded {
                meters: 10.0,
                seconds: 20.0,
            }
        );
    }

    #[test]
    fn test_closest_position_within_threshold() {
        let positions = vec![
            Position::new(0.0, 0.0),
            Position::default(),
            Position::new(0.001, 0.0),
            Position::new(0.002, 0.0),
        ];
        // ~11 meters east of index 2
        let target = Position::new(0.0011, 0.0);
        assert_eq!(closest_position(&positions, &target, 50.0), Some(2));
        assert_eq!(closest_position(&positions, &target, 5.0), None);
        assert_eq!(closest_position(&positions, &Position::default(), 50.0), None);
    }

    #[test]
    fn test_positions_within() {
        let positions: Vec<Position> = (0..5).map(|i| Position::new(i as f64, 0.0)).collect();
        let bounds = BoundingBox::new(1.0, 3.0, -1.0, 1.0).unwrap();
        assert_eq!(positions_within(&positions, &bounds), vec![1, 2, 3]);
    }
}
