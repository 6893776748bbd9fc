//! Route and selection update loops
//!
//! # Architecture
//!
//! ```text
//!   model notifications ──► DirtyState (notification mutex) ──► Wakeup
//!                                   │                             │
//!                     ┌─────────────┴──────────┐        ┌─────────┴────────┐
//!                     ▼                        ▼        ▼                  ▼
//!               route loop (1s)         selection loop (250ms)
//!                     │ decide_route_update      │ decide_selection_update
//!                     │ snapshot + clear flags   │ snapshot + clear flags
//!                     ▼                          ▼
//!               PositionReducer            PositionReducer
//!                     ▼                          ▼
//!               ViewBridge ──► MapCommand ──► MapEngine
//! ```
//!
//! Reduction and script generation happen outside the notification mutex.

use crate::bridge::ViewBridge;
use crate::command::MapCommand;
use crate::dirty::{decide_route_update, decide_selection_update, DirtyState, RenderSettings, UpdateDecision};
use crate::model::RouteSource;
use mapbridge_core::config::SchedulerConfig;
use mapbridge_core::engine::MapEngine;
use mapbridge_core::error::EngineError;
use mapbridge_core::types::{BoundingBox, Position, Route, RouteCharacteristics};
use mapbridge_reduce::PositionReducer;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Wakes both loops. Each loop has its own permit so a notification sent
/// while a loop is rendering is not lost.
#[derive(Debug, Default)]
pub struct Wakeup {
    route: Notify,
    selection: Notify,
}

impl Wakeup {
    pub fn notify(&self) {
        self.route.notify_one();
        self.selection.notify_one();
    }
}

/// State shared between the scheduler loops and the notifying call sites.
pub struct SchedulerShared {
    config: SchedulerConfig,
    dirty: Mutex<DirtyState>,
    wakeup: Wakeup,
    running: AtomicBool,
    route_pushes: AtomicU64,
    selection_pushes: AtomicU64,
    reducer: Arc<PositionReducer>,
    bridge: Arc<ViewBridge>,
    engine: Arc<dyn MapEngine>,
    route: Arc<dyn RouteSource>,
}

/// Route and selection loops.
pub struct MapUpdateScheduler {
    shared: Arc<SchedulerShared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MapUpdateScheduler {
    pub fn new(
        config: SchedulerConfig,
        render: RenderSettings,
        reducer: Arc<PositionReducer>,
        bridge: Arc<ViewBridge>,
        engine: Arc<dyn MapEngine>,
        route: Arc<dyn RouteSource>,
    ) -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                config,
                dirty: Mutex::new(DirtyState::new(render)),
                wakeup: Wakeup::default(),
                running: AtomicBool::new(false),
                route_pushes: AtomicU64::new(0),
                selection_pushes: AtomicU64::new(0),
                reducer,
                bridge,
                engine,
                route,
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawns both loops. Does nothing if they are already running.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let route = tokio::spawn(route_loop(Arc::clone(&self.shared)));
        let selection = tokio::spawn(selection_loop(Arc::clone(&self.shared)));
        self.tasks.lock().extend([route, selection]);
        info!(
            route_poll_ms = self.shared.config.route_poll_interval_ms,
            selection_poll_ms = self.shared.config.selection_poll_interval_ms,
            "Map update loops started"
        );
    }

    /// Clears `running`, wakes both loops and joins them with a bounded wait.
    pub async fn shutdown(&self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.shared.wakeup.notify();

        let timeout = self.shared.config.shutdown_timeout();
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let abort = task.abort_handle();
            if tokio::time::timeout(timeout, task).await.is_err() {
                warn!(timeout_ms = timeout.as_millis() as u64, "Map update loop did not stop in time");
                abort.abort();
            }
        }
        info!("Map update loops stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Mutates the dirty state under the notification mutex and wakes the
    /// loops.
    pub fn mark<R>(&self, f: impl FnOnce(&mut DirtyState) -> R) -> R {
        let result = f(&mut self.shared.dirty.lock());
        self.shared.wakeup.notify();
        result
    }

    /// Copy of the current dirty state.
    pub fn dirty(&self) -> DirtyState {
        self.shared.dirty.lock().clone()
    }

    /// Number of route renders pushed so far.
    pub fn route_pushes(&self) -> u64 {
        self.shared.route_pushes.load(Ordering::Relaxed)
    }

    /// Number of selection renders pushed so far.
    pub fn selection_pushes(&self) -> u64 {
        self.shared.selection_pushes.load(Ordering::Relaxed)
    }
}

/// Data the route loop renders, taken under the notification mutex.
struct RouteSnapshot {
    route: Option<Route>,
    recenter: bool,
    render: RenderSettings,
    reasons: BTreeSet<&'static str>,
}

/// Data the selection loop renders, taken under the notification mutex.
struct SelectionSnapshot {
    indices: Vec<usize>,
    positions: Vec<Position>,
    recenter: bool,
    reasons: BTreeSet<&'static str>,
}

/// Waits for a wake-up or the poll interval; false once shut down.
async fn wait(shared: &SchedulerShared, notify: &Notify, interval: Duration) -> bool {
    tokio::select! {
        _ = notify.notified() => {}
        _ = tokio::time::sleep(interval) => {}
    }
    shared.running.load(Ordering::Acquire)
}

async fn route_loop(shared: Arc<SchedulerShared>) {
    let poll_interval = shared.config.route_poll_interval();
    let update_interval = shared.config.route_update_interval();
    let mut last_push = Instant::now();

    while wait(&shared, &shared.wakeup.route, poll_interval).await {
        let snapshot = {
            let mut dirty = shared.dirty.lock();
            if !dirty.visible || !shared.engine.is_initialized() {
                continue;
            }
            match decide_route_update(dirty.route_flags(), last_push.elapsed(), update_interval) {
                UpdateDecision::Idle => continue,
                UpdateDecision::Push { recenter } => {
                    let route = shared.route.snapshot();
                    let has_positions = route.as_ref().is_some_and(|route| !route.is_empty());
                    // an emptied route still needs its overlays removed
                    if !has_positions && !dirty.replace_route {
                        continue;
                    }
                    RouteSnapshot {
                        route,
                        recenter,
                        render: dirty.render.clone(),
                        reasons: dirty.clear_route(),
                    }
                }
            }
        };

        last_push = Instant::now();
        let started = std::time::Instant::now();
        let commands = route_commands(&shared, &snapshot);
        let count = commands.len();
        if let Err(e) = execute(shared.engine.as_ref(), &commands) {
            warn!(error = %e, "Route update failed");
        }
        shared.route_pushes.fetch_add(1, Ordering::Relaxed);
        debug!(
            reasons = ?snapshot.reasons,
            commands = count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pushed route update"
        );
    }
    debug!("Route loop stopped");
}

async fn selection_loop(shared: Arc<SchedulerShared>) {
    let poll_interval = shared.config.selection_poll_interval();
    let update_interval = shared.config.selection_update_interval();
    let mut last_push = Instant::now();

    while wait(&shared, &shared.wakeup.selection, poll_interval).await {
        let snapshot = {
            let mut dirty = shared.dirty.lock();
            if !dirty.visible || !shared.engine.is_initialized() {
                continue;
            }
            match decide_selection_update(dirty.selection_flags(), last_push.elapsed(), update_interval) {
                UpdateDecision::Idle => continue,
                UpdateDecision::Push { recenter } => SelectionSnapshot {
                    indices: dirty.selected_indices.clone(),
                    positions: shared.route.snapshot().map(|route| route.positions).unwrap_or_default(),
                    recenter,
                    reasons: dirty.clear_selection(),
                },
            }
        };

        last_push = Instant::now();
        let started = std::time::Instant::now();
        let commands = selection_commands(&shared, &snapshot);
        let count = commands.len();
        if let Err(e) = execute(shared.engine.as_ref(), &commands) {
            warn!(error = %e, "Selection update failed");
        }
        shared.selection_pushes.fetch_add(1, Ordering::Relaxed);
        debug!(
            reasons = ?snapshot.reasons,
            selected = snapshot.indices.len(),
            commands = count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pushed selection update"
        );
    }
    debug!("Selection loop stopped");
}

fn execute(engine: &dyn MapEngine, commands: &[MapCommand]) -> Result<(), EngineError> {
    for command in commands {
        engine.execute_script(&command.to_script())?;
    }
    Ok(())
}

/// Commands that redraw the route: optional recenter, then the overlays.
fn route_commands(shared: &SchedulerShared, snapshot: &RouteSnapshot) -> Vec<MapCommand> {
    let mut commands = vec![MapCommand::RemoveOverlays];
    let Some(route) = snapshot.route.as_ref().filter(|route| !route.is_empty()) else {
        return commands;
    };

    if snapshot.recenter {
        if let Some(fit) = BoundingBox::from_positions(&route.positions).and_then(|b| shared.bridge.fit_bounds(&b)) {
            commands.insert(0, fit);
        }
    }

    let characteristics = route.characteristics;
    let show_descriptions =
        snapshot.render.show_waypoint_descriptions && characteristics == RouteCharacteristics::Waypoints;
    let reduced = shared
        .reducer
        .reduce_for_render(&route.positions, characteristics, show_descriptions);
    let segment_length = shared.reducer.config().segment_length(characteristics);
    let bridge = &shared.bridge;

    match characteristics {
        RouteCharacteristics::Route => {
            for range in chunk_ranges(reduced.len(), segment_length, true) {
                commands.push(MapCommand::RenderDirections {
                    coordinates: bridge.coordinates(&reduced[range.clone()]),
                    start_index: range.start,
                });
            }
        }
        RouteCharacteristics::Track => {
            for range in chunk_ranges(reduced.len(), segment_length, true) {
                commands.push(MapCommand::AddPolyline {
                    coordinates: bridge.coordinates(&reduced[range]),
                    color: snapshot.render.route_color.clone(),
                    width: snapshot.render.track_width,
                });
            }
            let tagged: Vec<Position> = reduced
                .iter()
                .filter(|position| position.waypoint_type.is_some())
                .cloned()
                .collect();
            for range in chunk_ranges(tagged.len(), segment_length, false) {
                commands.push(MapCommand::AddMarkers(bridge.markers(&tagged[range], false)));
            }
        }
        RouteCharacteristics::Waypoints => {
            for range in chunk_ranges(reduced.len(), segment_length, false) {
                commands.push(MapCommand::AddMarkers(bridge.markers(&reduced[range], show_descriptions)));
            }
        }
    }
    commands
}

/// Commands that redraw the selection markers.
fn selection_commands(shared: &SchedulerShared, snapshot: &SelectionSnapshot) -> Vec<MapCommand> {
    let selection = shared.reducer.reduce_selection(&snapshot.positions, &snapshot.indices);
    let mut commands = vec![MapCommand::RemoveSelectedPositions];
    if !selection.is_empty() {
        commands.push(MapCommand::SelectPositions(shared.bridge.selection_markers(&selection)));
    }

    if snapshot.recenter {
        let center = BoundingBox::from_positions(selection.iter().map(|selected| &selected.position))
            .and_then(|bounds| shared.bridge.set_center(&bounds.center()));
        if let Some(center) = center {
            commands.push(center);
        }
    }
    commands
}

/// Splits `len` items into chunks of at most `segment_length`.
///
/// With `overlap` consecutive chunks share their boundary item, so polylines
/// and direction requests join up.
pub fn chunk_ranges(len: usize, segment_length: usize, overlap: bool) -> Vec<Range<usize>> {
    let segment_length = segment_length.max(2);
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + segment_length).min(len);
        ranges.push(start..end);
        if end == len {
            break;
        }
        start = if overlap { end - 1 } else { end };
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_ranges_overlap() {
        assert_eq!(chunk_ranges(10, 4, true), vec![0..4, 3..7, 6..10]);
        assert_eq!(chunk_ranges(11, 4, true), vec![0..4, 3..7, 6..10, 9..11]);
        assert_eq!(chunk_ranges(3, 8, true), vec![0..3]);
        assert_eq!(chunk_ranges(1, 8, true), vec![0..1]);
        assert!(chunk_ranges(0, 8, true).is_empty());
    }

    #[test]
    fn test_chunk_ranges_disjoint() {
        assert_eq!(chunk_ranges(10, 4, false), vec![0..4, 4..8, 8..10]);
        assert_eq!(chunk_ranges(8, 4, false), vec![0..4, 4..8]);
    }
}
