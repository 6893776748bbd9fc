//! Pending-change flags and debounce decisions
//!
//! Model notifications only set flags here; the route and selection loops
//! consume them. A flag is cleared exclusively by the loop that renders it,
//! in the same critical section that snapshots the data it describes.

use std::collections::BTreeSet;
use std::time::Duration;

/// Style settings the loops render with.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub route_color: String,
    pub track_width: u32,
    pub show_waypoint_descriptions: bool,
}

/// Everything guarded by the notification mutex.
#[derive(Debug, Clone)]
pub struct DirtyState {
    /// Map widget is shown
    pub visible: bool,
    /// Whole route must be redrawn now
    pub replace_route: bool,
    /// Route changed in place; redrawn at most once per update interval
    pub update_route: bool,
    /// Fit the map to the route on the next route push
    pub recenter_route: bool,
    /// Redraw the route now regardless of the rate limit
    pub repaint_route: bool,
    /// Selection changed; redrawn at most once per update interval
    pub selection_changed: bool,
    /// Center the map on the selection on the next selection push
    pub recenter_selection: bool,
    /// Redraw the selection now regardless of the rate limit
    pub repaint_selection: bool,
    /// Currently selected model indices
    pub selected_indices: Vec<usize>,
    /// Why the route flags are set, for logging. A set, so it stays small
    /// while a hidden map accumulates notifications.
    pub route_reasons: BTreeSet<&'static str>,
    /// Why the selection flags are set, for logging
    pub selection_reasons: BTreeSet<&'static str>,
    pub render: RenderSettings,
}

impl DirtyState {
    pub fn new(render: RenderSettings) -> Self {
        Self {
            visible: true,
            replace_route: false,
            update_route: false,
            recenter_route: false,
            repaint_route: false,
            selection_changed: false,
            recenter_selection: false,
            repaint_selection: false,
            selected_indices: Vec::new(),
            route_reasons: BTreeSet::new(),
            selection_reasons: BTreeSet::new(),
            render,
        }
    }

    /// Flags a full route redraw.
    pub fn mark_replace_route(&mut self, reason: &'static str) {
        self.replace_route = true;
        self.recenter_route = true;
        self.route_reasons.insert(reason);
    }

    /// Flags a rate-limited route redraw.
    pub fn mark_update_route(&mut self, reason: &'static str) {
        self.update_route = true;
        self.route_reasons.insert(reason);
    }

    /// Flags an immediate redraw of route and selection.
    pub fn mark_repaint(&mut self, reason: &'static str) {
        self.repaint_route = true;
        self.repaint_selection = true;
        self.route_reasons.insert(reason);
        self.selection_reasons.insert(reason);
    }

    /// Flags a rate-limited selection redraw without changing the selection.
    pub fn mark_selection_changed(&mut self, reason: &'static str) {
        self.selection_changed = true;
        self.selection_reasons.insert(reason);
    }

    /// Stores a new selection.
    pub fn mark_selection(&mut self, indices: Vec<usize>, recenter: bool, reason: &'static str) {
        self.selected_indices = indices;
        self.selection_changed = true;
        self.recenter_selection |= recenter;
        self.selection_reasons.insert(reason);
    }

    pub fn route_flags(&self) -> RouteFlags {
        RouteFlags {
            replace: self.replace_route,
            update: self.update_route,
            repaint: self.repaint_route,
            recenter: self.recenter_route,
        }
    }

    pub fn selection_flags(&self) -> SelectionFlags {
        SelectionFlags {
            changed: self.selection_changed,
            repaint: self.repaint_selection,
            recenter: self.recenter_selection,
        }
    }

    /// Clears the route flags, returning the reasons they were set for.
    pub fn clear_route(&mut self) -> BTreeSet<&'static str> {
        self.replace_route = false;
        self.update_route = false;
        self.recenter_route = false;
        self.repaint_route = false;
        std::mem::take(&mut self.route_reasons)
    }

    /// Clears the selection flags, returning the reasons they were set for.
    pub fn clear_selection(&mut self) -> BTreeSet<&'static str> {
        self.selection_changed = false;
        self.recenter_selection = false;
        self.repaint_selection = false;
        std::mem::take(&mut self.selection_reasons)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteFlags {
    pub replace: bool,
    pub update: bool,
    pub repaint: bool,
    pub recenter: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionFlags {
    pub changed: bool,
    pub repaint: bool,
    pub recenter: bool,
}

/// What a loop should do on this wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
    /// Nothing due yet
    Idle,
    /// Snapshot, clear flags and render
    Push { recenter: bool },
}

/// Route loop debounce: replace and repaint push at once, in-place updates
/// wait until `update_interval` has passed since the last push.
pub fn decide_route_update(flags: RouteFlags, since_last_push: Duration, update_interval: Duration) -> UpdateDecision {
    let due = flags.repaint || flags.replace || (flags.update && since_last_push >= update_interval);
    if due {
        UpdateDecision::Push {
            recenter: flags.recenter,
        }
    } else {
        UpdateDecision::Idle
    }
}

/// Selection loop debounce: repaint and recenter push at once, selection
/// changes wait until `update_interval` has passed since the last push.
pub fn decide_selection_update(
    flags: SelectionFlags,
    since_last_push: Duration,
    update_interval: Duration,
) -> UpdateDecision {
    let due = flags.repaint || flags.recenter || (flags.changed && since_last_push >= update_interval);
    if due {
        UpdateDecision::Push {
            recenter: flags.recenter,
        }
    } else {
        UpdateDecision::Idle
    }
}
