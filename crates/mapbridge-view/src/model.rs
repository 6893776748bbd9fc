//! Model-side collaborators of the map view
//!
//! The route model is owned by the UI. The view reads snapshots through
//! [`RouteSource`], is told about changes through [`ModelChange`] and
//! [`ViewPreference`], and reports browser edits back as [`MapEvent`]s.

use mapbridge_core::types::{BoundingBox, Position, Route, RouteCharacteristics};
use parking_lot::RwLock;

/// Read access to the route currently shown.
pub trait RouteSource: Send + Sync {
    /// Defensive copy of the current route, `None` if no route is loaded.
    fn snapshot(&self) -> Option<Route>;
}

/// A route held in memory, shared between the UI and the view.
#[derive(Debug, Default)]
pub struct SharedRoute {
    route: RwLock<Option<Route>>,
}

impl SharedRoute {
    pub fn new(route: Option<Route>) -> Self {
        Self {
            route: RwLock::new(route),
        }
    }

    pub fn replace(&self, route: Option<Route>) {
        *self.route.write() = route;
    }

    /// Applies `f` to the loaded route, if any.
    pub fn update<R>(&self, f: impl FnOnce(&mut Route) -> R) -> Option<R> {
        self.route.write().as_mut().map(f)
    }

    /// Applies a browser edit to the route and returns the change the view
    /// should be notified about.
    pub fn apply(&self, event: &MapEvent) -> Option<ModelChange> {
        let mut guard = self.route.write();
        let route = guard.as_mut()?;
        match event {
            MapEvent::InsertPositions { index, positions } => {
                let index = (*index).min(route.positions.len());
                let count = positions.len();
                if count == 0 {
                    return None;
                }
                route.positions.splice(index..index, positions.iter().cloned());
                Some(ModelChange::RowsInserted {
                    first: index,
                    last: index + count - 1,
                })
            }
            MapEvent::MovePosition { index, position } => {
                let target = route.positions.get_mut(*index)?;
                target.longitude = position.longitude;
                target.latitude = position.latitude;
                Some(ModelChange::RowsUpdated {
                    first: *index,
                    last: *index,
                })
            }
            MapEvent::DeletePositions { indices } => {
                let mut indices: Vec<usize> =
                    indices.iter().copied().filter(|&i| i < route.positions.len()).collect();
                indices.sort_unstable();
                indices.dedup();
                let (first, last) = (*indices.first()?, *indices.last()?);
                for index in indices.into_iter().rev() {
                    route.positions.remove(index);
                }
                Some(ModelChange::RowsDeleted { first, last })
            }
            _ => None,
        }
    }
}

impl RouteSource for SharedRoute {
    fn snapshot(&self) -> Option<Route> {
        self.route.read().clone()
    }
}

/// Column of the position table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Longitude,
    Latitude,
    Description,
    Elevation,
    Speed,
    Time,
    Other,
}

impl Column {
    /// True if a change to this column moves the position on the map.
    pub fn affects_location(&self) -> bool {
        matches!(self, Column::Longitude | Column::Latitude)
    }

    /// True if a change to this column alters what the map displays.
    pub fn affects_rendering(&self) -> bool {
        matches!(self, Column::Longitude | Column::Latitude | Column::Description)
    }
}

/// Change notification from the position table model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChange {
    /// Every row may have changed, e.g. after sorting or reverting
    AllRowsChanged,
    RowsInserted { first: usize, last: usize },
    RowsDeleted { first: usize, last: usize },
    RowsUpdated { first: usize, last: usize },
    CellUpdated { row: usize, column: Column },
}

impl ModelChange {
    /// True for changes that shift or rewrite more than one row and need a
    /// full repaint. Single-row edits are drawn incrementally.
    pub fn is_structural(&self) -> bool {
        match self {
            ModelChange::AllRowsChanged
            | ModelChange::RowsInserted { .. }
            | ModelChange::RowsDeleted { .. } => true,
            ModelChange::RowsUpdated { first, last } => first != last,
            ModelChange::CellUpdated { .. } => false,
        }
    }

    /// True if selection markers must be redrawn.
    pub fn affects_selection(&self) -> bool {
        match self {
            ModelChange::CellUpdated { column, .. } => column.affects_rendering(),
            _ => true,
        }
    }
}

/// User preference changes the map reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewPreference {
    /// The route switched characteristics
    Characteristics(RouteCharacteristics),
    ShowWaypointDescriptions(bool),
    RouteColor(String),
    TrackWidth(u32),
    FixMapMode(mapbridge_core::config::FixMapMode),
    /// Distance and time display settings; the map only repaints
    UnitSystem,
}

/// Edits and notifications from the browser for the UI thread.
///
/// Positions are already converted back to model coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// Insert `positions` before `index`
    InsertPositions { index: usize, positions: Vec<Position> },
    /// A marker was dragged to `position`
    MovePosition { index: usize, position: Position },
    DeletePositions { indices: Vec<usize> },
    /// Select positions; `replace` drops the previous selection
    SelectPositions { indices: Vec<usize>, replace: bool },
    /// Directions finished loading with total distance and duration
    DirectionsLoaded { meters: f64, seconds: f64 },
    /// The map viewport changed
    ViewportChanged { zoom: u32, bounds: Option<BoundingBox> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_classification() {
        assert!(ModelChange::AllRowsChanged.is_structural());
        assert!(ModelChange::RowsInserted { first: 4, last: 4 }.is_structural());
        assert!(ModelChange::RowsDeleted { first: 0, last: 9 }.is_structural());
        assert!(ModelChange::RowsUpdated { first: 0, last: 9 }.is_structural());
        assert!(!ModelChange::RowsUpdated { first: 3, last: 3 }.is_structural());

        let description = ModelChange::CellUpdated {
            row: 1,
            column: Column::Description,
        };
        let elevation = ModelChange::CellUpdated {
            row: 1,
            column: Column::Elevation,
        };
        assert!(!description.is_structural());
        assert!(description.affects_selection());
        assert!(!elevation.affects_selection());
    }

    fn route(count: usize) -> SharedRoute {
        let positions = (0..count).map(|i| Position::new(i as f64, 0.0)).collect();
        SharedRoute::new(Some(Route::new(RouteCharacteristics::Track, positions)))
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let shared = route(3);
        let mut snapshot = shared.snapshot().unwrap();
        snapshot.positions.clear();
        assert_eq!(shared.snapshot().unwrap().len(), 3);
        assert!(SharedRoute::default().snapshot().is_none());
    }

    #[test]
    fn test_apply_insert_and_delete() {
        let shared = route(3);
        let change = shared.apply(&MapEvent::InsertPositions {
            index: 1,
            positions: vec![Position::new(0.5, 0.0)],
        });
        assert_eq!(change, Some(ModelChange::RowsInserted { first: 1, last: 1 }));
        assert_eq!(shared.snapshot().unwrap().positions[1], Position::new(0.5, 0.0));

        let change = shared.apply(&MapEvent::DeletePositions {
            indices: vec![3, 0, 99, 0],
        });
        assert_eq!(change, Some(ModelChange::RowsDeleted { first: 0, last: 3 }));
        assert_eq!(shared.snapshot().unwrap().len(), 2);
    }

    #[test]
    fn test_apply_move_keeps_other_fields() {
        let shared = route(2);
        shared.update(|route| route.positions[1].description = Some("summit".to_string()));

        let change = shared.apply(&MapEvent::MovePosition {
            index: 1,
            position: Position::new(5.0, 6.0),
        });
        assert_eq!(change, Some(ModelChange::RowsUpdated { first: 1, last: 1 }));
        let moved = &shared.snapshot().unwrap().positions[1];
        assert_eq!(moved.coordinates(), Some((5.0, 6.0)));
        assert_eq!(moved.description.as_deref(), Some("summit"));

        assert_eq!(
            shared.apply(&MapEvent::MovePosition {
                index: 9,
                position: Position::new(5.0, 6.0),
            }),
            None
        );
    }
}
