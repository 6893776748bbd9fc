//! Model/browser coordinate bridge
//!
//! The only place where model positions become browser coordinates and
//! back. Every coordinate crosses the datum correction exactly once per
//! direction: [`ViewBridge::to_browser`] on the way out,
//! [`ViewBridge::from_browser`] on the way in.

use crate::command::{MapCommand, Marker, SelectionMarker};
use crate::correction::CoordinateCorrector;
use crate::state::MapState;
use mapbridge_callback::BrowserCoordinate;
use mapbridge_core::config::FixMapMode;
use mapbridge_core::types::{BoundingBox, Position};
use mapbridge_reduce::IndexedPosition;
use parking_lot::RwLock;
use std::sync::Arc;

pub struct ViewBridge {
    corrector: RwLock<CoordinateCorrector>,
    state: Arc<MapState>,
}

impl ViewBridge {
    pub fn new(corrector: CoordinateCorrector, state: Arc<MapState>) -> Self {
        Self {
            corrector: RwLock::new(corrector),
            state,
        }
    }

    pub fn set_fix_map_mode(&self, mode: FixMapMode, offset_map_types: Vec<String>) {
        *self.corrector.write() = CoordinateCorrector::new(mode, offset_map_types);
    }

    /// Model position to browser coordinate. `None` for positions without
    /// coordinates.
    pub fn to_browser(&self, position: &Position) -> Option<BrowserCoordinate> {
        let (longitude, latitude) = position.coordinates()?;
        let map_type = self.state.map_type();
        let (longitude, latitude) = self.corrector.read().correct(&map_type, longitude, latitude);
        Some(BrowserCoordinate::new(latitude, longitude))
    }

    /// Browser coordinate to model position. Coordinates missing an axis
    /// pass through uncorrected, keeping the missing axis `None`.
    pub fn from_browser(&self, coordinate: &BrowserCoordinate) -> Position {
        match coordinate.coordinates() {
            Some((longitude, latitude)) => {
                let map_type = self.state.map_type();
                let (longitude, latitude) = self.corrector.read().uncorrect(&map_type, longitude, latitude);
                Position::new(longitude, latitude)
            }
            None => Position::from_optional(coordinate.longitude, coordinate.latitude),
        }
    }

    /// Browser box corners to a model box.
    pub fn bounds_from_browser(
        &self,
        northeast: &BrowserCoordinate,
        southwest: &BrowserCoordinate,
    ) -> Option<BoundingBox> {
        let (east, north) = self.from_browser(northeast).coordinates()?;
        let (west, south) = self.from_browser(southwest).coordinates()?;
        BoundingBox::new(north, east, south, west)
    }

    pub fn coordinates(&self, positions: &[Position]) -> Vec<BrowserCoordinate> {
        positions.iter().filter_map(|position| self.to_browser(position)).collect()
    }

    /// Markers for waypoints, labelled with their descriptions if asked to.
    pub fn markers(&self, positions: &[Position], show_descriptions: bool) -> Vec<Marker> {
        positions
            .iter()
            .filter_map(|position| {
                Some(Marker {
                    coordinate: self.to_browser(position)?,
                    label: position.description.clone().filter(|_| show_descriptions),
                    icon: position.waypoint_type.as_ref().map(ToString::to_string),
                })
            })
            .collect()
    }

    pub fn selection_markers(&self, selection: &[IndexedPosition]) -> Vec<SelectionMarker> {
        selection
            .iter()
            .filter_map(|selected| {
                Some(SelectionMarker {
                    index: selected.index,
                    coordinate: self.to_browser(&selected.position)?,
                })
            })
            .collect()
    }

    pub fn set_center(&self, center: &Position) -> Option<MapCommand> {
        self.to_browser(center).map(MapCommand::SetCenter)
    }

    pub fn fit_bounds(&self, bounds: &BoundingBox) -> Option<MapCommand> {
        Some(MapCommand::FitBounds {
            northeast: self.to_browser(&bounds.northeast())?,
            southwest: self.to_browser(&bounds.southwest())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge(mode: FixMapMode) -> ViewBridge {
        let corrector = CoordinateCorrector::new(mode, vec!["roadmap".to_string()]);
        ViewBridge::new(corrector, Arc::new(MapState::new("roadmap")))
    }

    #[test]
    fn test_round_trip_is_exact_once() {
        let bridge = bridge(FixMapMode::Automatic);
        let beijing = Position::new(116.397_128, 39.916_527);

        let browser = bridge.to_browser(&beijing).unwrap();
        assert_ne!(browser.coordinates(), beijing.coordinates());

        let back = bridge.from_browser(&browser);
        let (lon, lat) = back.coordinates().unwrap();
        assert!((lon - 116.397_128).abs() < 1e-7);
        assert!((lat - 39.916_527).abs() < 1e-7);
    }

    #[test]
    fn test_map_type_switches_correction() {
        let state = Arc::new(MapState::new("roadmap"));
        let bridge = ViewBridge::new(
            CoordinateCorrector::new(FixMapMode::Automatic, vec!["roadmap".to_string()]),
            Arc::clone(&state),
        );
        let beijing = Position::new(116.397_128, 39.916_527);
        state.set_map_type("satellite");
        assert_eq!(
            bridge.to_browser(&beijing),
            Some(BrowserCoordinate::new(39.916_527, 116.397_128))
        );
    }

    #[test]
    fn test_missing_axes() {
        let bridge = bridge(FixMapMode::Always);
        assert_eq!(bridge.to_browser(&Position::default()), None);

        let partial = BrowserCoordinate {
            latitude: None,
            longitude: Some(116.0),
        };
        let position = bridge.from_browser(&partial);
        assert_eq!(position.longitude, Some(116.0));
        assert_eq!(position.latitude, None);
    }

    #[test]
    fn test_markers_and_selection() {
        let bridge = bridge(FixMapMode::Never);
        let positions = vec![
            Position::new(1.0, 2.0).with_description("hut"),
            Position::default(),
            Position::new(3.0, 4.0).with_waypoint_type(mapbridge_core::WaypointType::Voice),
        ];

        let plain = bridge.markers(&positions, false);
        assert_eq!(plain.len(), 2);
        assert_eq!(plain[0].label, None);
        assert_eq!(plain[1].icon.as_deref(), Some("voice"));

        let labelled = bridge.markers(&positions, true);
        assert_eq!(labelled[0].label.as_deref(), Some("hut"));

        let selection = bridge.selection_markers(&[IndexedPosition {
            index: 2,
            position: positions[2].clone(),
        }]);
        assert_eq!(selection[0].index, 2);
        assert_eq!(selection[0].coordinate, BrowserCoordinate::new(4.0, 3.0));
    }

    #[test]
    fn test_bounds_from_browser() {
        let bridge = bridge(FixMapMode::Never);
        let bounds = bridge
            .bounds_from_browser(&BrowserCoordinate::new(2.0, 3.0), &BrowserCoordinate::new(0.0, 1.0))
            .unwrap();
        assert_eq!(bounds.north(), 2.0);
        assert_eq!(bounds.east(), 3.0);
        assert_eq!(bounds.south(), 0.0);
        assert_eq!(bounds.west(), 1.0);
    }
}
