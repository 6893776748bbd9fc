//! Live map state
//!
//! Zoom, center, size and map type as last reported by the browser, plus
//! the directions counters. The viewport box is derived from center, zoom
//! and size using the Web Mercator tiling every browser map uses.

use mapbridge_core::types::{BoundingBox, Position};
use mapbridge_reduce::ViewportSource;
use parking_lot::RwLock;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};

/// Edge length of a map tile in pixels
const TILE_SIZE: f64 = 256.0;

/// Web Mercator latitude limit
const MAX_LATITUDE: f64 = 85.051_128_78;

/// Initial zoom level before the browser reports one
pub const DEFAULT_ZOOM: u32 = 1;

#[derive(Debug, Clone)]
struct ViewState {
    zoom: u32,
    center: Option<Position>,
    size: Option<(u32, u32)>,
    map_type: String,
    callback_port: Option<u16>,
    last_directions: Option<(f64, f64)>,
}

/// Map state shared by the view, the reducer and the dispatcher.
#[derive(Debug)]
pub struct MapState {
    view: RwLock<ViewState>,
    over_query_limit: AtomicU64,
    zero_results: AtomicU64,
}

impl MapState {
    pub fn new(initial_map_type: impl Into<String>) -> Self {
        Self {
            view: RwLock::new(ViewState {
                zoom: DEFAULT_ZOOM,
                center: None,
                size: None,
                map_type: initial_map_type.into(),
                callback_port: None,
                last_directions: None,
            }),
            over_query_limit: AtomicU64::new(0),
            zero_results: AtomicU64::new(0),
        }
    }

    pub fn zoom(&self) -> u32 {
        self.view.read().zoom
    }

    pub fn set_zoom(&self, zoom: u32) {
        self.view.write().zoom = zoom;
    }

    /// Map center in model coordinates.
    pub fn center(&self) -> Option<Position> {
        self.view.read().center.clone()
    }

    pub fn set_center(&self, center: Position) {
        self.view.write().center = center.has_coordinates().then_some(center);
    }

    /// Map size in pixels.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.view.read().size
    }

    pub fn set_size(&self, width: u32, height: u32) {
        self.view.write().size = (width > 0 && height > 0).then_some((width, height));
    }

    pub fn map_type(&self) -> String {
        self.view.read().map_type.clone()
    }

    pub fn set_map_type(&self, map_type: impl Into<String>) {
        self.view.write().map_type = map_type.into();
    }

    /// Port the browser reported it calls back to.
    pub fn callback_port(&self) -> Option<u16> {
        self.view.read().callback_port
    }

    pub fn set_callback_port(&self, port: u16) {
        self.view.write().callback_port = Some(port);
    }

    /// Distance in meters and duration in seconds of the last directions.
    pub fn last_directions(&self) -> Option<(f64, f64)> {
        self.view.read().last_directions
    }

    pub fn set_last_directions(&self, meters: f64, seconds: f64) {
        self.view.write().last_directions = Some((meters, seconds));
    }

    pub fn record_over_query_limit(&self) -> u64 {
        self.over_query_limit.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_zero_results(&self) -> u64 {
        self.zero_results.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn over_query_limit_count(&self) -> u64 {
        self.over_query_limit.load(Ordering::Relaxed)
    }

    pub fn zero_results_count(&self) -> u64 {
        self.zero_results.load(Ordering::Relaxed)
    }

    /// Visible area in model coordinates, once center and size are known.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let view = self.view.read();
        let (longitude, latitude) = view.center.as_ref()?.coordinates()?;
        let (width, height) = view.size?;
        viewport_bounds(longitude, latitude, view.zoom, width, height)
    }
}

impl ViewportSource for MapState {
    fn zoom(&self) -> u32 {
        MapState::zoom(self)
    }

    fn viewport(&self) -> Option<BoundingBox> {
        self.bounds()
    }
}

/// Visible box of a `width` x `height` pixel map centered on a coordinate.
///
/// Longitudes are clamped to ±180 rather than wrapped.
pub fn viewport_bounds(longitude: f64, latitude: f64, zoom: u32, width: u32, height: u32) -> Option<BoundingBox> {
    let world = TILE_SIZE * 2f64.powi(zoom.min(30) as i32);

    let half_width = width as f64 / world * 360.0 / 2.0;
    let west = (longitude - half_width).max(-180.0);
    let east = (longitude + half_width).min(180.0);

    let center_y = latitude_to_pixel(latitude, world);
    let north = pixel_to_latitude(center_y - height as f64 / 2.0, world);
    let south = pixel_to_latitude(center_y + height as f64 / 2.0, world);

    BoundingBox::new(north, east, south, west)
}

fn latitude_to_pixel(latitude: f64, world: f64) -> f64 {
    let phi = latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    (1.0 - (phi.tan() + 1.0 / phi.cos()).ln() / PI) / 2.0 * world
}

fn pixel_to_latitude(y: f64, world: f64) -> f64 {
    let y = y.clamp(0.0, world);
    (PI * (1.0 - 2.0 * y / world)).sinh().atan().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_need_center_and_size() {
        let state = MapState::new("roadmap");
        assert!(state.bounds().is_none());
        state.set_center(Position::new(11.0, 48.0));
        assert!(state.bounds().is_none());
        state.set_size(800, 600);
        assert!(state.bounds().is_some());
        state.set_size(0, 600);
        assert!(state.bounds().is_none());
    }

    #[test]
    fn test_viewport_bounds_at_equator() {
        // zoom 0: the whole 256px world is 360 degrees wide
        let bounds = viewport_bounds(0.0, 0.0, 0, 128, 128).unwrap();
        assert!((bounds.east() - 90.0).abs() < 1e-9);
        assert!((bounds.west() + 90.0).abs() < 1e-9);
        assert!(bounds.north() > 0.0 && (bounds.north() + bounds.south()).abs() < 1e-9);

        let bounds = viewport_bounds(0.0, 0.0, 1, 128, 128).unwrap();
        assert!((bounds.east() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_viewport_bounds_clamp() {
        let bounds = viewport_bounds(170.0, 80.0, 0, 1024, 1024).unwrap();
        assert_eq!(bounds.east(), 180.0);
        assert_eq!(bounds.west(), -180.0);
        assert!(bounds.north() <= MAX_LATITUDE + 1e-9);
        assert!(bounds.south() >= -MAX_LATITUDE - 1e-9);
    }

    #[test]
    fn test_counters() {
        let state = MapState::new("roadmap");
        assert_eq!(state.record_over_query_limit(), 1);
        assert_eq!(state.record_over_query_limit(), 2);
        state.record_zero_results();
        assert_eq!(state.over_query_limit_count(), 2);
        assert_eq!(state.zero_results_count(), 1);
    }

    #[test]
    fn test_viewport_source() {
        let state = MapState::new("roadmap");
        state.set_zoom(12);
        let source: &dyn ViewportSource = &state;
        assert_eq!(source.zoom(), 12);
        assert!(source.viewport().is_none());
    }
}
