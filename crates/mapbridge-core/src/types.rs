//! Core types for the mapbridge browser-map core.
//!
//! Defines the position and route model shared by the reducer, the callback
//! channel and the view, together with the geographic bounding box used for
//! viewport filtering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format-specific tag describing what a position marks on a route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointType {
    /// First position of a route
    Start,
    /// Last position of a route
    End,
    /// Voice instruction point
    Voice,
    /// Plain waypoint
    Waypoint,
    /// Any other format-specific tag
    Other(String),
}

impl fmt::Display for WaypointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaypointType::Start => write!(f, "start"),
            WaypointType::End => write!(f, "end"),
            WaypointType::Voice => write!(f, "voice"),
            WaypointType::Waypoint => write!(f, "waypoint"),
            WaypointType::Other(tag) => write!(f, "{}", tag),
        }
    }
}

/// A single GPS position.
///
/// Coordinates are optional: positions read from some formats or parsed from
/// a malformed browser callback may lack one or both axes. Such positions are
/// skipped by everything that renders or measures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    #[serde(default)]
    pub elevation: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub waypoint_type: Option<WaypointType>,
}

impl Position {
    /// Creates a position from longitude and latitude.
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude: Some(longitude),
            latitude: Some(latitude),
            ..Default::default()
        }
    }

    /// Creates a position whose axes may be missing.
    pub fn from_optional(longitude: Option<f64>, latitude: Option<f64>) -> Self {
        Self {
            longitude,
            latitude,
            ..Default::default()
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the waypoint type tag.
    pub fn with_waypoint_type(mut self, waypoint_type: WaypointType) -> Self {
        self.waypoint_type = Some(waypoint_type);
        self
    }

    /// Sets the elevation in meters.
    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    /// Returns true if both coordinates are present and finite.
    #[inline]
    pub fn has_coordinates(&self) -> bool {
        matches!(
            (self.longitude, self.latitude),
            (Some(lon), Some(lat)) if lon.is_finite() && lat.is_finite()
        )
    }

    /// Returns `(longitude, latitude)` if both are usable.
    #[inline]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        if self.has_coordinates() {
            Some((self.longitude?, self.latitude?))
        } else {
            None
        }
    }
}

impl AsRef<Position> for Position {
    fn as_ref(&self) -> &Position {
        self
    }
}

/// Rendering and semantic treatment of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteCharacteristics {
    /// Turn-by-turn route resolved through a directions backend
    Route,
    /// Raw GPS trace drawn as a polyline
    Track,
    /// Discrete points of interest drawn as markers
    Waypoints,
}

impl fmt::Display for RouteCharacteristics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteCharacteristics::Route => write!(f, "Route"),
            RouteCharacteristics::Track => write!(f, "Track"),
            RouteCharacteristics::Waypoints => write!(f, "Waypoints"),
        }
    }
}

/// An ordered position sequence with its characteristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub characteristics: RouteCharacteristics,
    #[serde(default)]
    pub positions: Vec<Position>,
}

impl Route {
    /// Creates a route.
    pub fn new(characteristics: RouteCharacteristics, positions: Vec<Position>) -> Self {
        Self {
            characteristics,
            positions,
        }
    }

    /// Creates an empty route with the given characteristics.
    pub fn empty(characteristics: RouteCharacteristics) -> Self {
        Self::new(characteristics, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Geographic bounding box given by its northeast and southwest corners.
///
/// Boxes never wrap the antimeridian: `east >= west` and `north >= south`
/// hold for every constructed value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    north: f64,
    east: f64,
    south: f64,
    west: f64,
}

impl BoundingBox {
    /// Creates a bounding box from its corners.
    ///
    /// Returns `None` if the corners are inverted or not finite.
    pub fn new(north: f64, east: f64, south: f64, west: f64) -> Option<Self> {
        let finite = [north, east, south, west].iter().all(|v| v.is_finite());
        if !finite || north < south || east < west {
            return None;
        }
        Some(Self {
            north,
            east,
            south,
            west,
        })
    }

    /// Creates the smallest box containing every position with coordinates.
    pub fn from_positions<'a, I>(positions: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Position>,
    {
        let mut bounds: Option<(f64, f64, f64, f64)> = None;
        for (lon, lat) in positions.into_iter().filter_map(Position::coordinates) {
            bounds = Some(match bounds {
                None => (lat, lon, lat, lon),
                Some((n, e, s, w)) => (n.max(lat), e.max(lon), s.min(lat), w.min(lon)),
            });
        }
        bounds.and_then(|(n, e, s, w)| Self::new(n, e, s, w))
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    /// Northeast corner as a position.
    pub fn northeast(&self) -> Position {
        Position::new(self.east, self.north)
    }

    /// Southwest corner as a position.
    pub fn southwest(&self) -> Position {
        Position::new(self.west, self.south)
    }

    /// Center of the box.
    pub fn center(&self) -> Position {
        Position::new(
            (self.east + self.west) / 2.0,
            (self.north + self.south) / 2.0,
        )
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Checks if coordinates are within the bounding box.
    #[inline]
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        latitude >= self.south
            && latitude <= self.north
            && longitude >= self.west
            && longitude <= self.east
    }

    /// Checks if a position is within the box. Positions without
    /// coordinates are never contained.
    #[inline]
    pub fn contains_position(&self, position: &Position) -> bool {
        position
            .coordinates()
            .is_some_and(|(lon, lat)| self.contains(lon, lat))
    }

    /// Checks if another box lies entirely within this one.
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.north <= self.north
            && other.south >= self.south
            && other.east <= self.east
            && other.west >= self.west
    }

    /// Grows the box by `factor` times its width and height on every side.
    ///
    /// Latitudes are clamped to ±90 and longitudes to ±180.
    pub fn inflate(&self, factor: f64) -> Self {
        let dx = self.width() * factor;
        let dy = self.height() * factor;
        Self {
            north: (self.north + dy).min(90.0),
            east: (self.east + dx).min(180.0),
            south: (self.south - dy).max(-90.0),
            west: (self.west - dx).max(-180.0),
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.6},{:.6} .. {:.6},{:.6}]",
            self.south, self.west, self.north, self.east
        )
    }
}
