//! Typed browser callbacks
//!
//! Every callback body is a slash separated list of fields led by a kebab-case
//! kind. Coordinates travel as `<latitude>/<longitude>` in the browser's
//! (possibly datum-shifted) coordinate space.
//!
//! ```text
//! add-position/<lat>/<lng>
//! add-position-at/<index>/<lat>/<lng>
//! move-position/<index>/<lat>/<lng>
//! delete-position/<lat>/<lng>/<threshold>
//! select-position/<lat>/<lng>/<threshold>/<replace>
//! select-positions/<ne-lat>/<ne-lng>/<sw-lat>/<sw-lng>/<replace>
//! map-type-changed/<map-type>
//! zoom-changed/<zoom>
//! center-changed/<lat>/<lng>
//! callback-port/<port>
//! over-query-limit
//! zero-results
//! directions-load/<meters>/<seconds>
//! insert-waypoints-result/<after-index>/<lat>/<lng>[/<lat>/<lng>...]
//! ```

use std::fmt;

/// A coordinate exactly as reported by the browser.
///
/// Only the view bridge turns these into model positions, applying the
/// inverse datum correction on the way. An axis that failed to parse is
/// `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrowserCoordinate {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl BrowserCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    /// Parses a `<lat>`, `<lng>` field pair. Unparsable axes become `None`.
    pub fn parse(latitude: &str, longitude: &str) -> Self {
        Self {
            latitude: parse_double(latitude),
            longitude: parse_double(longitude),
        }
    }

    /// Returns `(longitude, latitude)` if both axes are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.longitude?, self.latitude?))
    }
}

fn parse_double(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

/// A parsed browser callback.
#[derive(Debug, Clone, PartialEq)]
pub enum MapCallback {
    /// Append a position at the end of the route
    AddPosition { coordinate: BrowserCoordinate },
    /// Insert a position at `index`
    AddPositionAt {
        index: usize,
        coordinate: BrowserCoordinate,
    },
    /// A position marker was dragged
    MovePosition {
        index: usize,
        coordinate: BrowserCoordinate,
    },
    /// Delete the position closest to `coordinate` within `threshold`
    DeletePosition {
        coordinate: BrowserCoordinate,
        threshold: f64,
    },
    /// Select the position closest to `coordinate` within `threshold`
    SelectPosition {
        coordinate: BrowserCoordinate,
        threshold: f64,
        replace: bool,
    },
    /// Select every position within a rectangle
    SelectPositions {
        northeast: BrowserCoordinate,
        southwest: BrowserCoordinate,
        replace: bool,
    },
    MapTypeChanged { map_type: String },
    ZoomChanged { zoom: u32 },
    CenterChanged { coordinate: BrowserCoordinate },
    /// The browser learned the listener port
    CallbackPort { port: u16 },
    /// Directions backend refused a request
    OverQueryLimit,
    /// Directions backend found no route
    ZeroResults,
    /// Directions finished loading with total distance and duration
    DirectionsLoad { meters: f64, seconds: f64 },
    /// Waypoints resolved by the directions backend, to insert after
    /// `after_index`
    InsertWaypointsResult {
        after_index: usize,
        coordinates: Vec<BrowserCoordinate>,
    },
}

impl MapCallback {
    /// Parses a callback body. Returns `None` for unknown kinds and for
    /// bodies whose integer or flag fields do not parse.
    pub fn parse(body: &str) -> Option<Self> {
        let body = body.trim().trim_matches('/');
        let mut parts = body.split('/');
        let kind = parts.next()?;
        let fields: Vec<&str> = parts.collect();

        let callback = match (kind, fields.as_slice()) {
            ("add-position", [lat, lng]) => MapCallback::AddPosition {
                coordinate: BrowserCoordinate::parse(lat, lng),
            },
            ("add-position-at", [index, lat, lng]) => MapCallback::AddPositionAt {
                index: index.parse().ok()?,
                coordinate: BrowserCoordinate::parse(lat, lng),
            },
            ("move-position", [index, lat, lng]) => MapCallback::MovePosition {
                index: index.parse().ok()?,
                coordinate: BrowserCoordinate::parse(lat, lng),
            },
            ("delete-position", [lat, lng, threshold]) => MapCallback::DeletePosition {
                coordinate: BrowserCoordinate::parse(lat, lng),
                threshold: parse_double(threshold)?,
            },
            ("select-position", [lat, lng, threshold, replace]) => MapCallback::SelectPosition {
                coordinate: BrowserCoordinate::parse(lat, lng),
                threshold: parse_double(threshold)?,
                replace: replace.parse().ok()?,
            },
            ("select-positions", [ne_lat, ne_lng, sw_lat, sw_lng, replace]) => {
                MapCallback::SelectPositions {
                    northeast: BrowserCoordinate::parse(ne_lat, ne_lng),
                    southwest: BrowserCoordinate::parse(sw_lat, sw_lng),
                    replace: replace.parse().ok()?,
                }
            }
            ("map-type-changed", [map_type]) if !map_type.is_empty() => MapCallback::MapTypeChanged {
                map_type: map_type.to_string(),
            },
            ("zoom-changed", [zoom]) => MapCallback::ZoomChanged {
                zoom: zoom.parse().ok()?,
            },
            ("center-changed", [lat, lng]) => MapCallback::CenterChanged {
                coordinate: BrowserCoordinate::parse(lat, lng),
            },
            ("callback-port", [port]) => MapCallback::CallbackPort {
                port: port.parse().ok()?,
            },
            ("over-query-limit", []) => MapCallback::OverQueryLimit,
            ("zero-results", []) => MapCallback::ZeroResults,
            ("directions-load", [meters, seconds]) => MapCallback::DirectionsLoad {
                meters: parse_double(meters)?,
                seconds: parse_double(seconds)?,
            },
            ("insert-waypoints-result", [after_index, coordinates @ ..])
                if !coordinates.is_empty() && coordinates.len() % 2 == 0 =>
            {
                MapCallback::InsertWaypointsResult {
                    after_index: after_index.parse().ok()?,
                    coordinates: coordinates
                        .chunks(2)
                        .map(|pair| BrowserCoordinate::parse(pair[0], pair[1]))
                        .collect(),
                }
            }
            _ => return None,
        };
        Some(callback)
    }

    /// Kebab-case kind, as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            MapCallback::AddPosition { .. } => "add-position",
            MapCallback::AddPositionAt { .. } => "add-position-at",
            MapCallback::MovePosition { .. } => "move-position",
            MapCallback::DeletePosition { .. } => "delete-position",
            MapCallback::SelectPosition { .. } => "select-position",
            MapCallback::SelectPositions { .. } => "select-positions",
            MapCallback::MapTypeChanged { .. } => "map-type-changed",
            MapCallback::ZoomChanged { .. } => "zoom-changed",
            MapCallback::CenterChanged { .. } => "center-changed",
            MapCallback::CallbackPort { .. } => "callback-port",
            MapCallback::OverQueryLimit => "over-query-limit",
            MapCallback::ZeroResults => "zero-results",
            MapCallback::DirectionsLoad { .. } => "directions-load",
            MapCallback::InsertWaypointsResult { .. } => "insert-waypoints-result",
        }
    }
}

impl fmt::Display for MapCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position_callbacks() {
        assert_eq!(
            MapCallback::parse("add-position/47.5/11.25"),
            Some(MapCallback::AddPosition {
                coordinate: BrowserCoordinate::new(47.5, 11.25)
            })
        );
        assert_eq!(
            MapCallback::parse("move-position/3/47.5/11.25"),
            Some(MapCallback::MovePosition {
                index: 3,
                coordinate: BrowserCoordinate::new(47.5, 11.25)
            })
        );
        assert_eq!(
            MapCallback::parse("add-position-at/0/-33.9/151.2"),
            Some(MapCallback::AddPositionAt {
                index: 0,
                coordinate: BrowserCoordinate::new(-33.9, 151.2)
            })
        );
    }

    #[test]
    fn test_unparsable_coordinate_axis_is_none() {
        let callback = MapCallback::parse("add-position/abc/11.25").unwrap();
        let MapCallback::AddPosition { coordinate } = callback else {
            panic!("unexpected callback {:?}", callback);
        };
        assert_eq!(coordinate.latitude, None);
        assert_eq!(coordinate.longitude, Some(11.25));
        assert_eq!(coordinate.coordinates(), None);
    }

    #[test]
    fn test_parse_selection_callbacks() {
        assert_eq!(
            MapCallback::parse("select-position/1.0/2.0/0.5/true"),
            Some(MapCallback::SelectPosition {
                coordinate: BrowserCoordinate::new(1.0, 2.0),
                threshold: 0.5,
                replace: true,
            })
        );
        assert_eq!(
            MapCallback::parse("select-positions/2/3/0/1/false"),
            Some(MapCallback::SelectPositions {
                northeast: BrowserCoordinate::new(2.0, 3.0),
                southwest: BrowserCoordinate::new(0.0, 1.0),
                replace: false,
            })
        );
        assert_eq!(MapCallback::parse("select-position/1.0/2.0/0.5/maybe"), None);
    }

    #[test]
    fn test_parse_map_state_callbacks() {
        assert_eq!(
            MapCallback::parse("zoom-changed/12"),
            Some(MapCallback::ZoomChanged { zoom: 12 })
        );
        assert_eq!(
            MapCallback::parse("map-type-changed/satellite"),
            Some(MapCallback::MapTypeChanged {
                map_type: "satellite".to_string()
            })
        );
        assert_eq!(
            MapCallback::parse("callback-port/49152"),
            Some(MapCallback::CallbackPort { port: 49152 })
        );
        assert_eq!(MapCallback::parse("over-query-limit"), Some(MapCallback::OverQueryLimit));
        assert_eq!(MapCallback::parse("zero-results/"), Some(MapCallback::ZeroResults));
        assert_eq!(
            MapCallback::parse("directions-load/1200.5/300"),
            Some(MapCallback::DirectionsLoad {
                meters: 1200.5,
                seconds: 300.0
            })
        );
    }

    #[test]
    fn test_parse_insert_waypoints() {
        let callback = MapCallback::parse("insert-waypoints-result/4/1/2/3/4").unwrap();
        assert_eq!(
            callback,
            MapCallback::InsertWaypointsResult {
                after_index: 4,
                coordinates: vec![BrowserCoordinate::new(1.0, 2.0), BrowserCoordinate::new(3.0, 4.0)],
            }
        );
        assert_eq!(MapCallback::parse("insert-waypoints-result/4/1/2/3"), None);
        assert_eq!(MapCallback::parse("insert-waypoints-result/4"), None);
    }

    #[test]
    fn test_malformed_bodies() {
        assert_eq!(MapCallback::parse(""), None);
        assert_eq!(MapCallback::parse("unknown/1/2"), None);
        assert_eq!(MapCallback::parse("zoom-changed/-1"), None);
        assert_eq!(MapCallback::parse("zoom-changed"), None);
        assert_eq!(MapCallback::parse("move-position/x/1/2"), None);
        assert_eq!(MapCallback::parse("callback-port/70000"), None);
        assert_eq!(MapCallback::parse("map-type-changed/"), None);
    }

    #[test]
    fn test_kind_round_trips_through_display() {
        let callback = MapCallback::parse("center-changed/1/2").unwrap();
        assert_eq!(callback.to_string(), "center-changed");
    }
}
