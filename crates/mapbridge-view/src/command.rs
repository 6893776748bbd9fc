//! Script commands sent to the browser map
//!
//! Each [`MapCommand`] renders to one call of the map page's script API.
//! Coordinates are already in browser space when a command is built; see
//! [`ViewBridge`](crate::bridge::ViewBridge).

use mapbridge_callback::BrowserCoordinate;
use std::fmt::Write;

/// A marker to place on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub coordinate: BrowserCoordinate,
    /// Label shown next to the marker
    pub label: Option<String>,
    /// Icon name, e.g. a waypoint type
    pub icon: Option<String>,
}

/// A selected position with its model index.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionMarker {
    pub index: usize,
    pub coordinate: BrowserCoordinate,
}

/// Rendering command for the map page.
#[derive(Debug, Clone, PartialEq)]
pub enum MapCommand {
    Resize,
    SetCenter(BrowserCoordinate),
    FitBounds {
        northeast: BrowserCoordinate,
        southwest: BrowserCoordinate,
    },
    SetZoom(u32),
    SetMapType(String),
    /// Removes every route, track and waypoint overlay
    RemoveOverlays,
    AddMarkers(Vec<Marker>),
    AddPolyline {
        coordinates: Vec<BrowserCoordinate>,
        color: String,
        width: u32,
    },
    /// Requests directions along `coordinates`; `start_index` is the model
    /// index of the first one
    RenderDirections {
        coordinates: Vec<BrowserCoordinate>,
        start_index: usize,
    },
    SelectPositions(Vec<SelectionMarker>),
    RemoveSelectedPositions,
    /// Asks the page to call back to the listener on `port`
    CheckCallbackListener { port: u16 },
    /// Switches the page between sending and buffering callbacks
    SetPolling(bool),
}

impl MapCommand {
    /// Renders the command as a script statement.
    pub fn to_script(&self) -> String {
        match self {
            MapCommand::Resize => "resize();".to_string(),
            MapCommand::SetCenter(coordinate) => {
                format!("setCenter({});", format_coordinate(coordinate))
            }
            MapCommand::FitBounds { northeast, southwest } => format!(
                "fitBounds({},{});",
                format_coordinate(northeast),
                format_coordinate(southwest)
            ),
            MapCommand::SetZoom(zoom) => format!("setZoom({});", zoom),
            MapCommand::SetMapType(map_type) => format!("setMapType({});", quote(map_type)),
            MapCommand::RemoveOverlays => "removeOverlays();".to_string(),
            MapCommand::AddMarkers(markers) => {
                let mut script = String::from("addMarkers([");
                for (i, marker) in markers.iter().enumerate() {
                    if i > 0 {
                        script.push(',');
                    }
                    let _ = write!(
                        script,
                        "[{},{},{}]",
                        format_coordinate(&marker.coordinate),
                        quote_optional(marker.label.as_deref()),
                        quote_optional(marker.icon.as_deref())
                    );
                }
                script.push_str("]);");
                script
            }
            MapCommand::AddPolyline {
                coordinates,
                color,
                width,
            } => format!(
                "addPolyline({},{},{});",
                format_coordinates(coordinates),
                quote(color),
                width
            ),
            MapCommand::RenderDirections {
                coordinates,
                start_index,
            } => format!(
                "renderDirections({},{});",
                format_coordinates(coordinates),
                start_index
            ),
            MapCommand::SelectPositions(markers) => {
                let mut script = String::from("selectPositions([");
                for (i, marker) in markers.iter().enumerate() {
                    if i > 0 {
                        script.push(',');
                    }
                    let _ = write!(script, "[{},{}]", format_coordinate(&marker.coordinate), marker.index);
                }
                script.push_str("]);");
                script
            }
            MapCommand::RemoveSelectedPositions => "removeSelectedPositions();".to_string(),
            MapCommand::CheckCallbackListener { port } => format!("checkCallbackListener({});", port),
            MapCommand::SetPolling(enabled) => format!("setPolling({});", enabled),
        }
    }
}

/// Formats a number with at most 7 fraction digits, trailing zeros trimmed.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "null".to_string();
    }
    let formatted = format!("{:.7}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

fn format_axis(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_else(|| "null".to_string())
}

/// `lat,lng`, the argument order of the page API.
fn format_coordinate(coordinate: &BrowserCoordinate) -> String {
    format!(
        "{},{}",
        format_axis(coordinate.latitude),
        format_axis(coordinate.longitude)
    )
}

fn format_coordinates(coordinates: &[BrowserCoordinate]) -> String {
    let mut script = String::from("[");
    for (i, coordinate) in coordinates.iter().enumerate() {
        if i > 0 {
            script.push(',');
        }
        let _ = write!(script, "[{}]", format_coordinate(coordinate));
    }
    script.push(']');
    script
}

/// Escapes a string as a script string literal.
pub fn quote(value: &str) -> String {
    // JSON string literals are valid script string literals
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn quote_optional(value: Option<&str>) -> String {
    value.map(quote).unwrap_or_else(|| "null".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(47.0), "47");
        assert_eq!(format_number(11.25), "11.25");
        assert_eq!(format_number(1.123_456_789), "1.1234568");
        assert_eq!(format_number(-0.000_000_01), "0");
        assert_eq!(format_number(-33.9), "-33.9");
        assert_eq!(format_number(f64::NAN), "null");
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
        assert_eq!(quote("</script>"), "\"</script>\"");
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(MapCommand::Resize.to_script(), "resize();");
        assert_eq!(MapCommand::SetZoom(12).to_script(), "setZoom(12);");
        assert_eq!(
            MapCommand::SetCenter(BrowserCoordinate::new(48.1371, 11.5755)).to_script(),
            "setCenter(48.1371,11.5755);"
        );
        assert_eq!(
            MapCommand::SetMapType("satellite".to_string()).to_script(),
            "setMapType(\"satellite\");"
        );
        assert_eq!(
            MapCommand::CheckCallbackListener { port: 4711 }.to_script(),
            "checkCallbackListener(4711);"
        );
        assert_eq!(MapCommand::SetPolling(true).to_script(), "setPolling(true);");
    }

    #[test]
    fn test_collection_commands() {
        let polyline = MapCommand::AddPolyline {
            coordinates: vec![BrowserCoordinate::new(1.0, 2.0), BrowserCoordinate::new(3.5, 4.0)],
            color: "#C86DE1".to_string(),
            width: 2,
        };
        assert_eq!(polyline.to_script(), "addPolyline([[1,2],[3.5,4]],\"#C86DE1\",2);");

        let markers = MapCommand::AddMarkers(vec![Marker {
            coordinate: BrowserCoordinate::new(1.0, 2.0),
            label: Some("Caf\u{e9} \"Am Eck\"".to_string()),
            icon: None,
        }]);
        assert_eq!(
            markers.to_script(),
            "addMarkers([[1,2,\"Caf\u{e9} \\\"Am Eck\\\"\",null]]);"
        );

        let selection = MapCommand::SelectPositions(vec![
            SelectionMarker {
                index: 7,
                coordinate: BrowserCoordinate::new(1.0, 2.0),
            },
            SelectionMarker {
                index: 9,
                coordinate: BrowserCoordinate {
                    latitude: None,
                    longitude: Some(2.0),
                },
            },
        ]);
        assert_eq!(selection.to_script(), "selectPositions([[1,2,7],[null,2,9]]);");

        let directions = MapCommand::RenderDirections {
            coordinates: vec![BrowserCoordinate::new(1.0, 2.0)],
            start_index: 16,
        };
        assert_eq!(directions.to_script(), "renderDirections([[1,2]],16);");
    }
}
