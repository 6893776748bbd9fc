//! Datum correction for offset map tiles
//!
//! Tiles of some map types inside mainland China are deliberately shifted
//! from WGS84 (the GCJ-02 datum). Positions are shifted the same way before
//! they reach the browser, and shifted back when the browser reports them.

use mapbridge_core::config::{FixMapMode, ViewConfig};
use std::f64::consts::PI;

/// Semi-major axis of the Krasovsky 1940 ellipsoid
const SEMI_MAJOR_AXIS: f64 = 6_378_245.0;

/// Eccentricity squared of the Krasovsky 1940 ellipsoid
const ECCENTRICITY_SQUARED: f64 = 0.006_693_421_622_965_943;

/// Convergence threshold of the inverse in degrees
const INVERSE_TOLERANCE: f64 = 1e-10;

const INVERSE_MAX_ITERATIONS: usize = 30;

/// True if the coordinate lies in the offset region.
pub fn is_in_correction_region(longitude: f64, latitude: f64) -> bool {
    (72.004..=137.8347).contains(&longitude) && (0.8293..=55.8271).contains(&latitude)
}

fn transform_latitude(x: f64, y: f64) -> f64 {
    let mut result = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    result += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    result += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    result += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    result
}

fn transform_longitude(x: f64, y: f64) -> f64 {
    let mut result = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    result += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    result += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    result += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    result
}

/// Offset `(d_longitude, d_latitude)` at a WGS84 coordinate.
fn offset(longitude: f64, latitude: f64) -> (f64, f64) {
    let d_latitude = transform_latitude(longitude - 105.0, latitude - 35.0);
    let d_longitude = transform_longitude(longitude - 105.0, latitude - 35.0);

    let rad_latitude = latitude / 180.0 * PI;
    let magic = 1.0 - ECCENTRICITY_SQUARED * rad_latitude.sin().powi(2);
    let sqrt_magic = magic.sqrt();

    let d_latitude =
        (d_latitude * 180.0) / ((SEMI_MAJOR_AXIS * (1.0 - ECCENTRICITY_SQUARED)) / (magic * sqrt_magic) * PI);
    let d_longitude = (d_longitude * 180.0) / (SEMI_MAJOR_AXIS / sqrt_magic * rad_latitude.cos() * PI);
    (d_longitude, d_latitude)
}

/// Shifts a WGS84 coordinate into the offset datum. Identity outside the
/// correction region.
pub fn wgs84_to_offset(longitude: f64, latitude: f64) -> (f64, f64) {
    if !is_in_correction_region(longitude, latitude) {
        return (longitude, latitude);
    }
    let (d_longitude, d_latitude) = offset(longitude, latitude);
    (longitude + d_longitude, latitude + d_latitude)
}

/// Inverse of [`wgs84_to_offset`] by fixed-point iteration.
pub fn offset_to_wgs84(longitude: f64, latitude: f64) -> (f64, f64) {
    if !is_in_correction_region(longitude, latitude) {
        return (longitude, latitude);
    }

    let (d_longitude, d_latitude) = offset(longitude, latitude);
    let mut guess = (longitude - d_longitude, latitude - d_latitude);
    for _ in 0..INVERSE_MAX_ITERATIONS {
        let forward = wgs84_to_offset(guess.0, guess.1);
        let error = (longitude - forward.0, latitude - forward.1);
        guess = (guess.0 + error.0, guess.1 + error.1);
        if error.0.abs() < INVERSE_TOLERANCE && error.1.abs() < INVERSE_TOLERANCE {
            break;
        }
    }
    guess
}

/// Decides per map type whether coordinates need the datum offset.
#[derive(Debug, Clone)]
pub struct CoordinateCorrector {
    mode: FixMapMode,
    offset_map_types: Vec<String>,
}

impl CoordinateCorrector {
    pub fn new(mode: FixMapMode, offset_map_types: Vec<String>) -> Self {
        Self {
            mode,
            offset_map_types,
        }
    }

    pub fn from_config(config: &ViewConfig) -> Self {
        Self::new(config.fix_map_mode, config.offset_map_types.clone())
    }

    /// True if tiles of `map_type` are offset and must be corrected.
    pub fn applies_to(&self, map_type: &str) -> bool {
        match self.mode {
            FixMapMode::Always => true,
            FixMapMode::Never => false,
            FixMapMode::Automatic => self
                .offset_map_types
                .iter()
                .any(|offset_type| offset_type.eq_ignore_ascii_case(map_type)),
        }
    }

    /// Model coordinate to browser coordinate.
    pub fn correct(&self, map_type: &str, longitude: f64, latitude: f64) -> (f64, f64) {
        if self.applies_to(map_type) {
            wgs84_to_offset(longitude, latitude)
        } else {
            (longitude, latitude)
        }
    }

    /// Browser coordinate to model coordinate.
    pub fn uncorrect(&self, map_type: &str, longitude: f64, latitude: f64) -> (f64, f64) {
        if self.applies_to(map_type) {
            offset_to_wgs84(longitude, latitude)
        } else {
            (longitude, latitude)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BEIJING: (f64, f64) = (116.397_128, 39.916_527);

    #[test]
    fn test_offset_inside_region() {
        let (lon, lat) = wgs84_to_offset(BEIJING.0, BEIJING.1);
        // the shift is a few hundred meters
        assert!((lon - BEIJING.0).abs() > 1e-3 && (lon - BEIJING.0).abs() < 1e-2);
        assert!((lat - BEIJING.1).abs() > 1e-4 && (lat - BEIJING.1).abs() < 1e-2);
    }

    #[test]
    fn test_identity_outside_region() {
        let munich = (11.575_5, 48.137_1);
        assert_eq!(wgs84_to_offset(munich.0, munich.1), munich);
        assert_eq!(offset_to_wgs84(munich.0, munich.1), munich);
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        for (lon, lat) in [BEIJING, (121.473_7, 31.230_4), (113.264_4, 23.129_1), (87.616_8, 43.825_6)] {
            let (shifted_lon, shifted_lat) = wgs84_to_offset(lon, lat);
            let (back_lon, back_lat) = offset_to_wgs84(shifted_lon, shifted_lat);
            assert!((back_lon - lon).abs() < 1e-7, "longitude {} -> {}", lon, back_lon);
            assert!((back_lat - lat).abs() < 1e-7, "latitude {} -> {}", lat, back_lat);
        }
    }

    #[test]
    fn test_corrector_modes() {
        let types = vec!["roadmap".to_string(), "terrain".to_string()];

        let automatic = CoordinateCorrector::new(FixMapMode::Automatic, types.clone());
        assert!(automatic.applies_to("roadmap"));
        assert!(automatic.applies_to("ROADMAP"));
        assert!(!automatic.applies_to("satellite"));
        assert_eq!(automatic.correct("satellite", BEIJING.0, BEIJING.1), BEIJING);
        assert_ne!(automatic.correct("roadmap", BEIJING.0, BEIJING.1), BEIJING);

        let always = CoordinateCorrector::new(FixMapMode::Always, Vec::new());
        assert!(always.applies_to("satellite"));

        let never = CoordinateCorrector::new(FixMapMode::Never, types);
        assert!(!never.applies_to("roadmap"));
        assert_eq!(never.uncorrect("roadmap", BEIJING.0, BEIJING.1), BEIJING);
    }
}
