//! Douglas-Peucker significance filtering
//!
//! Keeps the positions whose deviation from the simplified path exceeds a
//! distance threshold in meters. Runs on an explicit work stack so that very
//! long tracks cannot overflow the call stack.

use mapbridge_core::types::Position;

/// Mean earth radius in meters
const EARTH_RADIUS: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates in meters.
pub fn haversine_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Distance in meters from a point to the segment `start..end`.
///
/// Projects onto a local equirectangular plane centered on the segment,
/// which is accurate at the segment lengths the thresholds care about.
pub fn distance_to_segment(point: (f64, f64), start: (f64, f64), end: (f64, f64)) -> f64 {
    let mean_lat = ((start.1 + end.1) / 2.0).to_radians();
    let meters_per_degree = EARTH_RADIUS * std::f64::consts::PI / 180.0;
    let scale_x = meters_per_degree * mean_lat.cos();

    let to_plane = |(lon, lat): (f64, f64)| ((lon - start.0) * scale_x, (lat - start.1) * meters_per_degree);
    let (px, py) = to_plane(point);
    let (ex, ey) = to_plane(end);

    let length_sq = ex * ex + ey * ey;
    if length_sq < 1e-6 {
        return haversine_distance(point.0, point.1, start.0, start.1);
    }

    let t = ((px * ex + py * ey) / length_sq).clamp(0.0, 1.0);
    let dx = px - t * ex;
    let dy = py - t * ey;
    (dx * dx + dy * dy).sqrt()
}

/// Returns the indices of the significant positions, first and last always
/// included, in ascending order.
///
/// Positions without coordinates never become significant.
pub fn significant_indices<T: AsRef<Position>>(positions: &[T], threshold: f64) -> Vec<usize> {
    let count = positions.len();
    if count <= 2 {
        return (0..count).collect();
    }

    let mut keep = vec![false; count];
    keep[0] = true;
    keep[count - 1] = true;

    let mut stack = vec![(0usize, count - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }

        let (Some(first), Some(last)) = (
            positions[start].as_ref().coordinates(),
            positions[end].as_ref().coordinates(),
        ) else {
            continue;
        };

        let mut max_distance = 0.0;
        let mut max_index = start;
        for (index, position) in positions.iter().enumerate().take(end).skip(start + 1) {
            if let Some(point) = position.as_ref().coordinates() {
                let distance = distance_to_segment(point, first, last);
                if distance > max_distance {
                    max_distance = distance;
                    max_index = index;
                }
            }
        }

        if max_distance > threshold {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }

    keep.iter()
        .enumerate()
        .filter_map(|(index, &kept)| kept.then_some(index))
        .collect()
}

/// Filters positions down to the significant ones.
pub fn filter_significant<T: AsRef<Position> + Clone>(positions: &[T], threshold: f64) -> Vec<T> {
    significant_indices(positions, threshold)
        .into_iter()
        .map(|index| positions[index].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = haversine_distance(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111_195.0).abs() < 10.0);
    }

    #[test]
    fn test_distance_to_segment() {
        // 0.001 degree north of the equator segment is roughly 111 meters
        let d = distance_to_segment((0.5, 0.001), (0.0, 0.0), (1.0, 0.0));
        assert!((d - 111.2).abs() < 1.0);

        // beyond the segment end the distance is to the end point
        let d = distance_to_segment((2.0, 0.0), (0.0, 0.0), (1.0, 0.0));
        assert!((d - 111_195.0).abs() < 100.0);
    }

    #[test]
    fn test_straight_line_collapses() {
        let positions: Vec<Position> = (0..10).map(|i| Position::new(i as f64 * 0.001, 0.0)).collect();
        assert_eq!(significant_indices(&positions, 1.0), vec![0, 9]);
    }

    #[test]
    fn test_corner_is_kept() {
        let positions = vec![
            Position::new(0.0, 0.0),
            Position::new(0.01, 0.0),
            Position::new(0.02, 0.0),
            Position::new(0.02, 0.01),
            Position::new(0.02, 0.02),
        ];
        assert_eq!(significant_indices(&positions, 10.0), vec![0, 2, 4]);
    }

    #[test]
    fn test_threshold_controls_detail() {
        // zigzag with ~111m amplitude
        let positions: Vec<Position> = (0..20)
            .map(|i| Position::new(i as f64 * 0.01, if i % 2 == 0 { 0.0 } else { 0.001 }))
            .collect();
        assert_eq!(significant_indices(&positions, 10.0).len(), 20);
        assert_eq!(significant_indices(&positions, 1_000.0).len(), 2);
    }

    #[test]
    fn test_small_inputs() {
        let empty: Vec<Position> = Vec::new();
        assert!(significant_indices(&empty, 1.0).is_empty());
        let two = vec![Position::new(0.0, 0.0), Position::new(1.0, 1.0)];
        assert_eq!(filter_significant(&two, 1.0), two);
    }
}
