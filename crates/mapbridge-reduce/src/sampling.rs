//! Viewport and uniform down-sampling filters
//!
//! Both filters are generic over anything that dereferences to a
//! [`Position`], so the reducer can run them on plain positions as well as on
//! positions tagged with their model index.

use mapbridge_core::types::{BoundingBox, Position};

/// A position together with its index in the model sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPosition {
    pub index: usize,
    pub position: Position,
}

impl AsRef<Position> for IndexedPosition {
    fn as_ref(&self) -> &Position {
        &self.position
    }
}

/// Keeps the positions inside `area` plus the outside position adjacent to
/// every visibility transition, so polylines crossing the area edge stay
/// connected.
///
/// Entering the area keeps the preceding outside position, leaving it keeps
/// the first outside position. With `include_endpoints` the first and last
/// positions are always kept. No position is emitted twice.
pub fn filter_in_area<T: AsRef<Position> + Clone>(
    positions: &[T],
    area: &BoundingBox,
    include_endpoints: bool,
) -> Vec<T> {
    let count = positions.len();
    if count == 0 {
        return Vec::new();
    }

    let (first, end) = if include_endpoints {
        (1, count.saturating_sub(1))
    } else {
        (0, count)
    };

    let mut kept: Vec<usize> = Vec::new();
    if include_endpoints {
        kept.push(0);
    }

    let mut previous: Option<(usize, bool)> = None;
    for index in first..end {
        let visible = area.contains_position(positions[index].as_ref());
        match previous {
            Some((previous_index, false)) if visible => push_unique(&mut kept, previous_index),
            Some((_, true)) if !visible => push_unique(&mut kept, index),
            _ => {}
        }
        if visible {
            push_unique(&mut kept, index);
        }
        previous = Some((index, visible));
    }

    if include_endpoints && count > 1 {
        push_unique(&mut kept, count - 1);
    }

    kept.into_iter().map(|index| positions[index].clone()).collect()
}

fn push_unique(kept: &mut Vec<usize>, index: usize) {
    if kept.last() != Some(&index) {
        kept.push(index);
    }
}

/// Uniformly down-samples to `max_count` elements.
///
/// The first and last elements are always kept. The `max_count - 2` interior
/// elements are picked with the real-valued increment `(n-1)/(max_count-1)`,
/// accumulated in floating point and truncated to an index at each step.
/// Inputs that already fit are returned unchanged.
pub fn filter_every_nth<T: Clone>(positions: &[T], max_count: usize) -> Vec<T> {
    let count = positions.len();
    if count <= max_count {
        return positions.to_vec();
    }
    match max_count {
        0 => return Vec::new(),
        1 => return vec![positions[0].clone()],
        _ => {}
    }

    let increment = (count - 1) as f64 / (max_count - 1) as f64;
    let mut result = Vec::with_capacity(max_count);
    result.push(positions[0].clone());

    let mut index = increment;
    for _ in 0..max_count - 2 {
        result.push(positions[(index as usize).min(count - 2)].clone());
        index += increment;
    }

    result.push(positions[count - 1].clone());
    result
}
