//! Position reducer
//!
//! Decimates position sequences to what the browser can render at the
//! current zoom level and viewport. Results are cached per zoom level until
//! the owner invalidates them.

use crate::sampling::{filter_every_nth, filter_in_area, IndexedPosition};
use crate::significance::filter_significant;
use mapbridge_core::config::ReducerConfig;
use mapbridge_core::types::{BoundingBox, Position, RouteCharacteristics};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Live zoom level and viewport of the map.
pub trait ViewportSource: Send + Sync {
    /// Current zoom level
    fn zoom(&self) -> u32;

    /// Currently visible area, if the map has reported one
    fn viewport(&self) -> Option<BoundingBox>;
}

/// Cached reduction for one zoom level.
#[derive(Debug, Clone)]
struct CacheEntry {
    characteristics: RouteCharacteristics,
    show_descriptions: bool,
    positions: Vec<Position>,
    filtered_area: Option<BoundingBox>,
}

/// Mutable reducer state.
#[derive(Debug, Default)]
struct ReductionState {
    cache: HashMap<u32, CacheEntry>,
    /// Inflated box the last render reduction was restricted to
    filtered_area: Option<BoundingBox>,
}

/// Reduces routes, tracks, waypoint lists and selections for rendering.
pub struct PositionReducer {
    config: ReducerConfig,
    viewport: Arc<dyn ViewportSource>,
    state: Mutex<ReductionState>,
}

impl PositionReducer {
    /// Create a new reducer reading zoom and viewport from `viewport`
    pub fn new(config: ReducerConfig, viewport: Arc<dyn ViewportSource>) -> Self {
        Self {
            config,
            viewport,
            state: Mutex::new(ReductionState::default()),
        }
    }

    pub fn config(&self) -> &ReducerConfig {
        &self.config
    }

    /// Reduces a position sequence for rendering with the given
    /// characteristics.
    ///
    /// Positions without coordinates are always dropped. Sequences shorter
    /// than one rendering segment are returned as they are; longer ones are
    /// reduced once per zoom level and served from the cache afterwards.
    pub fn reduce_for_render(
        &self,
        positions: &[Position],
        characteristics: RouteCharacteristics,
        show_descriptions: bool,
    ) -> Vec<Position> {
        let located: Vec<Position> = positions
            .iter()
            .filter(|position| position.has_coordinates())
            .cloned()
            .collect();

        if located.len() < self.config.segment_length(characteristics) {
            return located;
        }

        let zoom = self.viewport.zoom();
        {
            let mut state = self.state.lock();
            let hit = state.cache.get(&zoom).and_then(|entry| {
                (entry.characteristics == characteristics && entry.show_descriptions == show_descriptions)
                    .then(|| (entry.positions.clone(), entry.filtered_area))
            });
            if let Some((positions, filtered_area)) = hit {
                // the pan check must use the area this zoom level was cut to
                state.filtered_area = filtered_area;
                return positions;
            }
        }

        let start = Instant::now();
        let input_count = located.len();
        let (reduced, filtered_area) =
            self.reduce(located, zoom, characteristics, show_descriptions);

        debug!(
            characteristics = %characteristics,
            zoom,
            input = input_count,
            output = reduced.len(),
            visible_area_filtered = filtered_area.is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Reduced positions for rendering"
        );

        let mut state = self.state.lock();
        state.filtered_area = filtered_area;
        state.cache.insert(
            zoom,
            CacheEntry {
                characteristics,
                show_descriptions,
                positions: reduced.clone(),
                filtered_area,
            },
        );
        reduced
    }

    fn reduce(
        &self,
        mut positions: Vec<Position>,
        zoom: u32,
        characteristics: RouteCharacteristics,
        show_descriptions: bool,
    ) -> (Vec<Position>, Option<BoundingBox>) {
        let budget = self
            .config
            .maximum_position_count(characteristics, show_descriptions);

        // restrict large tracks and waypoint lists to the surroundings of the viewport
        let mut filtered_area = None;
        if positions.len() > budget && characteristics != RouteCharacteristics::Route {
            if let Some(area) = self.visible_area(self.config.visible_area_factor(zoom)) {
                positions = filter_in_area(&positions, &area, false);
                filtered_area = Some(area);
            }
        }

        // bound the cost of the significance computation
        let ceiling = self.config.maximum_significance_position_count;
        if positions.len() > ceiling {
            positions = filter_every_nth(&positions, ceiling);
        }

        if characteristics != RouteCharacteristics::Waypoints {
            if let Some(threshold) = self.config.significance_threshold(zoom) {
                positions = filter_significant(&positions, threshold);
            }
        }

        if positions.len() > budget {
            positions = filter_every_nth(&positions, budget);
        }

        (positions, filtered_area)
    }

    /// Reduces the selected positions for rendering selection markers.
    ///
    /// Indices outside `positions` and positions without coordinates are
    /// dropped; the order of `selected` is preserved.
    pub fn reduce_for_selection(&self, positions: &[Position], selected: &[usize]) -> Vec<Position> {
        self.reduce_selection(positions, selected)
            .into_iter()
            .map(|selected| selected.position)
            .collect()
    }

    /// Like [`reduce_for_selection`](Self::reduce_for_selection) but keeps
    /// each position's model index, which selection markers need to report
    /// drags back.
    pub fn reduce_selection(&self, positions: &[Position], selected: &[usize]) -> Vec<IndexedPosition> {
        let mut result: Vec<IndexedPosition> = selected
            .iter()
            .filter_map(|&index| {
                positions
                    .get(index)
                    .filter(|position| position.has_coordinates())
                    .map(|position| IndexedPosition {
                        index,
                        position: position.clone(),
                    })
            })
            .collect();

        let budget = self.config.maximum_selection_count;
        if result.len() > budget {
            if let Some(area) = self.visible_area(self.config.selection_visible_area_factor) {
                result = filter_in_area(&result, &area, true);
            }
        }

        if result.len() > budget {
            result = filter_every_nth(&result, budget);
        }
        result
    }

    /// Keeps the positions inside the current viewport inflated by
    /// `threshold_factor`, plus the neighbours of every visibility
    /// transition. Without a known viewport nothing is filtered.
    pub fn filter_visible(
        &self,
        positions: &[Position],
        threshold_factor: f64,
        include_endpoints: bool,
    ) -> Vec<Position> {
        match self.visible_area(threshold_factor) {
            Some(area) => filter_in_area(positions, &area, include_endpoints),
            None => positions.to_vec(),
        }
    }

    /// Uniformly down-samples to `max_count` positions, keeping first and last.
    pub fn filter_every_nth(&self, positions: &[Position], max_count: usize) -> Vec<Position> {
        filter_every_nth(positions, max_count)
    }

    /// True if the last render reduction did not filter by viewport, or if
    /// `bounds` lies within the area it was filtered to.
    pub fn is_within_visible_area(&self, bounds: &BoundingBox) -> bool {
        match self.state.lock().filtered_area {
            None => true,
            Some(area) => area.contains_box(bounds),
        }
    }

    /// True if the last render reduction was restricted to the viewport.
    pub fn has_filtered_visible_area(&self) -> bool {
        self.state.lock().filtered_area.is_some()
    }

    /// Drops every cached reduction.
    pub fn clear_cache(&self) {
        let mut state = self.state.lock();
        state.cache.clear();
        state.filtered_area = None;
    }

    /// Number of zoom levels currently cached.
    pub fn cached_zoom_levels(&self) -> usize {
        self.state.lock().cache.len()
    }

    fn visible_area(&self, factor: f64) -> Option<BoundingBox> {
        self.viewport.viewport().map(|bounds| bounds.inflate(factor))
    }
}
