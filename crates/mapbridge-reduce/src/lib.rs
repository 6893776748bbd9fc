//! # mapbridge reduce
//!
//! Decimation of position sequences for rendering in the browser map.
//!
//! ## Pipeline
//!
//! ```text
//! positions ──► drop missing coordinates ──► viewport filter (tracks, waypoints)
//!                                                   │
//!        cache ◄── every-nth budget ◄── significance (routes, tracks)
//! ```
//!
//! - [`significance`]: iterative Douglas-Peucker with a per-zoom threshold
//! - [`sampling`]: viewport filter keeping transition neighbours and uniform
//!   every-nth down-sampling
//! - [`reducer`]: the [`PositionReducer`] tying both together with a per-zoom
//!   cache

pub mod reducer;
pub mod sampling;
pub mod significance;

pub use reducer::{PositionReducer, ViewportSource};
pub use sampling::{filter_every_nth, filter_in_area, IndexedPosition};
pub use significance::{filter_significant, significant_indices};
