//! # mapbridge core
//!
//! Core types, error handling, and configuration for the mapbridge
//! browser-map synchronization core.
//!
//! - **Types**: `Position`, `Route`, `RouteCharacteristics` and the
//!   antimeridian-free `BoundingBox` used for viewport filtering.
//! - **Errors**: `thiserror` enums for configuration, callback channel and
//!   browser engine failures, folded into `MapError`.
//! - **Engine**: the `MapEngine` trait scripts are sent through, plus a
//!   recording implementation for headless runs.
//! - **Configuration**: every reducer, scheduler and listener threshold as a
//!   named field with a default, loadable from YAML with environment
//!   overrides.
//!
//! ## Example
//!
//! ```
//! use mapbridge_core::types::{BoundingBox, Position};
//!
//! let positions = vec![Position::new(10.0, 50.0), Position::new(11.0, 51.0)];
//! let bbox = BoundingBox::from_positions(&positions).unwrap();
//! assert!(bbox.contains_position(&Position::new(10.5, 50.5)));
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod types;

// Re-export commonly used types for convenience
pub use config::AppConfig;
pub use engine::{MapEngine, RecordingEngine};
pub use error::{MapError, Result};
pub use types::{BoundingBox, Position, Route, RouteCharacteristics, WaypointType};
