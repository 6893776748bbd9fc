//! # mapbridge view
//!
//! The native side of the browser map: keeps the map in sync with the route
//! model and turns browser interaction back into model edits.
//!
//! - [`scheduler`]: route and selection update loops with their debounce
//!   rules ([`dirty`])
//! - [`bridge`], [`correction`], [`command`]: coordinate conversion and
//!   script generation
//! - [`dispatch`]: browser callbacks to [`MapEvent`]s and map state
//! - [`view`]: the [`MapView`] facade the UI talks to
//!
//! ## Example
//!
//! ```no_run
//! use mapbridge_core::{AppConfig, RecordingEngine, Route, RouteCharacteristics, Position};
//! use mapbridge_view::{MapView, SharedRoute};
//! use std::sync::Arc;
//!
//! # async fn run() -> mapbridge_core::Result<()> {
//! let route = Arc::new(SharedRoute::new(Some(Route::new(
//!     RouteCharacteristics::Track,
//!     vec![Position::new(11.0, 48.0), Position::new(11.1, 48.1)],
//! ))));
//! let (events, _ui) = flume::unbounded();
//! let view = MapView::new(AppConfig::default(), Arc::new(RecordingEngine::new()), route, events)?;
//! view.start().await?;
//! view.initialize().await?;
//! view.selection_changed(vec![1], true);
//! view.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod command;
pub mod correction;
pub mod dirty;
pub mod dispatch;
pub mod model;
pub mod scheduler;
pub mod state;
pub mod view;

pub use bridge::ViewBridge;
pub use command::MapCommand;
pub use correction::CoordinateCorrector;
pub use dirty::{decide_route_update, decide_selection_update, UpdateDecision};
pub use mapbridge_core::engine::MapEngine;
pub use model::{Column, MapEvent, ModelChange, RouteSource, SharedRoute, ViewPreference};
pub use scheduler::MapUpdateScheduler;
pub use state::MapState;
pub use view::MapView;
