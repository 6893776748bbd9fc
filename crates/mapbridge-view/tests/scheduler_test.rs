//! Update loop timing with a paused clock

use anyhow::Result;
use mapbridge_core::config::AppConfig;
use mapbridge_core::engine::RecordingEngine;
use mapbridge_core::types::{Position, Route, RouteCharacteristics};
use mapbridge_core::MapError;
use mapbridge_view::{Column, MapEvent, MapView, ModelChange, SharedRoute};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    // keep the recorded scripts free of polling traffic
    config.callback.polling_fallback = false;
    config
}

fn track(count: usize) -> Route {
    let positions = (0..count)
        .map(|i| Position::new(11.0 + i as f64 * 0.01, 48.0 + if i % 2 == 0 { 0.0 } else { 0.001 }))
        .collect();
    Route::new(RouteCharacteristics::Track, positions)
}

struct Harness {
    view: MapView,
    engine: Arc<RecordingEngine>,
    route: Arc<SharedRoute>,
    _events: flume::Receiver<MapEvent>,
}

async fn started(route: Route) -> Result<Harness> {
    let engine = Arc::new(RecordingEngine::new());
    let shared = Arc::new(SharedRoute::new(Some(route)));
    let (tx, rx) = flume::unbounded();
    let view = MapView::new(config(), engine.clone(), shared.clone(), tx)?;
    view.start().await?;
    view.initialize().await?;
    Ok(Harness {
        view,
        engine,
        route: shared,
        _events: rx,
    })
}

#[tokio::test(start_paused = true)]
async fn test_route_updates_are_coalesced_and_rate_limited() -> Result<()> {
    let harness = started(track(20)).await?;
    let scheduler = harness.view.scheduler().clone();

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(scheduler.route_pushes(), 1, "initial render");

    for longitude in [11.5, 11.6] {
        harness.route.update(|route| route.positions[3].longitude = Some(longitude));
        harness.view.model_changed(ModelChange::RowsUpdated { first: 3, last: 3 });
        sleep(Duration::from_millis(100)).await;
    }

    // 4.9s after the initial push
    sleep(Duration::from_millis(3700)).await;
    assert_eq!(scheduler.route_pushes(), 1);

    sleep(Duration::from_millis(1600)).await;
    assert_eq!(scheduler.route_pushes(), 2);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(scheduler.route_pushes(), 2);

    harness.view.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_structural_changes_repaint_at_once() -> Result<()> {
    let harness = started(track(20)).await?;
    let scheduler = harness.view.scheduler().clone();
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(scheduler.route_pushes(), 1);

    harness
        .route
        .update(|route| route.positions.push(Position::new(11.5, 48.5)));
    harness.view.model_changed(ModelChange::RowsInserted { first: 20, last: 20 });
    sleep(Duration::from_millis(10)).await;
    assert_eq!(scheduler.route_pushes(), 2);

    harness.view.model_changed(ModelChange::AllRowsChanged);
    sleep(Duration::from_millis(10)).await;
    assert_eq!(scheduler.route_pushes(), 3);

    harness.view.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_description_edit_redraws_selection() -> Result<()> {
    let harness = started(track(20)).await?;
    let scheduler = harness.view.scheduler().clone();
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(scheduler.selection_pushes(), 1);

    harness.view.model_changed(ModelChange::CellUpdated {
        row: 3,
        column: Column::Elevation,
    });
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(scheduler.selection_pushes(), 1);
    assert!(!scheduler.dirty().update_route);

    harness.view.model_changed(ModelChange::CellUpdated {
        row: 3,
        column: Column::Description,
    });
    sleep(Duration::from_millis(10)).await;
    assert_eq!(scheduler.selection_pushes(), 2);
    // the route itself waits for the update interval
    assert_eq!(scheduler.route_pushes(), 1);
    assert!(scheduler.dirty().update_route);

    harness.view.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_hidden_view_reasons_stay_bounded() -> Result<()> {
    let harness = started(track(20)).await?;
    sleep(Duration::from_millis(100)).await;
    harness.view.set_visible(false);

    for _ in 0..10_000 {
        harness.view.model_changed(ModelChange::RowsUpdated { first: 3, last: 3 });
    }
    sleep(Duration::from_secs(30)).await;

    let dirty = harness.view.scheduler().dirty();
    assert!(dirty.update_route);
    assert_eq!(dirty.route_reasons.len(), 1);
    assert_eq!(dirty.selection_reasons.len(), 1);

    harness.view.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_replace_route_pushes_immediately() -> Result<()> {
    let harness = started(track(20)).await?;
    sleep(Duration::from_millis(100)).await;
    harness.engine.take_scripts();

    harness.route.replace(Some(track(5)));
    harness.view.route_replaced();
    sleep(Duration::from_millis(10)).await;

    let scripts = harness.engine.take_scripts();
    assert!(scripts[0].starts_with("fitBounds("), "{:?}", scripts);
    assert!(scripts.contains(&"removeOverlays();".to_string()));
    assert_eq!(scripts.iter().filter(|s| s.starts_with("addPolyline(")).count(), 1);

    harness.view.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_hidden_view_keeps_flags() -> Result<()> {
    let harness = started(track(20)).await?;
    sleep(Duration::from_millis(100)).await;
    let scheduler = harness.view.scheduler().clone();
    assert_eq!(scheduler.route_pushes(), 1);

    harness.view.set_visible(false);
    harness.view.route_replaced();
    sleep(Duration::from_secs(3)).await;
    assert_eq!(scheduler.route_pushes(), 1);
    assert!(scheduler.dirty().replace_route);

    harness.view.set_visible(true);
    sleep(Duration::from_millis(10)).await;
    assert_eq!(scheduler.route_pushes(), 2);
    assert!(!scheduler.dirty().replace_route);

    harness.view.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_selection_renders_and_recenters() -> Result<()> {
    let harness = started(track(20)).await?;
    sleep(Duration::from_millis(600)).await;
    harness.engine.take_scripts();

    harness.view.selection_changed(vec![2, 99, 4], true);
    sleep(Duration::from_millis(10)).await;

    let scripts = harness.engine.take_scripts();
    assert_eq!(scripts[0], "removeSelectedPositions();");
    assert!(scripts[1].starts_with("selectPositions(["), "{:?}", scripts);
    assert!(scripts[1].ends_with(",2],[48,11.04,4]]);"), "{:?}", scripts);
    assert_eq!(scripts[2], "setCenter(48,11.03);");

    harness.view.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_initialize_gives_up() -> Result<()> {
    let engine = Arc::new(RecordingEngine::new());
    engine.set_initialized(false);
    let (tx, _rx) = flume::unbounded();
    let view = MapView::new(config(), engine, Arc::new(SharedRoute::default()), tx)?;
    view.start().await?;

    let started = tokio::time::Instant::now();
    let result = view.initialize().await;
    assert!(matches!(result, Err(MapError::InitializationFailed { attempts: 5 })));
    // 100 + 200 + 400 + 800 ms between the five attempts
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1500) && elapsed < Duration::from_millis(1600));

    view.shutdown().await;
    Ok(())
}
