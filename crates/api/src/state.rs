use std::sync::Arc;

use gaswatch_events::EventBus;

use crate::config::ServerConfig;
use crate::engine::Monitor;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Device registry, settings and reading history.
    pub monitor: Arc<Monitor>,
    /// WebSocket connection manager (dashboards and observers).
    pub ws_manager: Arc<WsManager>,
    /// Fan-out bus the monitor publishes to.
    pub event_bus: Arc<EventBus>,
}
