//! WebSocket infrastructure for the realtime feed.
//!
//! Provides connection management, heartbeat, the HTTP upgrade handler, and
//! the [`FeedRouter`] that relays bus events to connected clients.

mod feed;
mod handler;
mod heartbeat;
pub mod manager;

pub use feed::FeedRouter;
pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
