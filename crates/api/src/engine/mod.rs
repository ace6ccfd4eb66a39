//! Ingestion engine.
//!
//! [`Monitor`] owns the device registry, settings and bounded reading
//! history, and publishes every state change to the event bus.

pub mod monitor;

pub use monitor::{Ingested, Monitor, Registration};
