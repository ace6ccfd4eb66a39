//! Gas monitor event bus and realtime wire protocol.
//!
//! - [`EventBus`] - in-process fan-out hub backed by
//!   `tokio::sync::broadcast`.
//! - [`DomainEvent`] - provenance-tagged envelope for every state change.
//! - [`Subscription`] - a bus receiver, optionally narrowed to one device.
//! - [`wire`] - JSON messages exchanged with realtime clients.

pub mod bus;
pub mod wire;

pub use bus::{DomainEvent, EventBus, EventPayload, Subscription};
pub use wire::{ClientMessage, ServerMessage};
