//! Observer side of the gas monitor.
//!
//! An observer follows one device: it subscribes to the origin's live feed,
//! loads history from the external store and from the origin, and keeps a
//! bounded working set that merges the two without double counting. Origin
//! events it sees are mirrored onward; anything read back from the external
//! store never is.

pub mod config;
pub mod error;
pub mod feed;
pub mod observer;
pub mod origin;
pub mod reconciler;

pub use error::ObserverError;
pub use observer::Observer;
pub use reconciler::Reconciler;
