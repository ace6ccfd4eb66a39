//! Gas sensor monitoring domain.
//!
//! Pure types and in-memory stores shared by the origin service and by
//! observers. Nothing in this crate performs I/O; locking and publication are
//! the caller's concern.

pub mod alert;
pub mod device;
pub mod error;
pub mod provenance;
pub mod reading;
pub mod settings;
pub mod types;
pub mod window;
