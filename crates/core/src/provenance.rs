//! Where an event was first observed.
//!
//! Provenance is the only signal used to decide whether a state change is
//! written to the external replicated store. Events produced by the origin
//! service are mirrored; events read back from the external store are not,
//! which is what keeps a mirror write from echoing back as a new write.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    /// Produced by the origin service (ingestion, registration, settings write).
    Origin,
    /// Loaded from, or notified by, the external replicated store.
    ExternalStore,
}

impl Provenance {
    /// Whether an event with this provenance may be written to the external store.
    pub fn is_mirrorable(self) -> bool {
        matches!(self, Provenance::Origin)
    }
}

impl Default for Provenance {
    fn default() -> Self {
        Provenance::Origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_origin_is_mirrorable() {
        assert!(Provenance::Origin.is_mirrorable());
        assert!(!Provenance::ExternalStore.is_mirrorable());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_string(&Provenance::ExternalStore).unwrap();
        assert_eq!(json, "\"externalStore\"");
    }
}
