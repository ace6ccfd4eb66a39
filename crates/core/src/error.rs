#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    /// Shorthand for a missing device-scoped record.
    pub fn device_not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Reject empty or whitespace-only identifiers.
pub fn require_id(value: &str, field: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_id_rejects_blank() {
        assert!(require_id("", "deviceId").is_err());
        assert!(require_id("   ", "deviceId").is_err());
    }

    #[test]
    fn require_id_accepts_value() {
        assert!(require_id("esp32-a1", "deviceId").is_ok());
    }

    #[test]
    fn not_found_display_names_entity() {
        let err = CoreError::device_not_found("Device", "abc");
        assert_eq!(err.to_string(), "Entity not found: Device with id abc");
    }
}
