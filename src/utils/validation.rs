//! Validation utilities

use crate::types::*;

/// Validate the actor recorded on audit fields
///
/// Every operation names who performed it; there is no implicit
/// system-user default.
pub fn validate_actor(actor: &str) -> EngineResult<()> {
    if actor.trim().is_empty() {
        return Err(EngineError::Validation(
            "actor cannot be empty".to_string(),
        ));
    }

    if actor.len() > 100 {
        return Err(EngineError::Validation(
            "actor cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate a cancellation reason
pub fn validate_reason(reason: &str) -> EngineResult<()> {
    if reason.trim().is_empty() {
        return Err(EngineError::Validation(
            "cancellation reason cannot be empty".to_string(),
        ));
    }

    if reason.len() > 500 {
        return Err(EngineError::Validation(
            "cancellation reason cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate a party display name
pub fn validate_party_name(name: &str) -> EngineResult<()> {
    if name.trim().is_empty() {
        return Err(EngineError::Validation(
            "party name cannot be empty".to_string(),
        ));
    }

    if name.len() > 100 {
        return Err(EngineError::Validation(
            "party name cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_must_be_present() {
        assert!(validate_actor("cashier-1").is_ok());
        assert!(validate_actor("").is_err());
        assert!(validate_actor("   ").is_err());
        assert!(validate_actor(&"x".repeat(101)).is_err());
    }

    #[test]
    fn reason_must_be_present() {
        assert!(validate_reason("customer request").is_ok());
        assert!(validate_reason("").is_err());
        assert!(validate_reason(&"x".repeat(501)).is_err());
    }
}
