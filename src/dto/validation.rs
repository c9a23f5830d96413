//! Validation helpers for DTOs.

use uuid::Uuid;
use validator::ValidationError;

/// Validates that a user identifier is a canonical UUID.
///
/// Identities are minted by the authentication oracle as UUIDs; anything else
/// in a receiver field is a malformed request, rejected before any persistence.
pub fn validate_user_id(id: &str) -> Result<(), ValidationError> {
    if Uuid::parse_str(id).is_err() {
        let mut err = ValidationError::new("user_id_format");
        err.message = Some(format!("`{id}` is not a valid user identifier").into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a vote wire code is one of `1` (agree) or `-1` (disagree).
pub fn validate_vote(vote: i8) -> Result<(), ValidationError> {
    if vote != 1 && vote != -1 {
        let mut err = ValidationError::new("vote_value");
        err.message = Some(format!("vote must be 1 or -1 (got {vote})").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_user_id_valid() {
        assert!(validate_user_id("8f14e45f-ceea-467f-a34f-b5c1effed0fd").is_ok());
        assert!(validate_user_id(&Uuid::new_v4().to_string()).is_ok());
    }

    #[test]
    fn test_validate_user_id_invalid() {
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("alice").is_err());
        assert!(validate_user_id("8f14e45fceea467fa34f").is_err()); // truncated
    }

    #[test]
    fn test_validate_vote() {
        assert!(validate_vote(1).is_ok());
        assert!(validate_vote(-1).is_ok());
        assert!(validate_vote(0).is_err());
        assert!(validate_vote(2).is_err());
    }
}
