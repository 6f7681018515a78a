//! Validation helpers for DTOs.

use validator::ValidationError;

/// Rejects display names carrying control characters.
///
/// Blank names are accepted; they are shown as "Anonymous" on the leaderboard.
///
/// # Examples
///
/// ```ignore
/// validate_display_name("Ada")      // Ok
/// validate_display_name("")         // Ok - anonymous
/// validate_display_name("Ada\n")    // Err - control character
/// ```
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.chars().any(char::is_control) {
        let mut err = ValidationError::new("display_name_control");
        err.message = Some("Display name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_display_name_valid() {
        assert!(validate_display_name("Ada Lovelace").is_ok());
        assert!(validate_display_name("").is_ok());
        assert!(validate_display_name("   ").is_ok());
        assert!(validate_display_name("Zoë ✓").is_ok());
    }

    #[test]
    fn test_validate_display_name_invalid() {
        assert!(validate_display_name("Ada\n").is_err());
        assert!(validate_display_name("\u{7}bell").is_err());
        assert!(validate_display_name("tab\there").is_err());
    }
}
