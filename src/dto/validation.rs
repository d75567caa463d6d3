//! Validation helpers for DTOs.

use validator::ValidationError;

/// Display names fit on a scoreboard row.
const MAX_NAME_LENGTH: usize = 32;
/// Join codes accepted at the boundary; generated codes are 6 characters but
/// the configured length may differ.
const CODE_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 4..=8;

/// Validates that a display name is non-blank and short enough for the board.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("name_blank");
        err.message = Some("Display name must not be blank".into());
        return Err(err);
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        let mut err = ValidationError::new("name_length");
        err.message =
            Some(format!("Display name must be at most {MAX_NAME_LENGTH} characters").into());
        return Err(err);
    }

    Ok(())
}

/// Validates the shape of a join code: ASCII alphanumeric, sensible length.
/// Case is normalized later; both `ab12cd` and `AB12CD` are accepted here.
pub fn validate_join_code(code: &str) -> Result<(), ValidationError> {
    let trimmed = code.trim();
    if !CODE_LENGTH_RANGE.contains(&trimmed.len()) {
        let mut err = ValidationError::new("code_length");
        err.message = Some(
            format!(
                "Join code must be between {} and {} characters",
                CODE_LENGTH_RANGE.start(),
                CODE_LENGTH_RANGE.end()
            )
            .into(),
        );
        return Err(err);
    }

    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        let mut err = ValidationError::new("code_format");
        err.message = Some("Join code must contain only letters and digits".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_must_not_be_blank() {
        assert!(validate_display_name("Ava").is_ok());
        assert!(validate_display_name("  Ava  ").is_ok());
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("   ").is_err());
    }

    #[test]
    fn display_names_have_a_length_cap() {
        assert!(validate_display_name(&"x".repeat(32)).is_ok());
        assert!(validate_display_name(&"x".repeat(33)).is_err());
    }

    #[test]
    fn join_codes_accept_either_case() {
        assert!(validate_join_code("AB12CD").is_ok());
        assert!(validate_join_code("ab12cd").is_ok());
        assert!(validate_join_code(" AB12CD ").is_ok());
    }

    #[test]
    fn join_codes_reject_bad_shapes() {
        assert!(validate_join_code("AB!").is_err()); // too short
        assert!(validate_join_code("ABCDEFGHI").is_err()); // too long
        assert!(validate_join_code("AB 2CD").is_err()); // inner whitespace
        assert!(validate_join_code("AB-2CD").is_err()); // punctuation
    }
}
