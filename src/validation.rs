//! Validation helpers for player names.

use validator::ValidationError;

/// Longest display name accepted, in characters.
pub const MAX_NAME_CHARS: usize = 64;

/// Validates a display name exactly as it will be stored.
///
/// The name must be non-empty, carry no leading or trailing whitespace, be at
/// most [`MAX_NAME_CHARS`] characters and contain no control characters.
/// Trimming user input is up to the caller.
///
/// ```ignore
/// validate_player_name("Ada")   // Ok(())
/// validate_player_name(" Ada")  // Err - surrounding whitespace
/// validate_player_name("   ")   // Err - blank
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("player_name_blank");
        err.message = Some("Player name must not be blank".into());
        return Err(err);
    }

    if name.trim() != name {
        let mut err = ValidationError::new("player_name_whitespace");
        err.message =
            Some("Player name must not start or end with whitespace".into());
        return Err(err);
    }

    let length = name.chars().count();
    if length > MAX_NAME_CHARS {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Player name must be at most {MAX_NAME_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    if name.chars().any(char::is_control) {
        let mut err = ValidationError::new("player_name_format");
        err.message = Some("Player name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}
