use crate::error::ApiError;

/// Validate a text message before it is handed to the engine.
///
/// Only blank messages are rejected; any length is accepted.
pub fn validate_text(text: &str) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::InvalidInput("Text cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_text_valid() {
        assert!(validate_text("Hello").is_ok());
        assert!(validate_text(" Guten Tag! ").is_ok());
    }

    #[test]
    fn test_validate_text_blank() {
        for text in ["", "   ", "\n\t"] {
            let result = validate_text(text);
            assert!(matches!(result, Err(ApiError::InvalidInput(ref msg)) if msg.contains("empty")));
        }
    }

    #[test]
    fn test_validate_text_long_is_accepted() {
        let long_text = "word ".repeat(20_000);
        assert!(validate_text(&long_text).is_ok());
    }
}
