//! Callback name validation.
//!
//! The callback is written unescaped into a body the browser executes as
//! script, so anything beyond identifier-ish characters is refused.

use crate::error::{JsonpError, JsonpResult};

/// Characters accepted besides ASCII letters and digits.
const EXTRA_CHARS: &[char] = &['_', '.', '-'];

/// Whether `callback` contains only `[A-Za-z0-9_.-]`.
pub fn is_safe_callback(callback: &str) -> bool {
    callback
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || EXTRA_CHARS.contains(&c))
}

/// Extract and validate the callback from the raw `c` query value.
///
/// With `strict == false` any non-empty value is accepted.
///
/// # Errors
///
/// [`JsonpError::MissingCallback`] when the value is absent or empty,
/// [`JsonpError::InvalidCallback`] when strict validation fails.
pub fn validate_callback(raw: Option<&str>, strict: bool) -> JsonpResult<&str> {
    let callback = raw
        .filter(|c| !c.is_empty())
        .ok_or(JsonpError::MissingCallback)?;

    if strict && !is_safe_callback(callback) {
        return Err(JsonpError::InvalidCallback);
    }
    Ok(callback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_or_empty() {
        assert_eq!(validate_callback(None, true), Err(JsonpError::MissingCallback));
        assert_eq!(
            validate_callback(Some(""), true),
            Err(JsonpError::MissingCallback)
        );
        assert_eq!(
            validate_callback(Some(""), false),
            Err(JsonpError::MissingCallback)
        );
    }

    #[test]
    fn test_accepts_sockjs_callbacks() {
        for cb in ["cb", "_jp.a1b2c3", "callbacks.x_9-y", "JSONP123"] {
            assert_eq!(validate_callback(Some(cb), true), Ok(cb));
        }
    }

    #[test]
    fn test_rejects_script_injection() {
        for cb in ["alert(1);x", "a b", "cb</script>", "x=1", "f\u{2028}"] {
            assert_eq!(
                validate_callback(Some(cb), true),
                Err(JsonpError::InvalidCallback),
                "{cb:?} should be refused"
            );
        }
    }

    #[test]
    fn test_relaxed_mode_passes_through() {
        assert_eq!(validate_callback(Some("a b"), false), Ok("a b"));
    }
}
