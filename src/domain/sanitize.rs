//! Input normalization for user-supplied card text.
//!
//! All functions are pure; lengths are counted in characters, not bytes.

use crate::error::{BoardError, Result};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_BODY_LEN: usize = 2000;
pub const MAX_DISPLAY_NAME_LEN: usize = 100;

/// Trims a title and collapses each run of line breaks into a single space
pub fn sanitize_title(raw: &str) -> Result<String> {
    let title = collapse_line_breaks(raw.trim());
    if title.is_empty() {
        return Err(BoardError::invalid("title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(BoardError::invalid(format!(
            "title exceeds {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title)
}

/// Trims a body; absent or blank input becomes an empty string
pub fn sanitize_body(raw: Option<&str>) -> Result<String> {
    let body = raw.map(str::trim).unwrap_or_default();
    if body.chars().count() > MAX_BODY_LEN {
        return Err(BoardError::invalid(format!(
            "text exceeds {} characters",
            MAX_BODY_LEN
        )));
    }
    Ok(body.to_string())
}

/// Resolves the name shown for a registrar, falling back to the actor id
pub fn sanitize_display_name(raw: Option<&str>, actor: &str) -> Result<String> {
    let name = raw.map(|n| collapse_line_breaks(n.trim())).unwrap_or_default();
    if name.is_empty() {
        return Ok(actor.to_string());
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(BoardError::invalid(format!(
            "display name exceeds {} characters",
            MAX_DISPLAY_NAME_LEN
        )));
    }
    Ok(name)
}

/// Rejects a missing or blank acting user
pub fn require_actor(actor: &str) -> Result<&str> {
    let actor = actor.trim();
    if actor.is_empty() {
        return Err(BoardError::Unauthenticated);
    }
    Ok(actor)
}

fn collapse_line_breaks(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_break = false;
    for c in s.chars() {
        if c == '\n' || c == '\r' {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
        } else {
            out.push(c);
            in_break = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_is_trimmed() {
        assert_eq!(sanitize_title("  Write tests \n").unwrap(), "Write tests");
    }

    #[test]
    fn test_title_line_breaks_collapse() {
        assert_eq!(sanitize_title("one\r\ntwo\nthree").unwrap(), "one two three");
        assert_eq!(sanitize_title("a\n\n\nb").unwrap(), "a b");
    }

    #[test]
    fn test_title_rejects_empty() {
        assert!(sanitize_title("").unwrap_err().is_invalid_input());
        assert!(sanitize_title(" \n\t ").unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_title_length_bound() {
        let at_limit = "x".repeat(MAX_TITLE_LEN);
        assert!(sanitize_title(&at_limit).is_ok());

        let too_long = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(sanitize_title(&too_long).unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_title_length_counts_characters() {
        let wide = "é".repeat(MAX_TITLE_LEN);
        assert!(sanitize_title(&wide).is_ok());
    }

    #[test]
    fn test_body_blank_becomes_empty() {
        assert_eq!(sanitize_body(None).unwrap(), "");
        assert_eq!(sanitize_body(Some("   ")).unwrap(), "");
        assert_eq!(sanitize_body(Some(" notes ")).unwrap(), "notes");
    }

    #[test]
    fn test_body_keeps_line_breaks() {
        assert_eq!(sanitize_body(Some("a\nb")).unwrap(), "a\nb");
    }

    #[test]
    fn test_body_length_bound() {
        let too_long = "y".repeat(MAX_BODY_LEN + 1);
        assert!(sanitize_body(Some(&too_long)).unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_display_name_falls_back_to_actor() {
        assert_eq!(sanitize_display_name(None, "alice").unwrap(), "alice");
        assert_eq!(sanitize_display_name(Some("  "), "alice").unwrap(), "alice");
        assert_eq!(
            sanitize_display_name(Some(" Alice A. "), "alice").unwrap(),
            "Alice A."
        );
    }

    #[test]
    fn test_require_actor() {
        assert_eq!(require_actor(" alice ").unwrap(), "alice");
        assert!(require_actor("").unwrap_err().is_unauthenticated());
        assert!(require_actor("  ").unwrap_err().is_unauthenticated());
    }
}
