//! # Validation Module
//!
//! Normalization and clamping rules applied to data coming from either
//! remote system before it reaches the ledger.
//!
//! ## Phone Normalization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Input                     normalize_phone          Result              │
//! │  ───────────────────────   ───────────────────────  ──────────────────  │
//! │  "+58 424-229 0660"   ──►  keep digits, keep   ──►  "+584242290660"     │
//! │  "(0212) 555.12.34"   ──►  a leading '+'       ──►  "02125551234"       │
//! │  "n/a"                ──►                      ──►  None                │
//! │  "   " / "+"          ──►                      ──►  None                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use ledger_core::validation::{clamp_limit, normalize_phone};
//!
//! assert_eq!(normalize_phone("+58 424-229 0660").as_deref(), Some("+584242290660"));
//! assert_eq!(clamp_limit(0, 1, 200), 1);
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Helpers
// =============================================================================

/// Returns the trimmed value, or `None` when nothing is left.
pub fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Owned variant of [`non_blank`] for optional inputs.
pub fn non_blank_owned(value: Option<&str>) -> Option<String> {
    value.and_then(non_blank).map(str::to_string)
}

/// Requires a non-blank value, naming the field on failure.
pub fn require(field: &str, value: &str) -> ValidationResult<String> {
    non_blank(value)
        .map(str::to_string)
        .ok_or_else(|| ValidationError::Required {
            field: field.to_string(),
        })
}

// =============================================================================
// Phone Numbers
// =============================================================================

/// Normalizes a phone number to digits with an optional leading `+`.
///
/// ## Rules
/// - Leading/trailing whitespace is ignored
/// - A `+` is kept only as the first character of the input
/// - Every other non-digit character is dropped
/// - No digits left means no phone
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return None;
    }

    if trimmed.starts_with('+') {
        Some(format!("+{digits}"))
    } else {
        Some(digits)
    }
}

/// Normalizes an optional phone, treating blank input as absent.
pub fn normalize_optional_phone(raw: Option<&str>) -> Option<String> {
    raw.and_then(normalize_phone)
}

/// The number to use on WhatsApp: normalized mobile, else normalized phone.
pub fn preferred_whatsapp(mobile: Option<&str>, phone: Option<&str>) -> Option<String> {
    normalize_optional_phone(mobile).or_else(|| normalize_optional_phone(phone))
}

// =============================================================================
// Numeric Helpers
// =============================================================================

/// Clamps a caller-supplied page size or limit into `[min, max]`.
pub fn clamp_limit(value: u32, min: u32, max: u32) -> u32 {
    value.clamp(min, max)
}

/// Parses a comma-separated list of positive ids.
///
/// Entries that are not positive integers are dropped. Duplicates are
/// removed while keeping first-seen order.
///
/// ```rust
/// use ledger_core::validation::parse_id_list;
///
/// assert_eq!(parse_id_list("8, 12,x,-3,8,0"), vec![8, 12]);
/// ```
pub fn parse_id_list(raw: &str) -> Vec<i64> {
    let mut ids = Vec::new();
    for part in raw.split(',') {
        if let Ok(id) = part.trim().parse::<i64>() {
            if id > 0 && !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(
            normalize_phone("+58 424-229 0660").as_deref(),
            Some("+584242290660")
        );
        assert_eq!(
            normalize_phone("(0212) 555.12.34").as_deref(),
            Some("02125551234")
        );
        assert_eq!(normalize_phone("  +1 (555) 010-9999 ").as_deref(), Some("+15550109999"));
    }

    #[test]
    fn test_normalize_phone_rejects_empty() {
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("   "), None);
        assert_eq!(normalize_phone("+"), None);
        assert_eq!(normalize_phone("n/a"), None);
    }

    #[test]
    fn test_inner_plus_is_dropped() {
        assert_eq!(normalize_phone("0424+229").as_deref(), Some("0424229"));
    }

    #[test]
    fn test_preferred_whatsapp_falls_back_to_phone() {
        assert_eq!(
            preferred_whatsapp(Some("  "), Some("0212 555")).as_deref(),
            Some("0212555")
        );
        assert_eq!(
            preferred_whatsapp(Some("+58 414"), Some("0212")).as_deref(),
            Some("+58414")
        );
        assert_eq!(preferred_whatsapp(None, None), None);
    }

    #[test]
    fn test_require() {
        assert!(require("nombre", "  ").is_err());
        assert_eq!(require("nombre", " ibuprofeno ").unwrap(), "ibuprofeno");
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(0, 1, 200), 1);
        assert_eq!(clamp_limit(50, 1, 200), 50);
        assert_eq!(clamp_limit(5000, 1, 1000), 1000);
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list(""), Vec::<i64>::new());
        assert_eq!(parse_id_list("8, 12,x,-3,8,0"), vec![8, 12]);
    }
}
