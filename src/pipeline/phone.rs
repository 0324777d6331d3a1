//! Recipient phone number normalization.
//!
//! Best-effort heuristic: numbers without a leading `+` are assumed to be
//! Colombian and reduced to their digits. Input that already starts with
//! `+` is passed through untouched. Length and country rules are not
//! validated.

use std::fmt;

/// Country code prepended to numbers lacking international format.
pub const DEFAULT_COUNTRY_CODE: &str = "+57";

/// A recipient number starting with `+`. Rewritten numbers are `+` and digits only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedRecipient(String);

impl NormalizedRecipient {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedRecipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Emitted when the input had to be rewritten into international format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatWarning {
    pub original: String,
}

/// Result of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub recipient: NormalizedRecipient,
    pub warning: Option<FormatWarning>,
}

/// Canonicalize a raw recipient into `+<number>` form. Never fails.
pub fn normalize(raw: &str) -> Normalized {
    let trimmed = raw.trim();
    if trimmed.starts_with('+') {
        return Normalized {
            recipient: NormalizedRecipient(trimmed.to_string()),
            warning: None,
        };
    }

    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    let local = digits.trim_start_matches('0');
    Normalized {
        recipient: NormalizedRecipient(format!("{DEFAULT_COUNTRY_CODE}{local}")),
        warning: Some(FormatWarning {
            original: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn international_numbers_pass_through() {
        let n = normalize("+573001234567");
        assert_eq!(n.recipient.as_str(), "+573001234567");
        assert!(n.warning.is_none());
    }

    #[test]
    fn local_numbers_get_country_code() {
        let n = normalize("3001234567");
        assert_eq!(n.recipient.as_str(), "+573001234567");
        assert_eq!(n.warning.unwrap().original, "3001234567");
    }

    #[test]
    fn leading_zeros_are_stripped() {
        assert_eq!(normalize("003001234567").recipient.as_str(), "+573001234567");
    }

    #[test]
    fn separators_are_stripped_from_local_numbers() {
        for raw in ["300 123 4567", "300-123-4567", "(300) 123.4567", "0300 123 4567"] {
            let n = normalize(raw);
            assert_eq!(n.recipient.as_str(), "+573001234567", "{raw}");
            assert_eq!(n.warning.unwrap().original, raw);
        }
    }

    #[test]
    fn rewritten_numbers_are_digits_only() {
        for raw in ["300 123 4567", "0+1", "tel:3001234567", "abc"] {
            let n = normalize(raw).recipient;
            assert!(n.as_str()[1..].chars().all(|c| c.is_ascii_digit()), "{raw}");
        }
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let n = normalize("  +573001234567 ");
        assert_eq!(n.recipient.as_str(), "+573001234567");
        assert!(n.warning.is_none());
    }

    #[test]
    fn idempotent() {
        for raw in ["3001234567", "+14155550100", "0057300", "12"] {
            let once = normalize(raw).recipient;
            let twice = normalize(once.as_str());
            assert_eq!(twice.recipient, once);
            assert!(twice.warning.is_none());
        }
    }

    #[test]
    fn always_starts_with_plus() {
        for raw in ["1", "0", "000", "99", "+", "0+1"] {
            assert!(normalize(raw).recipient.as_str().starts_with('+'), "{raw}");
        }
    }

    #[test]
    fn length_is_not_validated() {
        // Known limitation: short inputs still get the prefix.
        assert_eq!(normalize("12").recipient.as_str(), "+5712");
    }
}
