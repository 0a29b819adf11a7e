//! Class code lists.
//!
//! Records carry their classes as a delimited string such as `"3, 9, 42"`.
//! Matching splits the string into numeric tokens and compares integers, so
//! a filter for class 9 matches `"9"` and `"3, 9"` but never `"19"`.

use serde::{Deserialize, Serialize};

/// Delimited list of class codes attached to a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassCodes(String);

impl ClassCodes {
    /// Wraps the raw stored form.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Builds the stored form from individual codes.
    #[must_use]
    pub fn from_codes(codes: &[u32]) -> Self {
        let joined = codes
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Self(joined)
    }

    /// Returns the raw stored form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the numeric tokens. Tokens that overflow are skipped.
    pub fn codes(&self) -> impl Iterator<Item = u32> + '_ {
        self.0
            .split(|c: char| !c.is_ascii_digit())
            .filter(|token| !token.is_empty())
            .filter_map(|token| token.parse::<u32>().ok())
    }

    /// Returns true if any token equals `code`.
    #[must_use]
    pub fn contains(&self, code: u32) -> bool {
        self.codes().any(|c| c == code)
    }
}

/// Parses a user-supplied class filter.
///
/// Blank input means no filter. Input that is not a single non-negative
/// integer is ignored with a debug log, matching how a blank form field
/// behaves.
#[must_use]
pub fn parse_class_filter(input: Option<&str>) -> Option<u32> {
    let trimmed = input?.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u32>() {
        Ok(code) => Some(code),
        Err(e) => {
            tracing::debug!(input = trimmed, error = %e, "Ignoring non-numeric class filter");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("9", 9, true; "single code")]
    #[test_case("3, 9", 9, true; "comma separated")]
    #[test_case("3;9;42", 42, true; "semicolon separated")]
    #[test_case("19", 9, false; "no substring match")]
    #[test_case("3, 19, 90", 9, false; "no partial token match")]
    #[test_case("09", 9, true; "leading zero")]
    #[test_case("", 9, false; "empty")]
    fn test_contains(raw: &str, code: u32, expected: bool) {
        assert_eq!(ClassCodes::new(raw).contains(code), expected);
    }

    #[test]
    fn test_codes_skip_overflow() {
        let codes: Vec<u32> = ClassCodes::new("7, 99999999999, 8").codes().collect();
        assert_eq!(codes, vec![7, 8]);
    }

    #[test]
    fn test_from_codes() {
        assert_eq!(ClassCodes::from_codes(&[3, 9]).as_str(), "3, 9");
        assert_eq!(ClassCodes::from_codes(&[]).as_str(), "");
    }

    #[test_case(None, None; "absent")]
    #[test_case(Some(""), None; "empty")]
    #[test_case(Some("   "), None; "blank")]
    #[test_case(Some(" 9 "), Some(9); "padded")]
    #[test_case(Some("abc"), None; "non numeric")]
    #[test_case(Some("-3"), None; "negative")]
    fn test_parse_class_filter(input: Option<&str>, expected: Option<u32>) {
        assert_eq!(parse_class_filter(input), expected);
    }
}
