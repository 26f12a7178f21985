//! Human-facing identifiers rendered from sequence values, e.g. `ICCT-006`.

use crate::seq::error::SeqError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SEPARATOR: char = '-';

/// Prefix plus minimum digit width used to render values of one series.
///
/// Values wider than `width` simply render with more digits, so the format
/// never has to change when volume outgrows the padding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierFormat {
    prefix: String,
    width: usize,
}

impl IdentifierFormat {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            width,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn format(&self, value: i64) -> AllocatedIdentifier {
        AllocatedIdentifier {
            prefix: self.prefix.clone(),
            value,
            width: self.width,
        }
    }

    /// Parse `code`, requiring this format's prefix. The result is normalized
    /// to this format's padding.
    pub fn parse(&self, code: &str) -> Result<AllocatedIdentifier, SeqError> {
        let parsed: AllocatedIdentifier = code.parse()?;
        if parsed.prefix != self.prefix {
            return Err(SeqError::InvalidIdentifier(format!(
                "{code}: expected prefix {}",
                self.prefix
            )));
        }
        Ok(self.format(parsed.value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AllocatedIdentifier {
    prefix: String,
    value: i64,
    width: usize,
}

impl AllocatedIdentifier {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}

impl fmt::Display for AllocatedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{:0width$}",
            self.prefix,
            SEPARATOR,
            self.value,
            width = self.width
        )
    }
}

impl FromStr for AllocatedIdentifier {
    type Err = SeqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SeqError::InvalidIdentifier(s.to_string());

        let (prefix, digits) = s.rsplit_once(SEPARATOR).ok_or_else(invalid)?;
        if prefix.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let value: i64 = digits.parse().map_err(|_| invalid())?;
        if value < 1 {
            return Err(invalid());
        }

        Ok(Self {
            prefix: prefix.to_string(),
            value,
            width: digits.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pads_to_width() {
        let format = IdentifierFormat::new("ICCT", 3);
        assert_eq!(format.format(1).to_string(), "ICCT-001");
        assert_eq!(format.format(6).to_string(), "ICCT-006");
        assert_eq!(format.format(101).to_string(), "ICCT-101");
    }

    #[test]
    fn test_format_grows_past_width() {
        let format = IdentifierFormat::new("ICCT", 3);
        assert_eq!(format.format(1000).to_string(), "ICCT-1000");
        assert_eq!(format.format(123456).to_string(), "ICCT-123456");
    }

    #[test]
    fn test_parse() {
        let id: AllocatedIdentifier = "ICCT-009".parse().unwrap();
        assert_eq!(id.prefix(), "ICCT");
        assert_eq!(id.value(), 9);
        assert_eq!(id.to_string(), "ICCT-009");

        // prefixes may themselves contain the separator
        let id: AllocatedIdentifier = "ICCT-2025-12".parse().unwrap();
        assert_eq!(id.prefix(), "ICCT-2025");
        assert_eq!(id.value(), 12);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "ICCT", "ICCT-", "-001", "ICCT-00a", "ICCT-000", "ICCT-+12"] {
            assert!(
                bad.parse::<AllocatedIdentifier>().is_err(),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn test_format_parse_normalizes_and_checks_prefix() {
        let format = IdentifierFormat::new("ICCT", 3);
        assert_eq!(format.parse("ICCT-9").unwrap().to_string(), "ICCT-009");
        assert!(matches!(
            format.parse("WC-009"),
            Err(SeqError::InvalidIdentifier(_))
        ));
    }
}
