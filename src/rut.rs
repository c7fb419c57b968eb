//! Chilean taxpayer identifiers (RUT): a number plus a modulo-11 check digit.

use crate::error::RutError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static RUT_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,8})-([\dK])$").expect("static RUT regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaxpayerId {
    number: u32,
    check_digit: char,
}

impl TaxpayerId {
    /// Validates and decomposes an id written as `12.345.678-5` or `12345678-5`.
    pub fn parse(raw: &str) -> Result<Self, RutError> {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '.')
            .collect::<String>()
            .to_uppercase();

        let caps = RUT_FORMAT
            .captures(&cleaned)
            .ok_or_else(|| RutError::Malformed(raw.to_string()))?;

        let number: u32 = caps[1]
            .parse()
            .map_err(|_| RutError::Malformed(raw.to_string()))?;
        let given = caps[2].chars().next().unwrap_or_default();

        if number == 0 || check_digit(number) != given {
            return Err(RutError::CheckDigit(raw.to_string()));
        }

        Ok(Self {
            number,
            check_digit: given,
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn check_digit(&self) -> char {
        self.check_digit
    }

    /// The `(number, check digit)` pair the upload form expects.
    pub fn decompose(&self) -> (String, String) {
        (self.number.to_string(), self.check_digit.to_string())
    }
}

impl fmt::Display for TaxpayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.number, self.check_digit)
    }
}

impl std::str::FromStr for TaxpayerId {
    type Err = RutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Modulo-11 check digit: weights 2..=7 cycling from the rightmost digit.
pub fn check_digit(number: u32) -> char {
    let mut n = number;
    let mut sum = 0u32;
    let mut weight = 2u32;
    while n > 0 {
        sum += (n % 10) * weight;
        n /= 10;
        weight = if weight == 7 { 2 } else { weight + 1 };
    }
    match 11 - (sum % 11) {
        11 => '0',
        10 => 'K',
        d => char::from_digit(d, 10).unwrap_or('0'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_decomposes_valid_ids() {
        let id = TaxpayerId::parse("76.192.083-9").unwrap();
        assert_eq!(id.number(), 76192083);
        assert_eq!(id.decompose(), ("76192083".to_string(), "9".to_string()));
        assert_eq!(id.to_string(), "76192083-9");
    }

    #[test]
    fn accepts_lowercase_k() {
        let id = TaxpayerId::parse("60803000-k").unwrap();
        assert_eq!(id.check_digit(), 'K');
    }

    #[test]
    fn computes_check_digits() {
        assert_eq!(check_digit(11111111), '1');
        assert_eq!(check_digit(66666666), '6');
        assert_eq!(check_digit(60803000), 'K');
    }

    #[test]
    fn rejects_wrong_check_digit() {
        assert_eq!(
            TaxpayerId::parse("76192083-1"),
            Err(RutError::CheckDigit("76192083-1".to_string()))
        );
    }

    #[test]
    fn rejects_malformed_ids() {
        for raw in ["", "76192083", "abc-1", "123456789-0", "76192083-X"] {
            assert!(
                matches!(TaxpayerId::parse(raw), Err(RutError::Malformed(_))),
                "{raw} should be malformed"
            );
        }
    }
}
