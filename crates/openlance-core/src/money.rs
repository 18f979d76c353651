//! Monetary amounts as decimal strings.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ValidationError;

/// Monetary amount with currency.
///
/// Amounts are stored as strings to preserve arbitrary precision across
/// serialization and the settlement ledger boundary.
///
/// # Security Invariant
///
/// Financial amounts must never be represented as floating-point numbers.
/// String storage ensures no precision loss during serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Money {
    /// Amount as a decimal string (e.g., "1500", "249.99").
    pub amount: String,
    /// ISO 4217 currency code or token symbol (e.g., "USD", "USDC").
    pub currency: String,
}

impl Money {
    /// Create a new monetary amount.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAmount`] if the amount string is
    /// empty or contains non-numeric characters, and
    /// [`ValidationError::InvalidCurrency`] if the currency code is empty.
    pub fn new(
        amount: impl Into<String>,
        currency: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let amount_str = amount.into();
        if !is_valid_decimal(&amount_str) {
            return Err(ValidationError::InvalidAmount(amount_str));
        }
        let currency_str = currency.into();
        if currency_str.is_empty() {
            return Err(ValidationError::InvalidCurrency(currency_str));
        }
        Ok(Self {
            amount: amount_str,
            currency: currency_str,
        })
    }

    /// Whether the amount is strictly positive (not zero, not negative).
    ///
    /// Escrow funding and milestone amounts must be positive; a zero-value
    /// milestone is a client-side mistake, not a payable unit of work.
    pub fn is_positive(&self) -> bool {
        if self.amount.starts_with('-') {
            return false;
        }
        self.amount.chars().any(|c| c.is_ascii_digit() && c != '0')
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Validate that a string represents a valid decimal number.
pub fn is_valid_decimal(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    let s = s.strip_prefix('-').unwrap_or(s);
    if s.is_empty() {
        return false;
    }
    let mut has_dot = false;
    let mut has_digit = false;
    for c in s.chars() {
        if c == '.' {
            if has_dot {
                return false;
            }
            has_dot = true;
        } else if c.is_ascii_digit() {
            has_digit = true;
        } else {
            return false;
        }
    }
    has_digit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_integer_and_fractional_amounts() {
        assert!(Money::new("1500", "USD").is_ok());
        assert!(Money::new("249.99", "USDC").is_ok());
        assert!(Money::new("0.5", "USD").is_ok());
    }

    #[test]
    fn rejects_empty_amount() {
        assert!(matches!(
            Money::new("", "USD"),
            Err(ValidationError::InvalidAmount(_))
        ));
    }

    #[test]
    fn rejects_non_numeric_amount() {
        assert!(Money::new("12a", "USD").is_err());
        assert!(Money::new("1.2.3", "USD").is_err());
        assert!(Money::new(".", "USD").is_err());
        assert!(Money::new("-", "USD").is_err());
    }

    #[test]
    fn rejects_empty_currency() {
        assert!(matches!(
            Money::new("100", ""),
            Err(ValidationError::InvalidCurrency(_))
        ));
    }

    #[test]
    fn negative_amounts_parse_but_are_not_positive() {
        let m = Money::new("-5", "USD").unwrap();
        assert!(!m.is_positive());
    }

    #[test]
    fn zero_is_not_positive() {
        assert!(!Money::new("0", "USD").unwrap().is_positive());
        assert!(!Money::new("0.00", "USD").unwrap().is_positive());
        assert!(Money::new("0.01", "USD").unwrap().is_positive());
    }

    #[test]
    fn serde_roundtrip() {
        let m = Money::new("42.50", "USD").unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"42.50\""));
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }
}
