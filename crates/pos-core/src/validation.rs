//! # Validation Module
//!
//! Input validation for the checkout screen.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Host UI                                                      │
//! │  ├── Numeric-only quantity field                                       │
//! │  └── Immediate operator feedback                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Code: trimmed, non-blank, bounded length                          │
//! │  ├── Quantity: integer in 1..=99                                       │
//! │  └── Unit price: non-negative whole yen                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Transaction service                                          │
//! │  └── 404 for unknown codes                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use pos_core::validation::{normalize_code, validate_quantity};
//!
//! assert_eq!(normalize_code("  4901234567890 ").unwrap(), "4901234567890");
//! assert_eq!(validate_quantity(5).unwrap(), 5);
//! assert!(validate_quantity(150).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_CODE_LENGTH, MAX_LINE_QUANTITY, MIN_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Normalizes a product code typed by the operator or decoded from a scan.
///
/// ## Rules
/// - Leading/trailing whitespace is dropped (scanners often append `\n`)
/// - Must not be blank
/// - At most [`MAX_CODE_LENGTH`] characters
///
/// ## Returns
/// The trimmed code.
pub fn normalize_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "product code".to_string(),
        });
    }

    if code.chars().count() > MAX_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "product code".to_string(),
            max: MAX_CODE_LENGTH,
        });
    }

    Ok(code.to_string())
}

/// Returns true when a code is blank after trimming.
///
/// A blank code is not an error on the screen: pressing "read" with an empty
/// field simply does nothing.
pub fn is_blank_code(code: &str) -> bool {
    code.trim().is_empty()
}

/// Validates a cart line quantity.
///
/// ## Rules
/// - Must be an integer in `1..=99`
///
/// ## User Workflow
/// ```text
/// Operator types 150 into the quantity field
///      │
///      ▼
/// validate_quantity(150) ← THIS FUNCTION
///      │
///      ├── < 1 or > 99? → Error, line left untouched
///      │
///      └── OK → line quantity replaced
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<u32> {
    let min = MIN_LINE_QUANTITY as i64;
    let max = MAX_LINE_QUANTITY as i64;

    if !(min..=max).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min,
            max,
        });
    }

    Ok(qty as u32)
}

/// Validates a unit price reported by the product master.
pub fn validate_price(yen: i64) -> ValidationResult<Money> {
    if yen < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(Money::from_yen(yen))
}
