//! # Error Types
//!
//! Domain-specific error types for pos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  pos-core errors (this file)                                           │
//! │  ├── CoreError        - Ledger rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  pos-terminal errors (separate crate)                                  │
//! │  └── TerminalError    - Lookup, transport, scan, purchase failures     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → TerminalError → Notice on screen  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant here is a local rejection: nothing was sent over the
//! network and the ledger is left exactly as it was.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Cart ledger rule violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A quantity change or merge would leave a line outside 1..=99.
    ///
    /// ## When This Occurs
    /// - Operator types 0 or 150 into the quantity field
    /// - The same product is scanned a 100th time
    #[error("Quantity {requested} for {code} must be between {min} and {max}")]
    QuantityOutOfRange {
        code: String,
        requested: i64,
        min: u32,
        max: u32,
    },

    /// No line with this code exists in the ledger.
    #[error("No cart line for product code {0}")]
    LineNotFound(String),

    /// Purchase attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when operator input doesn't meet requirements and are raised
/// before any business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or blank.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
