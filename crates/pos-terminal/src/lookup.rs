//! # Product Lookup
//!
//! Turns a typed or scanned code into a classified lookup result, and holds
//! what the lookup area of the screen currently shows.
//!
//! ## Classification
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        lookup(code)                                     │
//! │                                                                         │
//! │   blank ─────────────────────────────► Skipped   (no call, no change)   │
//! │   too long ──────────────────────────► Rejected  (no call)              │
//! │   service says 200 + product ────────► Found     (replace display)      │
//! │   product with price < 0 ────────────► Failed    (never reaches cart)   │
//! │   service says 404 ──────────────────► NotFound  ("not registered")     │
//! │   anything else (5xx, timeout, ...) ─► Failed    ("lookup failed")      │
//! │                                                                         │
//! │   NotFound and Failed both clear the displayed product, but only        │
//! │   NotFound says "not registered".                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use pos_core::validation::{is_blank_code, normalize_code};
use pos_core::{Money, Product, ValidationError};

use crate::error::{TerminalError, TerminalResult};
use crate::service::TransactionService;

// =============================================================================
// Notices
// =============================================================================

/// Operator-facing message shown on the screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The code is not in the product master.
    NotRegistered { code: String },

    /// The lookup could not reach the service or got a bad answer.
    LookupFailed,

    /// The camera could not be opened.
    CameraUnavailable,

    /// A quantity edit was outside 1..=99 and was not applied.
    QuantityOutOfRange { code: String },

    /// The purchase could not be confirmed.
    PurchaseFailed,

    /// The purchase was committed; `amount` includes tax.
    PurchaseCompleted { amount: Money },

    /// The purchase was committed but `failed_units` detail writes were
    /// lost; `amount` is the server's total, tax included.
    PurchaseIncomplete { amount: Money, failed_units: usize },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NotRegistered { code } => write!(f, "Product {} is not registered", code),
            Notice::LookupFailed => write!(f, "Product lookup failed"),
            Notice::CameraUnavailable => write!(
                f,
                "Camera is not accessible. Check that the page is served over HTTPS."
            ),
            Notice::QuantityOutOfRange { code } => {
                write!(f, "Quantity for {} must be between 1 and 99", code)
            }
            Notice::PurchaseFailed => write!(f, "Purchase could not be completed"),
            Notice::PurchaseCompleted { amount } => {
                write!(f, "Purchase completed. Total (tax included): {}", amount)
            }
            Notice::PurchaseIncomplete {
                amount,
                failed_units,
            } => write!(
                f,
                "Purchase completed, but {} item(s) were not recorded. Total (tax included): {}",
                failed_units, amount
            ),
        }
    }
}

// =============================================================================
// Lookup Outcome
// =============================================================================

/// Result of looking up one code.
#[derive(Debug)]
pub enum LookupOutcome {
    /// The code was blank; nothing happened.
    Skipped,

    /// The code failed local validation and was never sent.
    Rejected { code: String, reason: ValidationError },

    Found(Product),

    NotFound { code: String },

    /// Transport failure or a non-404 error status.
    Failed { code: String, error: TerminalError },
}

impl LookupOutcome {
    pub fn product(&self) -> Option<&Product> {
        match self {
            LookupOutcome::Found(product) => Some(product),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, LookupOutcome::Found(_))
    }

    /// Collapses the outcome into the found product or the reason there is
    /// none.
    pub fn into_result(self) -> TerminalResult<Product> {
        match self {
            LookupOutcome::Found(product) => Ok(product),
            LookupOutcome::NotFound { code } => Err(TerminalError::NotFound { code }),
            LookupOutcome::Failed { error, .. } => Err(error),
            LookupOutcome::Rejected { reason, .. } => Err(reason.into()),
            LookupOutcome::Skipped => Err(ValidationError::Required {
                field: "product code".to_string(),
            }
            .into()),
        }
    }
}

/// Looks up `raw` after trimming it.
pub async fn lookup_product(service: &dyn TransactionService, raw: &str) -> LookupOutcome {
    if is_blank_code(raw) {
        debug!("Blank code, lookup skipped");
        return LookupOutcome::Skipped;
    }

    let code = match normalize_code(raw) {
        Ok(code) => code,
        Err(reason) => {
            warn!(%reason, "Code rejected before lookup");
            return LookupOutcome::Rejected {
                code: raw.trim().to_string(),
                reason,
            };
        }
    };

    match service.lookup_product(&code).await {
        Ok(Some(product)) if product.price.is_negative() => {
            warn!(%code, price = %product.price, "Product has a negative price");
            LookupOutcome::Failed {
                error: TerminalError::MalformedResponse(format!(
                    "product {} has negative price {}",
                    code, product.price
                )),
                code,
            }
        }
        Ok(Some(product)) => {
            info!(code = %product.code, name = %product.name, price = %product.price, "Product found");
            LookupOutcome::Found(product)
        }
        Ok(None) => {
            info!(%code, "Product not registered");
            LookupOutcome::NotFound { code }
        }
        Err(error) => {
            warn!(%code, %error, "Product lookup failed");
            LookupOutcome::Failed { code, error }
        }
    }
}

// =============================================================================
// Lookup Display
// =============================================================================

/// What the lookup area shows: the code field, the product card, a notice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupDisplay {
    pub code_input: String,
    pub product: Option<Product>,
    pub notice: Option<Notice>,
}

impl LookupDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the display for a finished lookup.
    pub fn apply(&mut self, outcome: &LookupOutcome) {
        match outcome {
            LookupOutcome::Skipped => {}
            LookupOutcome::Found(product) => {
                self.code_input = product.code.clone();
                self.product = Some(product.clone());
                self.notice = None;
            }
            LookupOutcome::NotFound { code } | LookupOutcome::Rejected { code, .. } => {
                self.code_input = code.clone();
                self.product = None;
                self.notice = Some(Notice::NotRegistered { code: code.clone() });
            }
            LookupOutcome::Failed { code, .. } => {
                self.code_input = code.clone();
                self.product = None;
                self.notice = Some(Notice::LookupFailed);
            }
        }
    }

    /// Clears the code field and the product card. Notices survive.
    pub fn reset(&mut self) {
        self.code_input.clear();
        self.product = None;
    }

    /// Clears only the code field; the product card stays up.
    pub fn clear_input(&mut self) {
        self.code_input.clear();
    }

    pub fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }
}
