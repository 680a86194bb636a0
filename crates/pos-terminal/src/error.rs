//! # Terminal Error Types
//!
//! Error types for everything the checkout screen does beyond pure ledger
//! math.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Terminal Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Business     │  │   Transport     │  │     Camera              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  NotFound       │  │  Transport      │  │  Acquisition            │ │
//! │  │  Validation     │  │  Timeout        │  │  ScanBusy               │ │
//! │  │  Core           │  │  UnexpectedStatus│ │                         │ │
//! │  └─────────────────┘  │  MalformedResp. │  └─────────────────────────┘ │
//! │                       └─────────────────┘                              │
//! │  ┌─────────────────┐  ┌─────────────────────────────────────────────┐ │
//! │  │   Purchase      │  │            Configuration                     │ │
//! │  │                 │  │                                              │ │
//! │  │  NoActiveTrans. │  │  InvalidConfig  InvalidUrl                   │ │
//! │  │  CommitInProg.  │  │  ConfigLoadFailed  ConfigSaveFailed          │ │
//! │  │  NoProductLoaded│  │                                              │ │
//! │  └─────────────────┘  └─────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error is recovered by the operation that raised it. None of them
//! take the screen down; the operator retries by pressing the button again.

use pos_core::{CoreError, ValidationError};
use thiserror::Error;

/// Result type alias for terminal operations.
pub type TerminalResult<T> = Result<T, TerminalError>;

/// Terminal error type covering all checkout screen failures.
#[derive(Debug, Error)]
pub enum TerminalError {
    // =========================================================================
    // Business Errors
    // =========================================================================
    /// The transaction service has no product with this code.
    #[error("Product code {code} is not registered")]
    NotFound { code: String },

    /// Operator input failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Ledger rule violation.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Network failure talking to the transaction service.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A remote call did not finish within the configured timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Non-2xx response other than a product 404.
    #[error("{context} failed with HTTP status {status}")]
    UnexpectedStatus { status: u16, context: String },

    /// 2xx response whose body could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    // =========================================================================
    // Camera Errors
    // =========================================================================
    /// The camera or decoder could not be acquired.
    #[error("Camera is not accessible: {0}")]
    Acquisition(String),

    /// A scan is already starting or running.
    #[error("A scan is already in progress")]
    ScanBusy,

    // =========================================================================
    // Purchase Errors
    // =========================================================================
    /// No transaction id has been assigned yet.
    #[error("No active transaction")]
    NoActiveTransaction,

    /// Another purchase is still being committed.
    #[error("A purchase is already being committed")]
    CommitInProgress,

    /// Manual add pressed with no product on display.
    #[error("No product has been loaded")]
    NoProductLoaded,

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid terminal configuration.
    #[error("Invalid terminal configuration: {0}")]
    InvalidConfig(String),

    /// Invalid backend URL.
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for TerminalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TerminalError::MalformedResponse(err.to_string())
        } else {
            TerminalError::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for TerminalError {
    fn from(err: url::ParseError) -> Self {
        TerminalError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for TerminalError {
    fn from(err: std::io::Error) -> Self {
        TerminalError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for TerminalError {
    fn from(err: toml::de::Error) -> Self {
        TerminalError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for TerminalError {
    fn from(err: toml::ser::Error) -> Self {
        TerminalError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl TerminalError {
    /// Returns true for the transient infrastructure failures the screen
    /// reports as "transport error".
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            TerminalError::Transport(_)
                | TerminalError::Timeout(_)
                | TerminalError::UnexpectedStatus { .. }
                | TerminalError::MalformedResponse(_)
        )
    }

    /// Returns true if pressing the same button again may succeed without the
    /// operator changing anything.
    pub fn is_retryable(&self) -> bool {
        match self {
            TerminalError::Transport(_) | TerminalError::Timeout(_) => true,
            TerminalError::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
            TerminalError::Acquisition(_) | TerminalError::CommitInProgress => true,
            _ => false,
        }
    }

    /// Returns true if the operator fixes this by changing their input.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            TerminalError::NotFound { .. }
                | TerminalError::Validation(_)
                | TerminalError::Core(_)
                | TerminalError::NoProductLoaded
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TerminalError::InvalidConfig(_)
                | TerminalError::InvalidUrl(_)
                | TerminalError::ConfigLoadFailed(_)
                | TerminalError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(TerminalError::Transport("connection refused".into()).is_transport());
        assert!(TerminalError::Timeout(10).is_transport());
        assert!(TerminalError::UnexpectedStatus {
            status: 500,
            context: "lookup".into()
        }
        .is_transport());

        assert!(!TerminalError::NotFound { code: "ZZZ".into() }.is_transport());
        assert!(!TerminalError::NoActiveTransaction.is_transport());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(TerminalError::Timeout(10).is_retryable());
        assert!(TerminalError::UnexpectedStatus {
            status: 503,
            context: "get transaction".into()
        }
        .is_retryable());

        assert!(!TerminalError::UnexpectedStatus {
            status: 400,
            context: "add detail".into()
        }
        .is_retryable());
        assert!(!TerminalError::InvalidConfig("bad".into()).is_retryable());
    }

    #[test]
    fn test_user_correctable() {
        assert!(TerminalError::NotFound { code: "ZZZ".into() }.is_user_correctable());
        assert!(TerminalError::Core(CoreError::EmptyCart).is_user_correctable());
        assert!(!TerminalError::Timeout(1).is_user_correctable());
    }

    #[test]
    fn test_error_display() {
        let err = TerminalError::UnexpectedStatus {
            status: 502,
            context: "create transaction".into(),
        };
        assert_eq!(
            err.to_string(),
            "create transaction failed with HTTP status 502"
        );
        assert_eq!(
            TerminalError::NotFound { code: "ZZZ".into() }.to_string(),
            "Product code ZZZ is not registered"
        );
    }
}
