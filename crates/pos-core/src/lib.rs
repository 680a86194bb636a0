//! # pos-core: Pure Business Logic for the Checkout Screen
//!
//! This crate holds everything about a purchase that can be decided without
//! touching the network or the camera.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Scan Register Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Host UI (checkout screen)                       │   │
//! │  │    Code input ──► Scan button ──► Cart list ──► Purchase        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                pos-terminal (async, I/O)                        │   │
//! │  │    CheckoutScreen, ScanController, TransactionSession, HTTP     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ pos-core (THIS CRATE) ★                         │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  ledger   │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │CartLedger │  │  qty 1-99 │  │   │
//! │  │   │  Records  │  │  TaxRate  │  │ CartLine  │  │  codes    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO CAMERA • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Product and transaction records
//! - [`money`] - Integer yen amounts and tax-inclusive rounding
//! - [`ledger`] - The cart ledger (one line per product code)
//! - [`validation`] - Quantity and code rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use pos_core::{CartLedger, Money, Product, TaxRate};
//!
//! let tea = Product::new(1, "A1", "Tea", Money::from_yen(150));
//!
//! let mut ledger = CartLedger::new();
//! ledger.add_or_merge(&tea).unwrap();
//! ledger.add_or_merge(&tea).unwrap();
//!
//! assert_eq!(ledger.subtotal(), Money::from_yen(300));
//! assert_eq!(ledger.subtotal().with_tax(TaxRate::from_bps(1000)).yen(), 330);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::{CartLedger, CartLine, CartTotals};
pub use money::{Money, TaxRate};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Smallest quantity a cart line may hold.
pub const MIN_LINE_QUANTITY: u32 = 1;

/// Largest quantity a cart line may hold.
///
/// ## Business Reason
/// The quantity field on the screen is two digits wide; anything larger is
/// almost always a typing slip.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Longest product code accepted from manual entry or a scan.
pub const MAX_CODE_LENGTH: usize = 64;

/// Consumption tax applied to the authoritative total (1000 bps = 10%).
pub const DEFAULT_TAX_RATE_BPS: u32 = 1000;
