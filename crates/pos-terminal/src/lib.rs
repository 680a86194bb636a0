//! # pos-terminal: Checkout Screen Engine
//!
//! This crate runs the checkout screen: it talks to the transaction service,
//! drives the camera, and keeps the cart, the lookup display and the remote
//! transaction consistent with each other.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Checkout Screen Data Flow                          │
//! │                                                                         │
//! │  ┌──────────────┐  code   ┌──────────────┐  product  ┌──────────────┐  │
//! │  │ScanController│ ──────► │ lookup       │ ────────► │ CartLedger   │  │
//! │  │ (scan.rs)    │         │ (lookup.rs)  │ auto-add  │ (pos-core)   │  │
//! │  └──────────────┘         └──────┬───────┘           └──────┬───────┘  │
//! │         ▲ typed code ────────────┘                          │          │
//! │                                                             ▼          │
//! │  ┌──────────────┐         ┌──────────────┐           ┌──────────────┐  │
//! │  │ Transaction  │ ◄────── │ purchase     │ ◄──────── │ operator     │  │
//! │  │ Session      │ details │ (purchase.rs)│  commit   │ edits qty    │  │
//! │  │ (session.rs) │ + total └──────────────┘           └──────────────┘  │
//! │  └──────┬───────┘                                                      │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │ TransactionService (service.rs)                                  │  │
//! │  │   HttpTransactionService (http.rs, reqwest)                      │  │
//! │  │   MemoryTransactionService (in-process)                          │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  CheckoutScreen (screen.rs) owns all of the above for one activation.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`screen`] - `CheckoutScreen`, the single owner of screen state
//! - [`scan`] - Camera lifecycle and the one-scan-at-a-time state machine
//! - [`lookup`] - Code lookup classification and the lookup display
//! - [`session`] - Remote transaction id and detail id allocation
//! - [`purchase`] - Commit sequencing and purchase receipts
//! - [`service`] - The `TransactionService` trait and an in-memory service
//! - [`http`] - The service over the backend's JSON API
//! - [`wire`] - JSON bodies in the backend's column names
//! - [`config`] - Terminal configuration (TOML + env)
//! - [`telemetry`] - Tracing subscriber setup
//! - [`error`] - Terminal error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pos_terminal::{init_tracing, CheckoutScreen, HttpTransactionService, TerminalConfig};
//!
//! init_tracing();
//! let config = TerminalConfig::load_or_default(None);
//! let service = Arc::new(HttpTransactionService::from_config(&config)?);
//!
//! let screen = CheckoutScreen::mount(config, service, camera).await;
//! screen.read_code("4901234567890").await?;
//! let receipt = screen.purchase().await?;
//! println!("Total (tax included): {}", receipt.tax_inclusive);
//! screen.unmount();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod http;
pub mod lookup;
pub mod purchase;
pub mod scan;
pub mod screen;
pub mod service;
pub mod session;
pub mod telemetry;
pub mod wire;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{BackendSettings, CheckoutSettings, TerminalConfig, TerminalSettings, TransactionPolicy};
pub use error::{TerminalError, TerminalResult};
pub use http::HttpTransactionService;
pub use lookup::{lookup_product, LookupDisplay, LookupOutcome, Notice};
pub use purchase::{
    commit, requeue_failed, FailedDetail, PendingTotal, PurchaseReceipt, PurchaseSummary,
};
pub use scan::{FrameEvent, ScanController, ScanDevice, ScanEnd, ScanFeed, ScanHandle, ScanOutcome, ScanState};
pub use screen::{CartView, CheckoutScreen};
pub use service::{MemoryTransactionService, ServiceCall, TransactionService};
pub use session::{DetailIdAllocator, TransactionSession};
pub use telemetry::init_tracing;
