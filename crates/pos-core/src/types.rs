//! # Domain Types
//!
//! Core domain types used throughout the checkout screen.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │ TransactionRecord│  │  DetailRecord   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (server)    │   │  id (server)    │   │  detail_id      │       │
//! │  │  code (lookup)  │   │  created_at     │   │  transaction_id │       │
//! │  │  name           │   │  identity       │   │  product snapshot│      │
//! │  │  price          │   │  total          │   │  (one unit)     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌──────────────────────────┐                                          │
//! │  │    TerminalIdentity      │  operator / store / terminal codes       │
//! │  │  fixed per installation  │  sent with every new transaction         │
//! │  └──────────────────────────┘                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity
//! A product has a server-assigned numeric `id` used in detail records and a
//! `code` (barcode or manual code) that the operator actually types or scans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Identifiers
// =============================================================================

/// Server-assigned transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one detail record, unique within its transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DetailId(pub u64);

impl fmt::Display for DetailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product from the master, as returned by a code lookup.
///
/// Immutable once fetched. Cart lines copy what they need from it rather
/// than holding on to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    /// Server-assigned product id.
    pub id: i64,

    /// Lookup key (barcode or manual code). Unique across the master.
    pub code: String,

    /// Display name shown to the operator.
    pub name: String,

    /// Unit price in yen.
    pub price: Money,
}

impl Product {
    pub fn new(id: i64, code: impl Into<String>, name: impl Into<String>, price: Money) -> Self {
        Product {
            id,
            code: code.into(),
            name: name.into(),
            price,
        }
    }
}

// =============================================================================
// Terminal Identity
// =============================================================================

/// Fixed identifiers stamped onto every transaction this terminal opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalIdentity {
    /// Operator (employee) code, e.g. `EMP01`.
    pub operator_code: String,

    /// Store code, e.g. `30`.
    pub store_code: String,

    /// Register number within the store, e.g. `90`.
    pub terminal_no: String,
}

// =============================================================================
// Transaction Records
// =============================================================================

/// Request to open a new transaction.
///
/// The total always starts at zero; the server accumulates it from the
/// detail records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub created_at: DateTime<Utc>,
    pub identity: TerminalIdentity,
    pub total: Money,
}

impl NewTransaction {
    /// Opens a transaction at `created_at` with a zero total.
    pub fn opened_at(identity: TerminalIdentity, created_at: DateTime<Utc>) -> Self {
        NewTransaction {
            created_at,
            identity,
            total: Money::zero(),
        }
    }
}

/// The server's record of one checkout transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub id: TransactionId,

    /// `None` when the server omits the timestamp or sends one we cannot read.
    pub created_at: Option<DateTime<Utc>>,
    pub identity: TerminalIdentity,

    /// Authoritative untaxed total accumulated from detail records.
    pub total: Money,
}

/// One purchased unit within a transaction.
///
/// The server schema has no quantity column, so a cart line of quantity N
/// becomes N of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRecord {
    pub detail_id: DetailId,
    pub transaction_id: TransactionId,
    pub product_id: i64,
    pub code: String,
    pub name: String,
    pub price: Money,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction_starts_at_zero() {
        let identity = TerminalIdentity {
            operator_code: "EMP01".into(),
            store_code: "30".into(),
            terminal_no: "90".into(),
        };
        let now = Utc::now();
        let tx = NewTransaction::opened_at(identity.clone(), now);

        assert!(tx.total.is_zero());
        assert_eq!(tx.created_at, now);
        assert_eq!(tx.identity, identity);
    }

    #[test]
    fn test_product_serializes_camel_case() {
        let tea = Product::new(1, "A1", "Tea", Money::from_yen(150));
        let json = serde_json::to_value(&tea).unwrap();
        assert_eq!(json["code"], "A1");
        assert_eq!(json["price"], 150);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(TransactionId(7).to_string(), "7");
        assert_eq!(DetailId(3).to_string(), "3");
    }
}
