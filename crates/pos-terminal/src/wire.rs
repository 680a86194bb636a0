//! # Wire Format
//!
//! JSON bodies exchanged with the transaction service.
//!
//! The backend speaks upper-snake column names straight from its tables, so
//! these DTOs exist only to translate between those names and the domain
//! types in `pos-core`.
//!
//! ```text
//! ┌──────────────────────┐         ┌─────────────────────────────────────┐
//! │  pos-core            │ (Try)   │  wire (THIS MODULE)                  │
//! │                      │ ◄─────► │                                     │
//! │  Product             │         │  ProductDto  {PRD_ID, CODE, ...}    │
//! │  NewTransaction      │         │  NewTransactionDto {DATETIME, ...}  │
//! │  TransactionRecord   │         │  TransactionDto {TRD_ID, TOTAL_AMT} │
//! │  DetailRecord        │         │  DetailDto {DTL_ID, PRD_ID, ...}    │
//! └──────────────────────┘         └─────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use pos_core::validation::validate_price;
use pos_core::{
    DetailRecord, Money, NewTransaction, Product, TerminalIdentity, TransactionId,
    TransactionRecord,
};

use crate::error::TerminalError;

// =============================================================================
// Product
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDto {
    #[serde(rename = "PRD_ID")]
    pub id: i64,

    #[serde(rename = "CODE")]
    pub code: String,

    #[serde(rename = "NAME")]
    pub name: String,

    #[serde(rename = "PRICE")]
    pub price: i64,
}

/// Rejects a row whose price breaks the product master's rules.
impl TryFrom<ProductDto> for Product {
    type Error = TerminalError;

    fn try_from(dto: ProductDto) -> Result<Self, Self::Error> {
        let price = validate_price(dto.price).map_err(|e| {
            TerminalError::MalformedResponse(format!("product {}: {}", dto.code, e))
        })?;
        Ok(Product::new(dto.id, dto.code, dto.name, price))
    }
}

impl From<&Product> for ProductDto {
    fn from(product: &Product) -> Self {
        ProductDto {
            id: product.id,
            code: product.code.clone(),
            name: product.name.clone(),
            price: product.price.yen(),
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Body of `POST /api/transactions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransactionDto {
    #[serde(rename = "DATETIME")]
    pub datetime: DateTime<Utc>,

    #[serde(rename = "EMP_CD")]
    pub operator_code: String,

    #[serde(rename = "STORE_CD")]
    pub store_code: String,

    #[serde(rename = "POS_NO")]
    pub terminal_no: String,

    #[serde(rename = "TOTAL_AMT")]
    pub total: i64,
}

impl From<&NewTransaction> for NewTransactionDto {
    fn from(tx: &NewTransaction) -> Self {
        NewTransactionDto {
            datetime: tx.created_at,
            operator_code: tx.identity.operator_code.clone(),
            store_code: tx.identity.store_code.clone(),
            terminal_no: tx.identity.terminal_no.clone(),
            total: tx.total.yen(),
        }
    }
}

/// A transaction row as echoed by create and returned by get.
///
/// Only the id and the total are required; the server may omit the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDto {
    #[serde(rename = "TRD_ID")]
    pub id: i64,

    #[serde(rename = "DATETIME", default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    #[serde(rename = "EMP_CD", default)]
    pub operator_code: String,

    #[serde(rename = "STORE_CD", default)]
    pub store_code: String,

    #[serde(rename = "POS_NO", default)]
    pub terminal_no: String,

    #[serde(rename = "TOTAL_AMT", default)]
    pub total: i64,
}

impl From<TransactionDto> for TransactionRecord {
    fn from(dto: TransactionDto) -> Self {
        TransactionRecord {
            id: TransactionId(dto.id),
            created_at: dto.datetime.as_deref().and_then(parse_timestamp),
            identity: TerminalIdentity {
                operator_code: dto.operator_code,
                store_code: dto.store_code,
                terminal_no: dto.terminal_no,
            },
            total: Money::from_yen(dto.total),
        }
    }
}

/// Reads RFC 3339 or a bare `YYYY-MM-DD[T ]HH:MM:SS[.f]`, taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

// =============================================================================
// Detail
// =============================================================================

/// Body of `POST /api/transactions/{id}/details`.
///
/// The transaction id travels in the path, not the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailDto {
    #[serde(rename = "DTL_ID")]
    pub detail_id: u64,

    #[serde(rename = "PRD_ID")]
    pub product_id: i64,

    #[serde(rename = "PRD_CODE")]
    pub code: String,

    #[serde(rename = "PRD_NAME")]
    pub name: String,

    #[serde(rename = "PRD_PRICE")]
    pub price: i64,
}

impl From<&DetailRecord> for DetailDto {
    fn from(detail: &DetailRecord) -> Self {
        DetailDto {
            detail_id: detail.detail_id.0,
            product_id: detail.product_id,
            code: detail.code.clone(),
            name: detail.name.clone(),
            price: detail.price.yen(),
        }
    }
}
