//! # Transaction Service
//!
//! The remote collaborator that owns products, transactions and details.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    TransactionService Calls                             │
//! │                                                                         │
//! │  create_transaction   {timestamp, codes, total=0}  ──► transaction id  │
//! │  lookup_product       {code}                       ──► Some / None     │
//! │  add_detail           {detail id, product snapshot} ──► ack            │
//! │  get_transaction      {transaction id}             ──► total, ...      │
//! │                                                                         │
//! │  Implementations:                                                      │
//! │  • HttpTransactionService   (http.rs, the real backend)                │
//! │  • MemoryTransactionService (this module, for tests and demos)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use pos_core::{DetailRecord, NewTransaction, Product, TransactionId, TransactionRecord};

use crate::error::{TerminalError, TerminalResult};

// =============================================================================
// Service Trait
// =============================================================================

/// Access to the remote transaction/product service.
///
/// `lookup_product` reports a missing code as `Ok(None)` so callers can tell
/// "not registered" apart from a transport failure.
#[async_trait]
pub trait TransactionService: Send + Sync {
    /// Opens a transaction and returns its server-assigned id.
    async fn create_transaction(&self, tx: &NewTransaction) -> TerminalResult<TransactionId>;

    /// Looks up a product by its code.
    async fn lookup_product(&self, code: &str) -> TerminalResult<Option<Product>>;

    /// Records one purchased unit.
    async fn add_detail(&self, detail: &DetailRecord) -> TerminalResult<()>;

    /// Fetches a transaction with its authoritative total.
    async fn get_transaction(&self, id: TransactionId) -> TerminalResult<TransactionRecord>;
}

// =============================================================================
// In-Memory Service
// =============================================================================

/// Calls observed by [`MemoryTransactionService`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    CreateTransaction,
    LookupProduct(String),
    AddDetail { transaction_id: TransactionId, code: String },
    GetTransaction(TransactionId),
}

#[derive(Debug, Default)]
struct MemoryState {
    products: HashMap<String, Product>,
    transactions: HashMap<i64, TransactionRecord>,
    details: Vec<DetailRecord>,
    next_id: i64,
    calls: Vec<ServiceCall>,

    fail_create: bool,
    fail_lookup: bool,
    fail_get: bool,
    reject_detail_codes: HashSet<String>,
}

/// In-process stand-in for the backend.
///
/// Accumulates each transaction's total from its details the same way the
/// real service does. Individual calls can be made to fail.
#[derive(Debug)]
pub struct MemoryTransactionService {
    state: Mutex<MemoryState>,
}

impl Default for MemoryTransactionService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransactionService {
    pub fn new() -> Self {
        MemoryTransactionService {
            state: Mutex::new(MemoryState {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Sets the id the next created transaction receives.
    pub fn with_next_transaction_id(self, id: i64) -> Self {
        self.lock().next_id = id;
        self
    }

    /// Registers a product in the master.
    pub fn with_product(self, product: Product) -> Self {
        self.lock().products.insert(product.code.clone(), product);
        self
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.lock().fail_create = fail;
    }

    pub fn set_fail_lookup(&self, fail: bool) {
        self.lock().fail_lookup = fail;
    }

    pub fn set_fail_get(&self, fail: bool) {
        self.lock().fail_get = fail;
    }

    /// Makes every detail write for `code` fail with a 500.
    pub fn reject_details_for(&self, code: impl Into<String>) {
        self.lock().reject_detail_codes.insert(code.into());
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.lock().calls.clone()
    }

    /// Details accepted for a transaction, in write order.
    pub fn details(&self, id: TransactionId) -> Vec<DetailRecord> {
        self.lock()
            .details
            .iter()
            .filter(|d| d.transaction_id == id)
            .cloned()
            .collect()
    }

    pub fn transaction_count(&self) -> usize {
        self.lock().transactions.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TransactionService for MemoryTransactionService {
    async fn create_transaction(&self, tx: &NewTransaction) -> TerminalResult<TransactionId> {
        let mut state = self.lock();
        state.calls.push(ServiceCall::CreateTransaction);

        if state.fail_create {
            return Err(TerminalError::UnexpectedStatus {
                status: 503,
                context: "create transaction".into(),
            });
        }

        let id = TransactionId(state.next_id);
        state.next_id += 1;
        state.transactions.insert(
            id.0,
            TransactionRecord {
                id,
                created_at: Some(tx.created_at),
                identity: tx.identity.clone(),
                total: tx.total,
            },
        );

        Ok(id)
    }

    async fn lookup_product(&self, code: &str) -> TerminalResult<Option<Product>> {
        let mut state = self.lock();
        state.calls.push(ServiceCall::LookupProduct(code.to_string()));

        if state.fail_lookup {
            return Err(TerminalError::Transport("connection reset".into()));
        }

        Ok(state.products.get(code).cloned())
    }

    async fn add_detail(&self, detail: &DetailRecord) -> TerminalResult<()> {
        let mut state = self.lock();
        state.calls.push(ServiceCall::AddDetail {
            transaction_id: detail.transaction_id,
            code: detail.code.clone(),
        });

        if state.reject_detail_codes.contains(&detail.code) {
            return Err(TerminalError::UnexpectedStatus {
                status: 500,
                context: "add detail".into(),
            });
        }

        let duplicate = state
            .details
            .iter()
            .any(|d| d.transaction_id == detail.transaction_id && d.detail_id == detail.detail_id);
        if duplicate {
            return Err(TerminalError::UnexpectedStatus {
                status: 409,
                context: "add detail".into(),
            });
        }

        let record = state
            .transactions
            .get_mut(&detail.transaction_id.0)
            .ok_or(TerminalError::UnexpectedStatus {
                status: 404,
                context: "add detail".into(),
            })?;
        record.total += detail.price;
        state.details.push(detail.clone());

        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> TerminalResult<TransactionRecord> {
        let mut state = self.lock();
        state.calls.push(ServiceCall::GetTransaction(id));

        if state.fail_get {
            return Err(TerminalError::Timeout(10));
        }

        state
            .transactions
            .get(&id.0)
            .cloned()
            .ok_or(TerminalError::UnexpectedStatus {
                status: 404,
                context: "get transaction".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pos_core::{DetailId, Money, TerminalIdentity};

    fn identity() -> TerminalIdentity {
        TerminalIdentity {
            operator_code: "EMP01".into(),
            store_code: "30".into(),
            terminal_no: "90".into(),
        }
    }

    fn tea_unit(tx: TransactionId, n: u64) -> DetailRecord {
        DetailRecord {
            detail_id: DetailId(n),
            transaction_id: tx,
            product_id: 1,
            code: "A1".into(),
            name: "Tea".into(),
            price: Money::from_yen(150),
        }
    }

    #[tokio::test]
    async fn test_memory_service_accumulates_total() {
        let service = MemoryTransactionService::new().with_next_transaction_id(7);
        let id = service
            .create_transaction(&NewTransaction::opened_at(identity(), Utc::now()))
            .await
            .unwrap();
        assert_eq!(id, TransactionId(7));

        service.add_detail(&tea_unit(id, 1)).await.unwrap();
        service.add_detail(&tea_unit(id, 2)).await.unwrap();

        let record = service.get_transaction(id).await.unwrap();
        assert_eq!(record.total, Money::from_yen(300));
        assert_eq!(service.details(id).len(), 2);
    }

    #[tokio::test]
    async fn test_memory_service_rejects_duplicate_detail_id() {
        let service = MemoryTransactionService::new();
        let id = service
            .create_transaction(&NewTransaction::opened_at(identity(), Utc::now()))
            .await
            .unwrap();

        service.add_detail(&tea_unit(id, 1)).await.unwrap();
        let err = service.add_detail(&tea_unit(id, 1)).await.unwrap_err();

        assert!(matches!(err, TerminalError::UnexpectedStatus { status: 409, .. }));
        assert_eq!(service.details(id).len(), 1);
    }

    #[tokio::test]
    async fn test_memory_service_lookup() {
        let service = MemoryTransactionService::new()
            .with_product(Product::new(1, "A1", "Tea", Money::from_yen(150)));

        assert!(service.lookup_product("A1").await.unwrap().is_some());
        assert!(service.lookup_product("ZZZ").await.unwrap().is_none());

        service.set_fail_lookup(true);
        assert!(service.lookup_product("A1").await.unwrap_err().is_transport());

        assert_eq!(
            service.calls(),
            vec![
                ServiceCall::LookupProduct("A1".into()),
                ServiceCall::LookupProduct("ZZZ".into()),
                ServiceCall::LookupProduct("A1".into()),
            ]
        );
    }
}
