//! # Transaction Session
//!
//! Owns the remote transaction id for one screen activation.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    TransactionSession Lifecycle                         │
//! │                                                                         │
//! │   mount                                                                 │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  ┌──────────┐  create ok   ┌──────────────┐  purchase (per_visit)       │
//! │  │  Unset   │ ───────────► │  Open(id=7)  │ ◄───────────┐               │
//! │  │          │              │  details 1.. │ ────────────┘               │
//! │  └──────────┘              └──────┬───────┘                             │
//! │     ▲   │ create failed           │ purchase (per_purchase)             │
//! │     │   ▼ (logged, id stays unset)▼                                     │
//! │     └── retry by operator     close + open ─► Open(id=8), details 1..   │
//! │                                                                         │
//! │  Purchases are rejected with NoActiveTransaction while Unset.           │
//! │  A purchase whose total fetch failed stays pending on the session;      │
//! │  opening or closing a transaction drops it.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Detail Ids
//! The backend has no quantity column, so one cart line of quantity N turns
//! into N detail rows. Each needs an id unique within its transaction; the
//! session hands them out from a counter that restarts with every newly
//! opened transaction.

use chrono::{DateTime, Utc};
use tracing::{error, info};

use pos_core::{CartLine, DetailId, DetailRecord, Money, NewTransaction, TerminalIdentity, TransactionId};

use crate::error::{TerminalError, TerminalResult};
use crate::purchase::PendingTotal;
use crate::service::TransactionService;

// =============================================================================
// Detail Id Allocator
// =============================================================================

/// Monotonic detail id source for one transaction.
#[derive(Debug, Clone)]
pub struct DetailIdAllocator {
    next: u64,
}

impl Default for DetailIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl DetailIdAllocator {
    pub fn new() -> Self {
        DetailIdAllocator { next: 1 }
    }

    /// Returns a fresh id. Never repeats until [`reset`](Self::reset).
    pub fn allocate(&mut self) -> DetailId {
        let id = DetailId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next - 1
    }

    pub fn reset(&mut self) {
        self.next = 1;
    }
}

// =============================================================================
// Transaction Session
// =============================================================================

/// The remote transaction this screen is writing into.
#[derive(Debug, Clone)]
pub struct TransactionSession {
    identity: TerminalIdentity,
    transaction_id: Option<TransactionId>,
    opened_at: Option<DateTime<Utc>>,
    detail_ids: DetailIdAllocator,
    pending_total: Option<PendingTotal>,
}

impl TransactionSession {
    pub fn new(identity: TerminalIdentity) -> Self {
        TransactionSession {
            identity,
            transaction_id: None,
            opened_at: None,
            detail_ids: DetailIdAllocator::new(),
            pending_total: None,
        }
    }

    /// Opens a new remote transaction with a zero total.
    ///
    /// On failure the id is left unset and the error is logged and returned.
    /// Lookup and scanning keep working; only purchases are blocked.
    pub async fn open(&mut self, service: &dyn TransactionService) -> TerminalResult<TransactionId> {
        let now = Utc::now();
        let request = NewTransaction::opened_at(self.identity.clone(), now);

        match service.create_transaction(&request).await {
            Ok(id) => {
                info!(transaction_id = %id, "Transaction opened");
                self.transaction_id = Some(id);
                self.opened_at = Some(now);
                self.detail_ids.reset();
                self.pending_total = None;
                Ok(id)
            }
            Err(e) => {
                error!(error = %e, "Failed to open transaction");
                self.close();
                Err(e)
            }
        }
    }

    /// Returns the current id, opening a transaction first if none exists.
    pub async fn ensure_open(&mut self, service: &dyn TransactionService) -> TerminalResult<TransactionId> {
        match self.transaction_id {
            Some(id) => Ok(id),
            None => self.open(service).await,
        }
    }

    /// Forgets the current transaction, including any total still pending.
    pub fn close(&mut self) {
        self.transaction_id = None;
        self.opened_at = None;
        self.detail_ids.reset();
        self.pending_total = None;
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }

    pub fn is_open(&self) -> bool {
        self.transaction_id.is_some()
    }

    /// Returns the id or `NoActiveTransaction`.
    pub fn require_id(&self) -> TerminalResult<TransactionId> {
        self.transaction_id.ok_or(TerminalError::NoActiveTransaction)
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    pub fn identity(&self) -> &TerminalIdentity {
        &self.identity
    }

    /// Number of detail ids allocated in the current transaction.
    pub fn details_issued(&self) -> u64 {
        self.detail_ids.issued()
    }

    /// Builds the detail record for one unit of `line` under a fresh id.
    pub fn detail_for(&mut self, line: &CartLine) -> TerminalResult<DetailRecord> {
        let transaction_id = self.require_id()?;

        Ok(DetailRecord {
            detail_id: self.detail_ids.allocate(),
            transaction_id,
            product_id: line.product_id,
            code: line.code.clone(),
            name: line.name.clone(),
            price: line.unit_price,
        })
    }

    /// True when details were written but the purchase total was never read.
    pub fn has_pending_total(&self) -> bool {
        self.pending_total.is_some()
    }

    pub(crate) fn hold_pending_total(&mut self, pending: PendingTotal) {
        self.pending_total = Some(pending);
    }

    pub(crate) fn take_pending_total(&mut self) -> Option<PendingTotal> {
        self.pending_total.take()
    }

    /// Fetches the authoritative untaxed total of the current transaction.
    pub async fn fetch_total(&self, service: &dyn TransactionService) -> TerminalResult<Money> {
        let id = self.require_id()?;
        let record = service.get_transaction(id).await?;
        Ok(record.total)
    }
}
