//! # Purchase Commit
//!
//! Sequences one purchase against the transaction service.
//!
//! ## Commit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          commit()                                       │
//! │                                                                         │
//! │  1. Session has an id?           no ─► NoActiveTransaction (no calls)   │
//! │  2. Total pending from a         yes ─► skip to 5, nothing rewritten    │
//! │     previous attempt?                                                   │
//! │  3. Ledger non-empty?            no ─► EmptyCart (no calls)             │
//! │  4. For each line, for each unit (ledger order, one at a time):         │
//! │        add_detail(unit) ──┬── ok     ─► written += 1                    │
//! │                           └── failed ─► logged, kept in receipt         │
//! │  5. fetch_total()                 failed ─► park writes on the session, │
//! │                                             error, ledger untouched     │
//! │  6. tax_inclusive = total.with_tax(rate)                                │
//! │  7. remove the committed units from the ledger                          │
//! │  8. PurchaseReceipt { total, tax_inclusive, failed details, ... }       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Detail writes are not atomic. A receipt with failed details still clears
//! the committed units; the caller can put them back with
//! [`requeue_failed`].
//!
//! A cart whose details were written is never expanded again. Until its
//! total is read, every commit against the same transaction only retries
//! the total fetch. Lines added in the meantime stay in the cart for the
//! next purchase.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use pos_core::{CartLedger, CartLine, CoreError, DetailRecord, Money, TaxRate, TransactionId};

use crate::error::{TerminalError, TerminalResult};
use crate::service::TransactionService;
use crate::session::TransactionSession;

/// One unit whose detail write was not acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDetail {
    pub detail: DetailRecord,
    pub error: String,
}

/// What a committed purchase produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub transaction_id: TransactionId,

    /// Local subtotal of the ledger that was committed.
    pub subtotal: Money,

    /// Untaxed total reported by the service after the writes.
    pub server_total: Money,

    pub tax_rate: TaxRate,

    /// Amount shown to the operator.
    pub tax_inclusive: Money,

    /// Detail writes the service acknowledged.
    pub written_units: u32,

    pub failed: Vec<FailedDetail>,

    pub committed_at: DateTime<Utc>,
}

impl PurchaseReceipt {
    /// True when every unit was written.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_units(&self) -> usize {
        self.failed.len()
    }

    /// Regroups the failed units into cart lines, one per code, in the
    /// order they were first attempted.
    pub fn failed_lines(&self) -> Vec<CartLine> {
        let mut lines: Vec<CartLine> = Vec::new();

        for failed in &self.failed {
            let detail = &failed.detail;
            match lines.iter_mut().find(|l| l.code == detail.code) {
                Some(line) => line.quantity += 1,
                None => lines.push(CartLine {
                    product_id: detail.product_id,
                    code: detail.code.clone(),
                    name: detail.name.clone(),
                    unit_price: detail.price,
                    quantity: 1,
                }),
            }
        }

        lines
    }

    pub fn summary(&self) -> PurchaseSummary {
        PurchaseSummary {
            transaction_id: self.transaction_id.0,
            server_total: self.server_total,
            tax_inclusive: self.tax_inclusive,
            written_units: self.written_units,
            failed_units: self.failed.len(),
        }
    }
}

/// Serializable digest of a receipt for the host UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseSummary {
    pub transaction_id: i64,
    pub server_total: Money,
    pub tax_inclusive: Money,
    pub written_units: u32,
    pub failed_units: usize,
}

/// Detail writes already sent for a purchase whose total was not read yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTotal {
    pub transaction_id: TransactionId,

    /// Ledger lines as they were when their units were written.
    pub committed: Vec<CartLine>,

    pub subtotal: Money,
    pub written_units: u32,
    pub failed: Vec<FailedDetail>,
}

/// Commits `ledger` into the session's transaction.
///
/// The committed units leave the ledger only when the total fetch succeeds.
pub async fn commit(
    service: &dyn TransactionService,
    session: &mut TransactionSession,
    ledger: &mut CartLedger,
    rate: TaxRate,
) -> TerminalResult<PurchaseReceipt> {
    let transaction_id = session.require_id()?;

    let written = match session.take_pending_total() {
        Some(pending) if pending.transaction_id == transaction_id => {
            info!(
                %transaction_id,
                written_units = pending.written_units,
                "Details already written, retrying total fetch"
            );
            pending
        }
        _ => {
            if ledger.is_empty() {
                return Err(CoreError::EmptyCart.into());
            }
            write_details(service, session, ledger, transaction_id).await?
        }
    };

    let server_total = match session.fetch_total(service).await {
        Ok(total) => total,
        Err(e) => {
            warn!(%transaction_id, error = %e, "Total fetch failed, cart kept");
            session.hold_pending_total(written);
            return Err(e);
        }
    };

    let tax_inclusive = server_total.with_tax(rate);
    release_committed(ledger, &written.committed);

    info!(
        %transaction_id,
        %server_total,
        %tax_inclusive,
        written_units = written.written_units,
        failed_units = written.failed.len(),
        "Purchase committed"
    );

    Ok(PurchaseReceipt {
        transaction_id,
        subtotal: written.subtotal,
        server_total,
        tax_rate: rate,
        tax_inclusive,
        written_units: written.written_units,
        failed: written.failed,
        committed_at: Utc::now(),
    })
}

/// Writes one detail per unit of `ledger`, in ledger order.
async fn write_details(
    service: &dyn TransactionService,
    session: &mut TransactionSession,
    ledger: &CartLedger,
    transaction_id: TransactionId,
) -> TerminalResult<PendingTotal> {
    let subtotal = ledger.subtotal();
    info!(
        %transaction_id,
        lines = ledger.len(),
        units = ledger.total_units(),
        %subtotal,
        "Committing purchase"
    );

    let mut written_units = 0u32;
    let mut failed = Vec::new();

    for unit in ledger.units() {
        let detail = session.detail_for(unit)?;
        match service.add_detail(&detail).await {
            Ok(()) => written_units += 1,
            Err(e) => {
                warn!(
                    %transaction_id,
                    detail_id = %detail.detail_id,
                    code = %detail.code,
                    error = %e,
                    "Detail write failed, continuing"
                );
                failed.push(FailedDetail {
                    detail,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(PendingTotal {
        transaction_id,
        committed: ledger.lines().to_vec(),
        subtotal,
        written_units,
        failed,
    })
}

/// Takes the committed quantities out of `ledger`. Lines that only held
/// committed units disappear.
fn release_committed(ledger: &mut CartLedger, committed: &[CartLine]) {
    for line in committed {
        let remaining = match ledger.line(&line.code) {
            Some(current) => i64::from(current.quantity) - i64::from(line.quantity),
            None => continue,
        };

        if remaining <= 0 {
            ledger.remove(&line.code);
        } else if let Err(e) = ledger.set_quantity(&line.code, remaining) {
            warn!(code = %line.code, error = %e, "Could not release committed units");
        }
    }
}

/// Puts the units a receipt could not write back into `ledger`.
///
/// Consumes the receipt so its failed units are restored at most once.
/// Returns the codes that could not be restored because they would push a
/// line past the quantity cap.
pub fn requeue_failed(
    ledger: &mut CartLedger,
    receipt: PurchaseReceipt,
) -> Vec<(String, TerminalError)> {
    let mut rejected = Vec::new();

    for line in receipt.failed_lines() {
        let code = line.code.clone();
        if let Err(e) = ledger.merge_line(line) {
            warn!(%code, error = %e, "Could not requeue failed units");
            rejected.push((code, e.into()));
        }
    }

    rejected
}
