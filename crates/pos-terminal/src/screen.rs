//! # Checkout Screen
//!
//! The single owner of everything mutable on the checkout screen.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         CheckoutScreen                                  │
//! │                                                                         │
//! │  ┌───────────────────────────────────────────────────────────────────┐  │
//! │  │  state: tokio::Mutex<ScreenState>                                 │  │
//! │  │    ledger   CartLedger          (lines, quantities)              │  │
//! │  │    lookup   LookupDisplay       (code field, product, notice)    │  │
//! │  │    session  TransactionSession  (transaction id, detail ids)     │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │  scanner:    ScanController     (own cell; scanning never holds state) │
//! │  committing: AtomicBool         (second purchase ─► CommitInProgress)  │
//! │                                                                         │
//! │  mount ─► open transaction ─► read/scan ─► edit ─► purchase ─► unmount │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation of the ledger, the lookup display, or the session goes
//! through `state`. A purchase holds it for the whole commit, so edits and
//! lookups issued meanwhile wait until the cart has been committed.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pos_core::{CartLedger, CartLine, CartTotals, CoreError, Product, TransactionId};

use crate::config::{TerminalConfig, TransactionPolicy};
use crate::error::{TerminalError, TerminalResult};
use crate::lookup::{lookup_product, LookupDisplay, LookupOutcome, Notice};
use crate::purchase::{self, PurchaseReceipt};
use crate::scan::{ScanController, ScanDevice, ScanOutcome, ScanState};
use crate::service::TransactionService;
use crate::session::TransactionSession;

/// Lines and totals as the cart panel shows them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
}

struct ScreenState {
    ledger: CartLedger,
    lookup: LookupDisplay,
    session: TransactionSession,
}

/// Resets the in-flight flag when a purchase attempt ends.
struct CommitFlag<'a>(&'a AtomicBool);

impl Drop for CommitFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One activation of the checkout screen.
pub struct CheckoutScreen {
    activation_id: Uuid,
    config: TerminalConfig,
    service: Arc<dyn TransactionService>,
    scanner: ScanController,
    state: Mutex<ScreenState>,
    committing: AtomicBool,
}

impl CheckoutScreen {
    /// Activates the screen and opens its transaction.
    ///
    /// A failed open is logged and leaves the screen usable for lookups;
    /// purchases fail with `NoActiveTransaction` until
    /// [`open_transaction`](Self::open_transaction) succeeds.
    pub async fn mount(
        config: TerminalConfig,
        service: Arc<dyn TransactionService>,
        device: Arc<dyn ScanDevice>,
    ) -> Self {
        let activation_id = Uuid::new_v4();
        info!(activation = %activation_id, "Mounting checkout screen");

        let mut session = TransactionSession::new(config.identity());
        if let Err(e) = session.open(service.as_ref()).await {
            warn!(activation = %activation_id, error = %e, "Screen mounted without a transaction");
        }

        CheckoutScreen {
            activation_id,
            config,
            service,
            scanner: ScanController::new(device),
            state: Mutex::new(ScreenState {
                ledger: CartLedger::new(),
                lookup: LookupDisplay::new(),
                session,
            }),
            committing: AtomicBool::new(false),
        }
    }

    pub fn activation_id(&self) -> Uuid {
        self.activation_id
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    // =========================================================================
    // Transaction
    // =========================================================================

    /// Returns the transaction id, opening one if the screen has none.
    pub async fn open_transaction(&self) -> TerminalResult<TransactionId> {
        let mut state = self.state.lock().await;
        state.session.ensure_open(self.service.as_ref()).await
    }

    pub async fn transaction_id(&self) -> Option<TransactionId> {
        self.state.lock().await.session.transaction_id()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Looks up a typed or scanned code and shows the result.
    ///
    /// With `auto_add` on, a found product goes straight into the cart and
    /// stays on display until the next lookup or purchase. An add that
    /// would push the line past 99 returns `QuantityOutOfRange` and leaves
    /// the cart unchanged.
    pub async fn read_code(&self, raw: &str) -> TerminalResult<LookupOutcome> {
        let mut state = self.state.lock().await;

        let outcome = lookup_product(self.service.as_ref(), raw).await;
        state.lookup.apply(&outcome);

        if self.config.checkout.auto_add {
            if let LookupOutcome::Found(product) = &outcome {
                add_to_cart(&mut state, product)?;
                state.lookup.clear_input();
            }
        }

        Ok(outcome)
    }

    /// Adds the product currently on display (manual add flow).
    pub async fn add_found_product(&self) -> TerminalResult<u32> {
        let mut state = self.state.lock().await;

        let product = state.lookup.product.clone().ok_or(TerminalError::NoProductLoaded)?;
        let quantity = add_to_cart(&mut state, &product)?;
        state.lookup.reset();

        Ok(quantity)
    }

    pub async fn lookup_display(&self) -> LookupDisplay {
        self.state.lock().await.lookup.clone()
    }

    pub async fn notice(&self) -> Option<Notice> {
        self.state.lock().await.lookup.notice.clone()
    }

    pub async fn dismiss_notice(&self) {
        self.state.lock().await.lookup.clear_notice();
    }

    // =========================================================================
    // Scanning
    // =========================================================================

    /// Scans one code with the camera and reads it.
    ///
    /// Returns `Ok(None)` when the scan was stopped before a code decoded.
    pub async fn scan_and_read(&self) -> TerminalResult<Option<LookupOutcome>> {
        match self.scanner.scan().await {
            Ok(ScanOutcome::Decoded(code)) => self.read_code(&code).await.map(Some),
            Ok(ScanOutcome::Stopped) => Ok(None),
            Err(e @ TerminalError::Acquisition(_)) => {
                self.state.lock().await.lookup.set_notice(Notice::CameraUnavailable);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub fn stop_scan(&self) -> bool {
        self.scanner.stop()
    }

    pub fn scan_state(&self) -> ScanState {
        self.scanner.state()
    }

    // =========================================================================
    // Cart Editing
    // =========================================================================

    /// Sets a line's quantity. Unknown codes are a no-op (`Ok(false)`).
    pub async fn set_quantity(&self, code: &str, quantity: i64) -> TerminalResult<bool> {
        let mut state = self.state.lock().await;

        match state.ledger.set_quantity(code, quantity) {
            Ok(changed) => Ok(changed),
            Err(e) => {
                debug!(code, quantity, "Quantity rejected");
                state.lookup.set_notice(Notice::QuantityOutOfRange {
                    code: code.to_string(),
                });
                Err(e.into())
            }
        }
    }

    pub async fn remove(&self, code: &str) -> bool {
        self.state.lock().await.ledger.remove(code)
    }

    pub async fn cart(&self) -> CartView {
        let state = self.state.lock().await;
        CartView {
            lines: state.ledger.lines().to_vec(),
            totals: CartTotals::compute(&state.ledger, self.config.tax_rate()),
        }
    }

    // =========================================================================
    // Purchase
    // =========================================================================

    /// Commits the cart. Only one purchase runs at a time; a second trigger
    /// while one is in flight fails with `CommitInProgress`.
    ///
    /// After a failed total fetch the next call only retries the fetch; see
    /// [`total_pending`](Self::total_pending).
    pub async fn purchase(&self) -> TerminalResult<PurchaseReceipt> {
        if self.committing.swap(true, Ordering::AcqRel) {
            debug!(activation = %self.activation_id, "Purchase already in flight");
            return Err(TerminalError::CommitInProgress);
        }
        let _flag = CommitFlag(&self.committing);

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let result = purchase::commit(
            self.service.as_ref(),
            &mut state.session,
            &mut state.ledger,
            self.config.tax_rate(),
        )
        .await;

        match result {
            Ok(receipt) => {
                state.lookup.reset();
                let notice = if receipt.is_complete() {
                    Notice::PurchaseCompleted {
                        amount: receipt.tax_inclusive,
                    }
                } else {
                    Notice::PurchaseIncomplete {
                        amount: receipt.tax_inclusive,
                        failed_units: receipt.failed_units(),
                    }
                };
                state.lookup.set_notice(notice);
                self.scanner.stop();

                if self.config.transaction_policy() == TransactionPolicy::PerPurchase {
                    state.session.close();
                    if let Err(e) = state.session.open(self.service.as_ref()).await {
                        warn!(error = %e, "Could not open the next transaction");
                    }
                }

                Ok(receipt)
            }
            Err(e) => {
                if !matches!(e, TerminalError::Core(CoreError::EmptyCart)) {
                    state.lookup.set_notice(Notice::PurchaseFailed);
                }
                Err(e)
            }
        }
    }

    /// True when the last purchase wrote its details but never read a total.
    pub async fn total_pending(&self) -> bool {
        self.state.lock().await.session.has_pending_total()
    }

    /// Puts units a purchase could not write back into the cart.
    pub async fn requeue_failed(&self, receipt: PurchaseReceipt) -> Vec<(String, TerminalError)> {
        let mut state = self.state.lock().await;
        purchase::requeue_failed(&mut state.ledger, receipt)
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Releases the camera if a scan is starting or running.
    pub fn unmount(&self) {
        info!(activation = %self.activation_id, "Unmounting checkout screen");
        self.scanner.teardown();
    }
}

impl Drop for CheckoutScreen {
    fn drop(&mut self) {
        self.scanner.teardown();
    }
}

fn add_to_cart(state: &mut ScreenState, product: &Product) -> TerminalResult<u32> {
    match state.ledger.add_or_merge(product) {
        Ok(quantity) => {
            debug!(code = %product.code, quantity, "Added to cart");
            Ok(quantity)
        }
        Err(e) => {
            state.lookup.set_notice(Notice::QuantityOutOfRange {
                code: product.code.clone(),
            });
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{FrameEvent, ScanFeed, ScanHandle};
    use crate::service::{MemoryTransactionService, ServiceCall};
    use async_trait::async_trait;
    use pos_core::Money;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    struct CountingHandle(Arc<AtomicUsize>);

    impl ScanHandle for CountingHandle {
        fn release(self: Box<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Camera that decodes a fixed list of codes, one per acquisition.
    #[derive(Default)]
    struct FixedCamera {
        codes: std::sync::Mutex<Vec<String>>,
        released: Arc<AtomicUsize>,
        broken: AtomicBool,
        senders: std::sync::Mutex<Vec<mpsc::Sender<FrameEvent>>>,
    }

    impl FixedCamera {
        fn decoding(codes: &[&str]) -> Self {
            FixedCamera {
                codes: std::sync::Mutex::new(codes.iter().rev().map(|c| c.to_string()).collect()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ScanDevice for FixedCamera {
        async fn acquire(&self) -> TerminalResult<ScanFeed> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(TerminalError::Acquisition("NotAllowedError".into()));
            }
            let (tx, rx) = mpsc::channel(8);
            tx.try_send(FrameEvent::NoDecode).unwrap();
            if let Some(code) = self.codes.lock().unwrap().pop() {
                tx.try_send(FrameEvent::Decoded(code)).unwrap();
            }
            self.senders.lock().unwrap().push(tx);
            Ok(ScanFeed {
                frames: rx,
                handle: Box::new(CountingHandle(self.released.clone())),
            })
        }
    }

    fn tea() -> Product {
        Product::new(1, "A1", "Tea", Money::from_yen(150))
    }

    fn backend() -> Arc<MemoryTransactionService> {
        Arc::new(
            MemoryTransactionService::new()
                .with_next_transaction_id(7)
                .with_product(tea())
                .with_product(Product::new(2, "B2", "Bread", Money::from_yen(105))),
        )
    }

    async fn mount_with(
        config: TerminalConfig,
        service: Arc<MemoryTransactionService>,
        camera: Arc<FixedCamera>,
    ) -> CheckoutScreen {
        CheckoutScreen::mount(config, service, camera).await
    }

    async fn mount(service: Arc<MemoryTransactionService>) -> CheckoutScreen {
        mount_with(TerminalConfig::default(), service, Arc::new(FixedCamera::default())).await
    }

    #[tokio::test]
    async fn test_scan_twice_and_purchase() {
        let service = backend();
        let camera = Arc::new(FixedCamera::decoding(&["A1", "A1"]));
        let screen = mount_with(TerminalConfig::default(), service.clone(), camera.clone()).await;
        assert_eq!(screen.transaction_id().await, Some(TransactionId(7)));

        screen.scan_and_read().await.unwrap();
        let cart = screen.cart().await;
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 1);
        let display = screen.lookup_display().await;
        assert_eq!(display.product, Some(tea()));
        assert!(display.code_input.is_empty());

        screen.scan_and_read().await.unwrap();
        let cart = screen.cart().await;
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 2);
        assert_eq!(cart.totals.subtotal, Money::from_yen(300));
        assert_eq!(camera.released.load(Ordering::SeqCst), 2);

        let receipt = screen.purchase().await.unwrap();
        assert_eq!(receipt.server_total, Money::from_yen(300));
        assert_eq!(receipt.tax_inclusive, Money::from_yen(330));

        let writes = service
            .calls()
            .into_iter()
            .filter(|c| matches!(c, ServiceCall::AddDetail { .. }))
            .count();
        assert_eq!(writes, 2);
        assert!(service.details(TransactionId(7)).iter().all(|d| d.product_id == 1));

        assert!(screen.cart().await.lines.is_empty());
        assert_eq!(
            screen.notice().await,
            Some(Notice::PurchaseCompleted {
                amount: Money::from_yen(330)
            })
        );
        assert!(screen.lookup_display().await.product.is_none());
    }

    #[tokio::test]
    async fn test_unknown_code_leaves_cart_alone() {
        let service = backend();
        let screen = mount(service.clone()).await;
        screen.read_code("A1").await.unwrap();

        let outcome = screen.read_code("ZZZ").await.unwrap();

        assert!(matches!(outcome, LookupOutcome::NotFound { .. }));
        assert_eq!(screen.cart().await.lines.len(), 1);
        assert_eq!(
            screen.notice().await,
            Some(Notice::NotRegistered { code: "ZZZ".into() })
        );
        assert!(!service
            .calls()
            .iter()
            .any(|c| matches!(c, ServiceCall::AddDetail { .. })));
    }

    #[tokio::test]
    async fn test_out_of_range_quantity_is_rejected() {
        let screen = mount(backend()).await;
        screen.read_code("A1").await.unwrap();
        screen.set_quantity("A1", 3).await.unwrap();

        let err = screen.set_quantity("A1", 150).await.unwrap_err();

        assert!(matches!(err, TerminalError::Core(CoreError::QuantityOutOfRange { .. })));
        assert_eq!(screen.cart().await.lines[0].quantity, 3);
        assert_eq!(
            screen.notice().await,
            Some(Notice::QuantityOutOfRange { code: "A1".into() })
        );
        assert!(!screen.set_quantity("ZZZ", 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_blank_code_does_nothing() {
        let service = backend();
        let screen = mount(service.clone()).await;
        let calls_before = service.calls().len();

        let outcome = screen.read_code("  ").await.unwrap();

        assert!(matches!(outcome, LookupOutcome::Skipped));
        assert_eq!(service.calls().len(), calls_before);
        assert_eq!(screen.lookup_display().await, LookupDisplay::new());
    }

    #[tokio::test]
    async fn test_manual_add_flow() {
        let mut config = TerminalConfig::default();
        config.checkout.auto_add = false;
        let screen = mount_with(config, backend(), Arc::new(FixedCamera::default())).await;

        assert!(matches!(
            screen.add_found_product().await,
            Err(TerminalError::NoProductLoaded)
        ));

        screen.read_code("B2").await.unwrap();
        assert!(screen.cart().await.lines.is_empty());
        assert_eq!(screen.lookup_display().await.product.map(|p| p.code), Some("B2".into()));

        assert_eq!(screen.add_found_product().await.unwrap(), 1);
        assert_eq!(screen.cart().await.totals.subtotal, Money::from_yen(105));
        assert!(screen.lookup_display().await.product.is_none());
    }

    #[tokio::test]
    async fn test_purchase_without_transaction_is_blocked() {
        let service = backend();
        service.set_fail_create(true);
        let screen = mount(service.clone()).await;
        assert_eq!(screen.transaction_id().await, None);

        screen.read_code("A1").await.unwrap();
        let err = screen.purchase().await.unwrap_err();
        assert!(matches!(err, TerminalError::NoActiveTransaction));
        assert_eq!(screen.cart().await.lines.len(), 1);
        assert_eq!(screen.notice().await, Some(Notice::PurchaseFailed));

        service.set_fail_create(false);
        assert_eq!(screen.open_transaction().await.unwrap(), TransactionId(7));
        assert!(screen.purchase().await.is_ok());
    }

    #[tokio::test]
    async fn test_transaction_policy() {
        let service = backend();
        let screen = mount(service.clone()).await;
        screen.read_code("A1").await.unwrap();
        screen.purchase().await.unwrap();
        screen.read_code("A1").await.unwrap();
        let second = screen.purchase().await.unwrap();
        assert_eq!(second.transaction_id, TransactionId(7));
        assert_eq!(second.server_total, Money::from_yen(300));

        let service = backend();
        let mut config = TerminalConfig::default();
        config.checkout.transaction_policy = TransactionPolicy::PerPurchase;
        let screen = mount_with(config, service.clone(), Arc::new(FixedCamera::default())).await;
        screen.read_code("A1").await.unwrap();
        screen.purchase().await.unwrap();
        assert_eq!(screen.transaction_id().await, Some(TransactionId(8)));
        screen.read_code("A1").await.unwrap();
        let second = screen.purchase().await.unwrap();
        assert_eq!(second.transaction_id, TransactionId(8));
        assert_eq!(second.server_total, Money::from_yen(150));
    }

    #[tokio::test]
    async fn test_second_purchase_while_committing_is_rejected() {
        let screen = Arc::new(mount(backend()).await);
        screen.read_code("A1").await.unwrap();

        let state = screen.state.lock().await;
        let first = tokio::spawn({
            let screen = screen.clone();
            async move { screen.purchase().await }
        });
        while !screen.committing.load(Ordering::Acquire) {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            screen.purchase().await,
            Err(TerminalError::CommitInProgress)
        ));

        drop(state);
        assert!(first.await.unwrap().is_ok());
        assert!(matches!(
            screen.purchase().await,
            Err(TerminalError::Core(CoreError::EmptyCart))
        ));
    }

    #[tokio::test]
    async fn test_failed_details_can_be_requeued() {
        let service = backend();
        service.reject_details_for("B2");
        let screen = mount(service.clone()).await;
        screen.read_code("A1").await.unwrap();
        screen.read_code("B2").await.unwrap();

        let receipt = screen.purchase().await.unwrap();
        assert_eq!(receipt.failed_units(), 1);
        assert!(screen.cart().await.lines.is_empty());
        assert_eq!(
            screen.notice().await,
            Some(Notice::PurchaseIncomplete {
                amount: Money::from_yen(165),
                failed_units: 1
            })
        );

        assert!(screen.requeue_failed(receipt).await.is_empty());
        let cart = screen.cart().await;
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].code, "B2");
    }

    #[tokio::test]
    async fn test_purchase_retry_after_total_failure() {
        let service = backend();
        let screen = mount(service.clone()).await;
        screen.read_code("A1").await.unwrap();
        screen.read_code("A1").await.unwrap();

        service.set_fail_get(true);
        assert!(screen.purchase().await.is_err());
        assert!(screen.total_pending().await);
        assert_eq!(screen.cart().await.lines[0].quantity, 2);
        assert_eq!(screen.notice().await, Some(Notice::PurchaseFailed));

        service.set_fail_get(false);
        let receipt = screen.purchase().await.unwrap();

        let writes = service
            .calls()
            .into_iter()
            .filter(|c| matches!(c, ServiceCall::AddDetail { .. }))
            .count();
        assert_eq!(writes, 2);
        assert_eq!(receipt.server_total, Money::from_yen(300));
        assert_eq!(receipt.tax_inclusive, Money::from_yen(330));
        assert!(!screen.total_pending().await);
        assert!(screen.cart().await.lines.is_empty());
    }

    #[tokio::test]
    async fn test_negative_price_never_reaches_cart() {
        let service = Arc::new(MemoryTransactionService::new().with_product(Product::new(
            9,
            "NEG",
            "Refund",
            Money::from_yen(-500),
        )));
        let screen = mount(service).await;

        let outcome = screen.read_code("NEG").await.unwrap();

        assert!(matches!(outcome, LookupOutcome::Failed { .. }));
        assert!(screen.cart().await.lines.is_empty());
        assert_eq!(screen.notice().await, Some(Notice::LookupFailed));
    }

    #[tokio::test]
    async fn test_camera_failure_sets_notice() {
        let camera = Arc::new(FixedCamera::default());
        camera.broken.store(true, Ordering::SeqCst);
        let screen = mount_with(TerminalConfig::default(), backend(), camera).await;

        assert!(screen.scan_and_read().await.is_err());
        assert_eq!(screen.notice().await, Some(Notice::CameraUnavailable));
        assert_eq!(screen.scan_state(), ScanState::Idle);
    }

    #[tokio::test]
    async fn test_unmount_releases_active_camera() {
        let camera = Arc::new(FixedCamera::default());
        let screen = Arc::new(mount_with(TerminalConfig::default(), backend(), camera.clone()).await);

        let scanning = tokio::spawn({
            let screen = screen.clone();
            async move { screen.scan_and_read().await }
        });
        while screen.scan_state() != ScanState::Active {
            tokio::task::yield_now().await;
        }

        screen.unmount();
        assert_eq!(camera.released.load(Ordering::SeqCst), 1);
        assert!(scanning.await.unwrap().unwrap().is_none());
        assert_eq!(camera.released.load(Ordering::SeqCst), 1);
    }
}
