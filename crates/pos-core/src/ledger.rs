//! # Cart Ledger
//!
//! The in-memory purchase list of the checkout screen.
//!
//! ## Ledger Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Ledger Operations                               │
//! │                                                                         │
//! │  Screen Event             Ledger Call             State Change          │
//! │  ────────────             ───────────             ────────────          │
//! │                                                                         │
//! │  Lookup found ───────────► add_or_merge() ──────► push or qty += 1     │
//! │                                                                         │
//! │  Edit quantity ──────────► set_quantity() ──────► lines[i].qty = n     │
//! │                                                                         │
//! │  Click remove ───────────► remove() ────────────► lines.remove(i)      │
//! │                                                                         │
//! │  Purchase committed ─────► clear() ─────────────► lines.clear()        │
//! │                                                                         │
//! │  Cart footer ────────────► subtotal() ──────────► (read only)          │
//! │                                                                         │
//! │  NOTE: Every quantity change, merges included, goes through the same   │
//! │        1..=99 check. A rejected change leaves the line untouched.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, TaxRate};
use crate::types::Product;
use crate::validation::validate_quantity;
use crate::{MAX_LINE_QUANTITY, MIN_LINE_QUANTITY};

/// One aggregated cart entry per distinct product code.
///
/// ## Price Freezing
/// Name and unit price are copied from the product when the line is created.
/// If the master price changes afterwards, this line keeps the old price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    /// Server product id (needed for detail records).
    pub product_id: i64,

    /// Product code at time of adding. Unique across the ledger.
    pub code: String,

    /// Product name at time of adding (frozen).
    pub name: String,

    /// Unit price at time of adding (frozen).
    pub unit_price: Money,

    /// Quantity in cart, always within 1..=99.
    pub quantity: u32,
}

impl CartLine {
    /// Creates a line for `quantity` units of `product`.
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        CartLine {
            product_id: product.id,
            code: product.code.clone(),
            name: product.name.clone(),
            unit_price: product.price,
            quantity,
        }
    }

    /// Calculates the line total (unit price × quantity).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// The cart ledger.
///
/// ## Invariants
/// - Lines are unique by `code` (adding the same code increases quantity)
/// - Every quantity is within 1..=99
/// - Lines keep the order in which their codes were first added
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLedger {
    lines: Vec<CartLine>,
}

impl CartLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        CartLedger { lines: Vec::new() }
    }

    /// Adds one unit of a product, merging into an existing line.
    ///
    /// ## Behavior
    /// - Code already in ledger: quantity + 1, checked against the 99 cap
    /// - Code not in ledger: new line with quantity 1
    ///
    /// ## Returns
    /// The line's quantity after the add.
    pub fn add_or_merge(&mut self, product: &Product) -> CoreResult<u32> {
        self.merge_line(CartLine::from_product(product, MIN_LINE_QUANTITY))
    }

    /// Merges a whole line into the ledger.
    ///
    /// If a line with the same code exists its quantity grows by
    /// `line.quantity` (keeping the existing price snapshot); otherwise the
    /// line is appended. Used both for scans and for putting failed units
    /// back after a partial purchase.
    pub fn merge_line(&mut self, line: CartLine) -> CoreResult<u32> {
        let existing = self.line(&line.code).map(|l| l.quantity);
        if let Some(current) = existing {
            let requested = current as i64 + line.quantity as i64;
            self.set_quantity(&line.code, requested)?;
            return Ok(requested as u32);
        }

        validate_quantity(line.quantity as i64)
            .map_err(|_| out_of_range(&line.code, line.quantity as i64))?;
        let quantity = line.quantity;
        self.lines.push(line);
        Ok(quantity)
    }

    /// Replaces the quantity of the line with this code.
    ///
    /// ## Behavior
    /// - No matching line: no-op, returns `Ok(false)`
    /// - Quantity outside 1..=99: `QuantityOutOfRange`, line unchanged
    /// - Otherwise the quantity is replaced and `Ok(true)` returned
    pub fn set_quantity(&mut self, code: &str, quantity: i64) -> CoreResult<bool> {
        let Some(line) = self.lines.iter_mut().find(|l| l.code == code) else {
            return Ok(false);
        };

        let quantity = validate_quantity(quantity).map_err(|_| out_of_range(code, quantity))?;
        line.quantity = quantity;
        Ok(true)
    }

    /// Removes the line with this code. Returns whether a line was removed.
    pub fn remove(&mut self, code: &str) -> bool {
        let initial_len = self.lines.len();
        self.lines.retain(|l| l.code != code);
        self.lines.len() != initial_len
    }

    /// Clears all lines (after a committed purchase).
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Returns the lines in insertion order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Returns the line for a code, if present.
    pub fn line(&self, code: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.code == code)
    }

    /// Returns the number of distinct codes in the ledger.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the total quantity of all lines.
    pub fn total_units(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of unit price × quantity over all lines, before tax.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Expands the ledger into one entry per purchased unit.
    ///
    /// A line of quantity N appears N times, lines in ledger order. This is
    /// the shape the transaction service needs, since it records one detail
    /// per unit.
    pub fn units(&self) -> impl Iterator<Item = &CartLine> + '_ {
        self.lines
            .iter()
            .flat_map(|line| std::iter::repeat(line).take(line.quantity as usize))
    }
}

fn out_of_range(code: &str, requested: i64) -> CoreError {
    CoreError::QuantityOutOfRange {
        code: code.to_string(),
        requested,
        min: MIN_LINE_QUANTITY,
        max: MAX_LINE_QUANTITY,
    }
}

/// Cart totals summary for the screen footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartTotals {
    pub line_count: usize,
    pub total_units: u32,
    /// Local untaxed subtotal.
    pub subtotal: Money,
    /// Local preview of the tax-inclusive amount. The confirmed amount is
    /// computed from the server total at purchase time.
    pub tax_inclusive_preview: Money,
}

impl CartTotals {
    pub fn compute(ledger: &CartLedger, rate: TaxRate) -> Self {
        let subtotal = ledger.subtotal();
        CartTotals {
            line_count: ledger.len(),
            total_units: ledger.total_units(),
            subtotal,
            tax_inclusive_preview: subtotal.with_tax(rate),
        }
    }
}
