//! Invoice and line-item domain model.
//!
//! # Responsibility
//! - Define the invoice record, its ordered status ladder, and line items.
//! - Own the pure ledger math: line totals, subtotals, net amount, and the
//!   status derived from cumulative payments.
//!
//! # Invariants
//! - `InvoiceStatus` variant order is load-bearing: the monotonic-forward
//!   guard compares statuses with `<`/`>=`.
//! - `total_amount` mirrors the sum of line totals whenever the invoice has
//!   items; the ledger sync is the only write path allowed to change it
//!   outside an explicit amount edit.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::appointment::{AppointmentId, PatientId};

/// Stable identifier for an invoice.
pub type InvoiceId = Uuid;
/// Stable identifier for an invoice line item.
pub type InvoiceItemId = Uuid;
/// Monetary amount. Decimal, never floating point.
pub type Money = Decimal;

/// Invoice lifecycle state, ordered.
///
/// `Draft < Issued < PartiallyPaid < Paid < Cancelled` — the numeric order
/// of the source system, preserved so "at or beyond Paid" stays a plain
/// comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    PartiallyPaid,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    /// Returns whether amounts and line items may still be edited.
    ///
    /// Uniform rule: mutable iff the status is strictly below `Paid` and the
    /// invoice is not cancelled. `PartiallyPaid` invoices remain editable.
    pub fn is_mutable(self) -> bool {
        !matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }
}

/// Derives the invoice status implied by cumulative payments.
///
/// Reads: fully covered -> `Paid`, anything in between -> `PartiallyPaid`,
/// nothing recorded -> `Issued`.
pub fn status_after_payment(total_amount: Money, total_paid: Money) -> InvoiceStatus {
    if total_paid >= total_amount {
        InvoiceStatus::Paid
    } else if total_paid > Money::ZERO {
        InvoiceStatus::PartiallyPaid
    } else {
        InvoiceStatus::Issued
    }
}

/// Canonical invoice record.
///
/// At most one invoice exists per appointment; the storage layer enforces
/// that with a unique constraint as the final backstop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Stable global id.
    pub uuid: InvoiceId,
    pub appointment_uuid: AppointmentId,
    pub patient_uuid: PatientId,
    /// Cached sum of line totals once items exist; manual until then.
    pub total_amount: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    /// Optional payment deadline; never in the past at creation time.
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub created_at: NaiveDateTime,
}

impl Invoice {
    /// Amount actually owed: `total + tax - discount`.
    pub fn net_amount(&self) -> Money {
        self.total_amount + self.tax_amount - self.discount_amount
    }
}

/// One billable line on an invoice, owned exclusively by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    /// Stable global id.
    pub uuid: InvoiceItemId,
    pub invoice_uuid: InvoiceId,
    pub description: String,
    /// Non-negative unit price.
    pub unit_price: Money,
    /// Positive whole-unit count.
    pub quantity: u32,
}

impl InvoiceItem {
    /// Extended price of this line: `unit_price * quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price * Money::from(self.quantity)
    }
}

/// Sums line totals into the invoice subtotal. An empty item set is 0.
pub fn subtotal(items: &[InvoiceItem]) -> Money {
    items.iter().map(InvoiceItem::line_total).sum()
}
