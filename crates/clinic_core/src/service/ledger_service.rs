//! Line-item ledger service.
//!
//! # Responsibility
//! - Maintain the billable items attached to an invoice.
//! - Re-sync the invoice's cached total after every item mutation.
//!
//! # Invariants
//! - Items change only while the owning invoice is mutable.
//! - After any successful mutation, `invoice.total_amount` equals the sum
//!   of its line totals; mutation and sync commit as one unit.

use crate::model::invoice::{subtotal, InvoiceId, InvoiceItem, InvoiceItemId, InvoiceStatus, Money};
use crate::repo::invoice_repo::InvoiceRepository;
use crate::repo::item_repo::InvoiceItemRepository;
use crate::repo::payment_repo::PaymentRepository;
use crate::repo::{RepoError, TxScope};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DESCRIPTION_MAX_CHARS: usize = 200;

/// Business outcomes of ledger operations.
#[derive(Debug)]
pub enum LedgerError {
    InvoiceNotFound(InvoiceId),
    ItemNotFound(InvoiceItemId),
    /// Owning invoice is fully paid; its item set is frozen.
    InvoiceAlreadyClosed,
    InvoiceCancelled,
    DescriptionRequired,
    DescriptionTooLong,
    UnitPriceNegative,
    QuantityNotPositive,
    /// The mutation would leave the subtotal below the payments on record.
    TotalBelowAmountPaid {
        subtotal: Money,
        paid: Money,
    },
    Repo(RepoError),
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvoiceNotFound(id) => write!(f, "invoice not found: {id}"),
            Self::ItemNotFound(id) => write!(f, "invoice item not found: {id}"),
            Self::InvoiceAlreadyClosed => write!(f, "invoice is fully paid and closed to edits"),
            Self::InvoiceCancelled => write!(f, "invoice is cancelled"),
            Self::DescriptionRequired => write!(f, "item description is required"),
            Self::DescriptionTooLong => {
                write!(f, "item description exceeds {DESCRIPTION_MAX_CHARS} characters")
            }
            Self::UnitPriceNegative => write!(f, "unit price cannot be negative"),
            Self::QuantityNotPositive => write!(f, "quantity must be a positive integer"),
            Self::TotalBelowAmountPaid { subtotal, paid } => write!(
                f,
                "item subtotal {subtotal} cannot fall below the {paid} already paid"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LedgerError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Request model for adding a billable item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItemRequest {
    pub invoice_uuid: InvoiceId,
    pub description: String,
    pub unit_price: Money,
    pub quantity: u32,
}

/// Request model for replacing an item's billable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateItemRequest {
    pub item_uuid: InvoiceItemId,
    pub description: String,
    pub unit_price: Money,
    pub quantity: u32,
}

/// Use-case service keeping invoice totals in step with their items.
pub struct LineItemLedger<I, T, P>
where
    I: InvoiceRepository,
    T: InvoiceItemRepository + TxScope,
    P: PaymentRepository,
{
    invoices: I,
    items: T,
    payments: P,
}

impl<I, T, P> LineItemLedger<I, T, P>
where
    I: InvoiceRepository,
    T: InvoiceItemRepository + TxScope,
    P: PaymentRepository,
{
    pub fn new(invoices: I, items: T, payments: P) -> Self {
        Self {
            invoices,
            items,
            payments,
        }
    }

    /// Adds an item to a mutable invoice and re-syncs its total.
    pub fn add_item(&self, request: &NewItemRequest) -> Result<InvoiceItem, LedgerError> {
        validate_item_fields(&request.description, request.unit_price, request.quantity)?;

        self.items.with_tx(|| {
            let invoice = self
                .invoices
                .get(request.invoice_uuid)?
                .ok_or(LedgerError::InvoiceNotFound(request.invoice_uuid))?;
            check_mutable(invoice.status)?;

            let item = InvoiceItem {
                uuid: uuid::Uuid::new_v4(),
                invoice_uuid: request.invoice_uuid,
                description: request.description.clone(),
                unit_price: request.unit_price,
                quantity: request.quantity,
            };
            self.items.insert(&item)?;
            self.sync_total(request.invoice_uuid)?;
            Ok(item)
        })
    }

    /// Replaces an item's billable fields and re-syncs the invoice total.
    pub fn update_item(&self, request: &UpdateItemRequest) -> Result<(), LedgerError> {
        validate_item_fields(&request.description, request.unit_price, request.quantity)?;

        self.items.with_tx(|| {
            let existing = self
                .items
                .get(request.item_uuid)?
                .ok_or(LedgerError::ItemNotFound(request.item_uuid))?;
            let invoice = self
                .invoices
                .get(existing.invoice_uuid)?
                .ok_or(LedgerError::InvoiceNotFound(existing.invoice_uuid))?;
            check_mutable(invoice.status)?;

            let updated = InvoiceItem {
                description: request.description.clone(),
                unit_price: request.unit_price,
                quantity: request.quantity,
                ..existing
            };
            self.items.update(&updated)?;
            self.sync_total(updated.invoice_uuid)?;
            Ok(())
        })
    }

    /// Deletes an item and re-syncs the invoice total. Removing the last
    /// item legitimately leaves the total at zero.
    pub fn delete_item(&self, id: InvoiceItemId) -> Result<(), LedgerError> {
        self.items.with_tx(|| {
            let existing = self
                .items
                .get(id)?
                .ok_or(LedgerError::ItemNotFound(id))?;
            let invoice = self
                .invoices
                .get(existing.invoice_uuid)?
                .ok_or(LedgerError::InvoiceNotFound(existing.invoice_uuid))?;
            check_mutable(invoice.status)?;

            self.items.delete(id)?;
            self.sync_total(existing.invoice_uuid)?;
            Ok(())
        })
    }

    /// Lists an invoice's items; an empty list is a normal outcome.
    pub fn items_for_invoice(
        &self,
        invoice_uuid: InvoiceId,
    ) -> Result<Vec<InvoiceItem>, LedgerError> {
        Ok(self.items.list_for_invoice(invoice_uuid)?)
    }

    /// Recomputes the live subtotal from the item set.
    pub fn subtotal_for(&self, invoice_uuid: InvoiceId) -> Result<Money, LedgerError> {
        let items = self.items.list_for_invoice(invoice_uuid)?;
        Ok(subtotal(&items))
    }

    /// Pushes the recomputed subtotal into the invoice's cached total.
    ///
    /// This write bypasses the amount-edit mutability check because every
    /// caller in this service has already performed it.
    fn sync_total(&self, invoice_uuid: InvoiceId) -> Result<Money, LedgerError> {
        let items = self.items.list_for_invoice(invoice_uuid)?;
        let new_subtotal = subtotal(&items);

        let paid = self.payments.total_paid(invoice_uuid)?;
        if new_subtotal < paid {
            return Err(LedgerError::TotalBelowAmountPaid {
                subtotal: new_subtotal,
                paid,
            });
        }

        self.invoices.sync_total(invoice_uuid, new_subtotal)?;
        info!(
            "event=ledger_sync module=billing status=ok invoice={invoice_uuid} subtotal={new_subtotal}"
        );
        Ok(new_subtotal)
    }
}

fn validate_item_fields(
    description: &str,
    unit_price: Money,
    quantity: u32,
) -> Result<(), LedgerError> {
    if description.trim().is_empty() {
        return Err(LedgerError::DescriptionRequired);
    }
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(LedgerError::DescriptionTooLong);
    }
    if unit_price < Money::ZERO {
        return Err(LedgerError::UnitPriceNegative);
    }
    if quantity == 0 {
        return Err(LedgerError::QuantityNotPositive);
    }
    Ok(())
}

fn check_mutable(status: InvoiceStatus) -> Result<(), LedgerError> {
    match status {
        InvoiceStatus::Cancelled => Err(LedgerError::InvoiceCancelled),
        InvoiceStatus::Paid => Err(LedgerError::InvoiceAlreadyClosed),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_item_fields, LedgerError};
    use crate::model::invoice::Money;

    #[test]
    fn item_field_validation_catches_each_rule() {
        assert!(validate_item_fields("consultation", Money::from(150), 1).is_ok());
        assert!(validate_item_fields("free follow-up", Money::ZERO, 1).is_ok());
        assert!(matches!(
            validate_item_fields("  ", Money::from(1), 1),
            Err(LedgerError::DescriptionRequired)
        ));
        assert!(matches!(
            validate_item_fields(&"x".repeat(201), Money::from(1), 1),
            Err(LedgerError::DescriptionTooLong)
        ));
        assert!(matches!(
            validate_item_fields("lab work", Money::from(-1), 1),
            Err(LedgerError::UnitPriceNegative)
        ));
        assert!(matches!(
            validate_item_fields("lab work", Money::from(1), 0),
            Err(LedgerError::QuantityNotPositive)
        ));
    }
}
