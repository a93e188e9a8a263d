//! Invoice lifecycle service.
//!
//! # Responsibility
//! - Create invoices (one per appointment) and edit their amounts while
//!   the invoice is still mutable.
//! - Enforce the monotonic-forward status guard.
//!
//! # Invariants
//! - Mutable iff status < `Paid` and not `Cancelled`; applied uniformly.
//! - An amount edit never pushes `total_amount` below the recorded
//!   payments, keeping the payment-bound invariant intact.

use crate::model::appointment::{AppointmentId, PatientId};
use crate::model::invoice::{status_after_payment, Invoice, InvoiceId, InvoiceStatus, Money};
use crate::repo::invoice_repo::InvoiceRepository;
use crate::repo::payment_repo::PaymentRepository;
use crate::repo::{RepoError, TxScope};
use chrono::{Local, NaiveDate, NaiveDateTime};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Business outcomes of invoice operations.
#[derive(Debug)]
pub enum BillingError {
    AppointmentAlreadyHasInvoice(AppointmentId),
    AmountNotPositive,
    TaxNegative,
    DiscountNegative,
    DiscountExceedsTotal,
    DueDateInPast,
    /// Invoices are only created in `Draft` or `Issued`.
    InvalidInitialStatus(InvoiceStatus),
    InvalidDateRange,
    InvoiceNotFound(InvoiceId),
    InvoiceAlreadyPaid,
    InvoiceCancelled,
    InvalidStatusTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },
    /// The edit would leave `total_amount` below the payments on record.
    TotalBelowAmountPaid {
        total: Money,
        paid: Money,
    },
    Repo(RepoError),
}

impl Display for BillingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AppointmentAlreadyHasInvoice(id) => {
                write!(f, "appointment {id} already has an invoice")
            }
            Self::AmountNotPositive => write!(f, "total amount must be greater than zero"),
            Self::TaxNegative => write!(f, "tax amount cannot be negative"),
            Self::DiscountNegative => write!(f, "discount amount cannot be negative"),
            Self::DiscountExceedsTotal => write!(f, "discount cannot exceed the total amount"),
            Self::DueDateInPast => write!(f, "due date cannot be in the past"),
            Self::InvalidInitialStatus(status) => {
                write!(f, "invoices cannot be created in status {status:?}")
            }
            Self::InvalidDateRange => write!(f, "range start must not be after range end"),
            Self::InvoiceNotFound(id) => write!(f, "invoice not found: {id}"),
            Self::InvoiceAlreadyPaid => write!(f, "invoice is fully paid and locked"),
            Self::InvoiceCancelled => write!(f, "invoice is cancelled"),
            Self::InvalidStatusTransition { from, to } => {
                write!(f, "illegal invoice status transition {from:?} -> {to:?}")
            }
            Self::TotalBelowAmountPaid { total, paid } => write!(
                f,
                "total amount {total} cannot fall below the {paid} already paid"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BillingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for BillingError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Request model for creating an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInvoiceRequest {
    pub appointment_uuid: AppointmentId,
    pub patient_uuid: PatientId,
    pub total_amount: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub due_date: Option<NaiveDate>,
    /// `Draft` or `Issued`; defaults to `Issued` when omitted.
    pub status: Option<InvoiceStatus>,
}

/// Use-case service for invoice creation, amount edits and status moves.
pub struct BillingService<I, P>
where
    I: InvoiceRepository + TxScope,
    P: PaymentRepository,
{
    invoices: I,
    payments: P,
}

impl<I, P> BillingService<I, P>
where
    I: InvoiceRepository + TxScope,
    P: PaymentRepository,
{
    pub fn new(invoices: I, payments: P) -> Self {
        Self { invoices, payments }
    }

    /// Creates an invoice for an appointment against the wall clock.
    pub fn create_invoice(&self, request: &CreateInvoiceRequest) -> Result<Invoice, BillingError> {
        self.create_invoice_at(request, Local::now().naive_local())
    }

    /// Creates an invoice with an explicit "now" (clock injection point).
    ///
    /// # Contract
    /// - Fails `AppointmentAlreadyHasInvoice` when the appointment is
    ///   already billed (uniqueness check and insert commit as one unit).
    /// - `total > 0`, `tax >= 0`, `discount >= 0`, `discount <= total`,
    ///   `due_date >= today` when supplied.
    pub fn create_invoice_at(
        &self,
        request: &CreateInvoiceRequest,
        now: NaiveDateTime,
    ) -> Result<Invoice, BillingError> {
        validate_amounts(
            request.total_amount,
            request.tax_amount,
            request.discount_amount,
        )?;
        if let Some(due_date) = request.due_date {
            if due_date < now.date() {
                return Err(BillingError::DueDateInPast);
            }
        }
        let status = request.status.unwrap_or(InvoiceStatus::Issued);
        if !matches!(status, InvoiceStatus::Draft | InvoiceStatus::Issued) {
            return Err(BillingError::InvalidInitialStatus(status));
        }

        self.invoices.with_tx(|| {
            if let Some(existing) = self.invoices.find_by_appointment(request.appointment_uuid)? {
                return Err(BillingError::AppointmentAlreadyHasInvoice(
                    existing.appointment_uuid,
                ));
            }

            let invoice = Invoice {
                uuid: uuid::Uuid::new_v4(),
                appointment_uuid: request.appointment_uuid,
                patient_uuid: request.patient_uuid,
                total_amount: request.total_amount,
                tax_amount: request.tax_amount,
                discount_amount: request.discount_amount,
                due_date: request.due_date,
                status,
                created_at: now,
            };
            self.invoices.insert(&invoice)?;
            info!(
                "event=invoice_created module=billing status=ok invoice={} appointment={} total={}",
                invoice.uuid, invoice.appointment_uuid, invoice.total_amount
            );
            Ok(invoice)
        })
    }

    /// Edits the monetary amounts of a still-mutable invoice.
    ///
    /// When payments are on record the status is re-derived from the new
    /// total in the same transaction, so lowering the total to exactly the
    /// paid sum settles the invoice as `Paid` instead of stranding it.
    pub fn update_amounts(
        &self,
        id: InvoiceId,
        total_amount: Money,
        tax_amount: Money,
        discount_amount: Money,
    ) -> Result<(), BillingError> {
        validate_amounts(total_amount, tax_amount, discount_amount)?;

        self.invoices.with_tx(|| {
            let invoice = self
                .invoices
                .get(id)?
                .ok_or(BillingError::InvoiceNotFound(id))?;
            check_mutable(invoice.status)?;

            let paid = self.payments.total_paid(id)?;
            if total_amount < paid {
                return Err(BillingError::TotalBelowAmountPaid {
                    total: total_amount,
                    paid,
                });
            }

            self.invoices
                .update_amounts(id, total_amount, tax_amount, discount_amount)?;

            if paid > Money::ZERO {
                let new_status = status_after_payment(total_amount, paid);
                if new_status != invoice.status {
                    self.invoices.update_status(id, new_status)?;
                }
            }

            info!(
                "event=invoice_amounts module=billing status=ok invoice={id} total={total_amount}"
            );
            Ok(())
        })
    }

    /// Moves an invoice's status, enforcing the monotonic-forward guard:
    /// once at or beyond `Paid`, a strictly lower target is illegal.
    pub fn transition_status(
        &self,
        id: InvoiceId,
        new_status: InvoiceStatus,
    ) -> Result<(), BillingError> {
        self.invoices.with_tx(|| {
            let invoice = self
                .invoices
                .get(id)?
                .ok_or(BillingError::InvoiceNotFound(id))?;

            if invoice.status >= InvoiceStatus::Paid && new_status < invoice.status {
                return Err(BillingError::InvalidStatusTransition {
                    from: invoice.status,
                    to: new_status,
                });
            }

            self.invoices.update_status(id, new_status)?;
            info!(
                "event=invoice_status module=billing status=ok invoice={id} from={:?} to={new_status:?}",
                invoice.status
            );
            Ok(())
        })
    }

    /// Gets one invoice; absence is a normal outcome.
    pub fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, BillingError> {
        Ok(self.invoices.get(id)?)
    }

    /// Lists a patient's invoices, newest first.
    pub fn invoices_for_patient(
        &self,
        patient_uuid: PatientId,
    ) -> Result<Vec<Invoice>, BillingError> {
        Ok(self.invoices.list_for_patient(patient_uuid)?)
    }

    /// Lists invoices created within `[start, end]`.
    pub fn invoices_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Invoice>, BillingError> {
        if start > end {
            return Err(BillingError::InvalidDateRange);
        }
        Ok(self.invoices.list_between(start, end)?)
    }

    /// Revenue recognized within `[start, end]`: the summed totals of
    /// `Paid` invoices created in the range.
    pub fn total_revenue(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Money, BillingError> {
        if start > end {
            return Err(BillingError::InvalidDateRange);
        }
        let invoices = self.invoices.list_between(start, end)?;
        Ok(invoices
            .iter()
            .filter(|invoice| invoice.status == InvoiceStatus::Paid)
            .map(|invoice| invoice.total_amount)
            .sum())
    }

    /// Amount still owed across a patient's open invoices:
    /// sum of `total - paid` over non-Paid, non-Cancelled invoices.
    pub fn outstanding_balance(&self, patient_uuid: PatientId) -> Result<Money, BillingError> {
        let invoices = self.invoices.list_for_patient(patient_uuid)?;
        let mut balance = Money::ZERO;
        for invoice in invoices
            .iter()
            .filter(|invoice| invoice.status.is_mutable())
        {
            balance += invoice.total_amount - self.payments.total_paid(invoice.uuid)?;
        }
        Ok(balance)
    }
}

fn validate_amounts(
    total_amount: Money,
    tax_amount: Money,
    discount_amount: Money,
) -> Result<(), BillingError> {
    if total_amount <= Money::ZERO {
        return Err(BillingError::AmountNotPositive);
    }
    if tax_amount < Money::ZERO {
        return Err(BillingError::TaxNegative);
    }
    if discount_amount < Money::ZERO {
        return Err(BillingError::DiscountNegative);
    }
    if discount_amount > total_amount {
        return Err(BillingError::DiscountExceedsTotal);
    }
    Ok(())
}

fn check_mutable(status: InvoiceStatus) -> Result<(), BillingError> {
    match status {
        InvoiceStatus::Cancelled => Err(BillingError::InvoiceCancelled),
        InvoiceStatus::Paid => Err(BillingError::InvoiceAlreadyPaid),
        _ => Ok(()),
    }
}
