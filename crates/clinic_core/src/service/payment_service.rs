//! Payment application service.
//!
//! # Responsibility
//! - Apply payments to invoices and derive the resulting invoice status.
//! - Answer per-method income queries for reporting.
//!
//! # Invariants
//! - A payment never exceeds the remaining balance; the sum of payments
//!   stays within `total_amount`.
//! - Precondition check, payment insert and status derivation commit as
//!   one unit; the derivation re-reads the paid sum after the insert.

use crate::model::invoice::{status_after_payment, InvoiceId, InvoiceStatus, Money};
use crate::model::payment::{is_valid_transaction_ref, Payment, PaymentMethod};
use crate::repo::invoice_repo::InvoiceRepository;
use crate::repo::payment_repo::PaymentRepository;
use crate::repo::{RepoError, TxScope};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Business outcomes of payment operations.
#[derive(Debug)]
pub enum PaymentError {
    InvoiceNotFound(InvoiceId),
    InvoiceCancelled,
    InvoiceAlreadyPaid,
    InvalidPaymentAmount,
    AmountExceedsRemainingBalance {
        requested: Money,
        remaining: Money,
    },
    /// Non-cash methods must carry a transaction reference.
    TransactionRefRequired,
    InvalidTransactionRef,
    Repo(RepoError),
}

impl Display for PaymentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvoiceNotFound(id) => write!(f, "invoice not found: {id}"),
            Self::InvoiceCancelled => write!(f, "cannot pay a cancelled invoice"),
            Self::InvoiceAlreadyPaid => write!(f, "invoice is already fully paid"),
            Self::InvalidPaymentAmount => write!(f, "payment amount must be greater than zero"),
            Self::AmountExceedsRemainingBalance {
                requested,
                remaining,
            } => write!(
                f,
                "payment of {requested} exceeds the remaining balance of {remaining}"
            ),
            Self::TransactionRefRequired => {
                write!(f, "a transaction reference is required for this method")
            }
            Self::InvalidTransactionRef => write!(
                f,
                "transaction reference must be 3-50 alphanumeric or dash characters"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PaymentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for PaymentError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Request model for applying a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub invoice_uuid: InvoiceId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub transaction_ref: Option<String>,
}

/// Per-method income aggregate for one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodIncome {
    pub method: PaymentMethod,
    pub total: Money,
}

/// Use-case service applying payments and deriving invoice status.
pub struct PaymentService<I, P>
where
    I: InvoiceRepository,
    P: PaymentRepository + TxScope,
{
    invoices: I,
    payments: P,
}

impl<I, P> PaymentService<I, P>
where
    I: InvoiceRepository,
    P: PaymentRepository + TxScope,
{
    pub fn new(invoices: I, payments: P) -> Self {
        Self { invoices, payments }
    }

    /// Applies a payment against the wall clock.
    pub fn apply(&self, request: &PaymentRequest) -> Result<Payment, PaymentError> {
        self.apply_at(request, Local::now().naive_local())
    }

    /// Applies a payment with an explicit "now" (clock injection point).
    ///
    /// # Contract
    /// - Preconditions are checked in order: invoice exists, not
    ///   cancelled, not already paid, amount positive, amount within the
    ///   remaining balance, reference valid for the method.
    /// - On success the invoice status is re-derived from a fresh paid
    ///   sum: `Paid` when covered, otherwise `PartiallyPaid`.
    pub fn apply_at(
        &self,
        request: &PaymentRequest,
        now: NaiveDateTime,
    ) -> Result<Payment, PaymentError> {
        self.payments.with_tx(|| {
            let invoice = self
                .invoices
                .get(request.invoice_uuid)?
                .ok_or(PaymentError::InvoiceNotFound(request.invoice_uuid))?;
            if invoice.status == InvoiceStatus::Cancelled {
                return Err(PaymentError::InvoiceCancelled);
            }
            if invoice.status == InvoiceStatus::Paid {
                return Err(PaymentError::InvoiceAlreadyPaid);
            }
            if request.amount <= Money::ZERO {
                return Err(PaymentError::InvalidPaymentAmount);
            }

            let already_paid = self.payments.total_paid(request.invoice_uuid)?;
            let remaining = invoice.total_amount - already_paid;
            if request.amount > remaining {
                return Err(PaymentError::AmountExceedsRemainingBalance {
                    requested: request.amount,
                    remaining,
                });
            }

            if request.method.requires_transaction_ref() {
                let reference = request
                    .transaction_ref
                    .as_deref()
                    .ok_or(PaymentError::TransactionRefRequired)?;
                if !is_valid_transaction_ref(reference) {
                    return Err(PaymentError::InvalidTransactionRef);
                }
            }

            let payment = Payment {
                uuid: uuid::Uuid::new_v4(),
                invoice_uuid: request.invoice_uuid,
                amount: request.amount,
                method: request.method,
                transaction_ref: request.transaction_ref.clone(),
                paid_at: now,
            };
            self.payments.insert(&payment)?;

            // Fresh re-read so the derivation covers this insert too.
            let paid = self.payments.total_paid(request.invoice_uuid)?;
            let new_status = status_after_payment(invoice.total_amount, paid);
            self.invoices.update_status(request.invoice_uuid, new_status)?;

            info!(
                "event=payment_applied module=billing status=ok invoice={} amount={} method={:?} invoice_status={new_status:?}",
                request.invoice_uuid, request.amount, request.method
            );
            Ok(payment)
        })
    }

    /// Full payment history of one invoice, oldest first.
    pub fn payments_for_invoice(
        &self,
        invoice_uuid: InvoiceId,
    ) -> Result<Vec<Payment>, PaymentError> {
        Ok(self.payments.list_for_invoice(invoice_uuid)?)
    }

    /// Income received on `day`, grouped per payment method. Methods with
    /// no payments that day are omitted.
    pub fn income_by_method(&self, day: NaiveDate) -> Result<Vec<MethodIncome>, PaymentError> {
        let start = day.and_time(NaiveTime::MIN);
        let end = start + Duration::days(1) - Duration::milliseconds(1);
        let payments = self.payments.list_between(start, end)?;

        let methods = [
            PaymentMethod::Cash,
            PaymentMethod::Card,
            PaymentMethod::BankTransfer,
        ];
        let mut totals = Vec::new();
        for method in methods {
            let total: Money = payments
                .iter()
                .filter(|payment| payment.method == method)
                .map(|payment| payment.amount)
                .sum();
            if total > Money::ZERO {
                totals.push(MethodIncome { method, total });
            }
        }
        Ok(totals)
    }
}
