//! Payment domain model.
//!
//! # Responsibility
//! - Define the append-only payment record and its method/reference rules.
//!
//! # Invariants
//! - Payments are never edited or deleted once recorded.
//! - Non-cash payments carry a well-formed external transaction reference.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::invoice::{InvoiceId, Money};

/// Stable identifier for a payment.
pub type PaymentId = Uuid;

/// External reference format: 3-50 alphanumeric/dash characters.
static TRANSACTION_REF_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9-]{3,50}$").expect("transaction ref pattern is valid"));

/// How a payment was made. Anything other than cash requires a
/// transaction reference from the external processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
}

impl PaymentMethod {
    pub fn requires_transaction_ref(self) -> bool {
        !matches!(self, PaymentMethod::Cash)
    }
}

/// Returns whether the given reference matches the accepted format.
pub fn is_valid_transaction_ref(value: &str) -> bool {
    TRANSACTION_REF_PATTERN.is_match(value)
}

/// Append-only record of money received against an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Stable global id.
    pub uuid: PaymentId,
    pub invoice_uuid: InvoiceId,
    /// Strictly positive amount.
    pub amount: Money,
    pub method: PaymentMethod,
    /// Processor reference; present whenever the method requires one.
    pub transaction_ref: Option<String>,
    pub paid_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::{is_valid_transaction_ref, PaymentMethod};

    #[test]
    fn cash_does_not_require_a_reference() {
        assert!(!PaymentMethod::Cash.requires_transaction_ref());
        assert!(PaymentMethod::Card.requires_transaction_ref());
        assert!(PaymentMethod::BankTransfer.requires_transaction_ref());
    }

    #[test]
    fn reference_format_accepts_alphanumeric_and_dashes() {
        assert!(is_valid_transaction_ref("CC-2025-0001"));
        assert!(is_valid_transaction_ref("abc"));
        assert!(is_valid_transaction_ref(&"x".repeat(50)));
    }

    #[test]
    fn reference_format_rejects_bad_input() {
        assert!(!is_valid_transaction_ref(""));
        assert!(!is_valid_transaction_ref("ab"));
        assert!(!is_valid_transaction_ref(&"x".repeat(51)));
        assert!(!is_valid_transaction_ref("has space"));
        assert!(!is_valid_transaction_ref("semi;colon"));
    }
}
