//! Payment repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist append-only payment rows and answer the paid-sum query.
//!
//! # Invariants
//! - No update or delete path exists; payments are immutable history.
//! - `total_paid` sums decimals in core, never lossy SQL text arithmetic.

use crate::model::invoice::{InvoiceId, Money};
use crate::model::payment::{Payment, PaymentId, PaymentMethod};
use crate::repo::{
    from_epoch_ms, immediate_tx, parse_money, parse_uuid, to_epoch_ms, RepoError, RepoResult,
    TxScope,
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};

const PAYMENT_SELECT_SQL: &str = "SELECT
    uuid,
    invoice_uuid,
    amount,
    method,
    transaction_ref,
    paid_at
FROM payments";

/// Repository interface for payment persistence.
pub trait PaymentRepository {
    fn insert(&self, payment: &Payment) -> RepoResult<PaymentId>;
    fn get(&self, id: PaymentId) -> RepoResult<Option<Payment>>;
    fn list_for_invoice(&self, invoice_uuid: InvoiceId) -> RepoResult<Vec<Payment>>;
    /// Payments recorded within `[start, end]`, inclusive.
    fn list_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> RepoResult<Vec<Payment>>;
    /// Sum of all recorded payments for the invoice; 0 when none exist.
    fn total_paid(&self, invoice_uuid: InvoiceId) -> RepoResult<Money>;
}

/// SQLite-backed payment repository.
pub struct SqlitePaymentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePaymentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_rows(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<Payment>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut payments = Vec::new();
        while let Some(row) = rows.next()? {
            payments.push(parse_payment_row(row)?);
        }
        Ok(payments)
    }
}

impl PaymentRepository for SqlitePaymentRepository<'_> {
    fn insert(&self, payment: &Payment) -> RepoResult<PaymentId> {
        self.conn.execute(
            "INSERT INTO payments (uuid, invoice_uuid, amount, method, transaction_ref, paid_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                payment.uuid.to_string(),
                payment.invoice_uuid.to_string(),
                payment.amount.to_string(),
                method_to_db(payment.method),
                payment.transaction_ref.as_deref(),
                to_epoch_ms(payment.paid_at),
            ],
        )?;

        Ok(payment.uuid)
    }

    fn get(&self, id: PaymentId) -> RepoResult<Option<Payment>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PAYMENT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_payment_row(row)?));
        }
        Ok(None)
    }

    fn list_for_invoice(&self, invoice_uuid: InvoiceId) -> RepoResult<Vec<Payment>> {
        self.query_rows(
            &format!(
                "{PAYMENT_SELECT_SQL}
                 WHERE invoice_uuid = ?1
                 ORDER BY paid_at ASC, uuid ASC;"
            ),
            [invoice_uuid.to_string()],
        )
    }

    fn list_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> RepoResult<Vec<Payment>> {
        self.query_rows(
            &format!(
                "{PAYMENT_SELECT_SQL}
                 WHERE paid_at >= ?1 AND paid_at <= ?2
                 ORDER BY paid_at ASC;"
            ),
            params![to_epoch_ms(start), to_epoch_ms(end)],
        )
    }

    fn total_paid(&self, invoice_uuid: InvoiceId) -> RepoResult<Money> {
        let payments = self.list_for_invoice(invoice_uuid)?;
        Ok(payments.iter().map(|payment| payment.amount).sum())
    }
}

impl TxScope for SqlitePaymentRepository<'_> {
    fn with_tx<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        immediate_tx(self.conn, f)
    }
}

fn parse_payment_row(row: &Row<'_>) -> RepoResult<Payment> {
    let method_text: String = row.get("method")?;
    let method = parse_method(&method_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid payment method `{method_text}` in payments.method"
        ))
    })?;

    Ok(Payment {
        uuid: parse_uuid("payments.uuid", &row.get::<_, String>("uuid")?)?,
        invoice_uuid: parse_uuid("payments.invoice_uuid", &row.get::<_, String>("invoice_uuid")?)?,
        amount: parse_money("payments.amount", &row.get::<_, String>("amount")?)?,
        method,
        transaction_ref: row.get("transaction_ref")?,
        paid_at: from_epoch_ms("payments.paid_at", row.get("paid_at")?)?,
    })
}

fn method_to_db(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "cash",
        PaymentMethod::Card => "card",
        PaymentMethod::BankTransfer => "bank_transfer",
    }
}

fn parse_method(value: &str) -> Option<PaymentMethod> {
    match value {
        "cash" => Some(PaymentMethod::Cash),
        "card" => Some(PaymentMethod::Card),
        "bank_transfer" => Some(PaymentMethod::BankTransfer),
        _ => None,
    }
}
