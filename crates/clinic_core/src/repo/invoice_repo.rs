//! Invoice repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist invoices and their status/amount writes.
//! - Answer the one-invoice-per-appointment uniqueness probe.
//!
//! # Invariants
//! - `sync_total` is the only write that touches `total_amount` alone; it
//!   is reserved for the line-item ledger, which gates it on mutability.
//! - Money columns store canonical decimal text, parsed on read.

use crate::model::appointment::{AppointmentId, PatientId};
use crate::model::invoice::{Invoice, InvoiceId, InvoiceStatus, Money};
use crate::repo::{
    from_epoch_ms, immediate_tx, parse_money, parse_uuid, to_epoch_ms, RepoError, RepoResult,
    TxScope,
};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, Row};

const INVOICE_SELECT_SQL: &str = "SELECT
    uuid,
    appointment_uuid,
    patient_uuid,
    total_amount,
    tax_amount,
    discount_amount,
    due_date,
    status,
    created_at
FROM invoices";

/// Repository interface for invoice persistence.
pub trait InvoiceRepository {
    fn insert(&self, invoice: &Invoice) -> RepoResult<InvoiceId>;
    fn get(&self, id: InvoiceId) -> RepoResult<Option<Invoice>>;
    /// Uniqueness probe: the invoice already covering an appointment.
    fn find_by_appointment(&self, appointment_uuid: AppointmentId)
        -> RepoResult<Option<Invoice>>;
    fn update_amounts(
        &self,
        id: InvoiceId,
        total_amount: Money,
        tax_amount: Money,
        discount_amount: Money,
    ) -> RepoResult<()>;
    /// Ledger hook: overwrite `total_amount` with the recomputed subtotal.
    fn sync_total(&self, id: InvoiceId, total_amount: Money) -> RepoResult<()>;
    fn update_status(&self, id: InvoiceId, status: InvoiceStatus) -> RepoResult<()>;
    fn list_for_patient(&self, patient_uuid: PatientId) -> RepoResult<Vec<Invoice>>;
    /// Invoices created within `[start, end]`, inclusive.
    fn list_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> RepoResult<Vec<Invoice>>;
}

/// SQLite-backed invoice repository.
pub struct SqliteInvoiceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteInvoiceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_rows(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<Invoice>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut invoices = Vec::new();
        while let Some(row) = rows.next()? {
            invoices.push(parse_invoice_row(row)?);
        }
        Ok(invoices)
    }
}

impl InvoiceRepository for SqliteInvoiceRepository<'_> {
    fn insert(&self, invoice: &Invoice) -> RepoResult<InvoiceId> {
        self.conn.execute(
            "INSERT INTO invoices (
                uuid,
                appointment_uuid,
                patient_uuid,
                total_amount,
                tax_amount,
                discount_amount,
                due_date,
                status,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                invoice.uuid.to_string(),
                invoice.appointment_uuid.to_string(),
                invoice.patient_uuid.to_string(),
                invoice.total_amount.to_string(),
                invoice.tax_amount.to_string(),
                invoice.discount_amount.to_string(),
                invoice.due_date,
                status_to_db(invoice.status),
                to_epoch_ms(invoice.created_at),
            ],
        )?;

        Ok(invoice.uuid)
    }

    fn get(&self, id: InvoiceId) -> RepoResult<Option<Invoice>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{INVOICE_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_invoice_row(row)?));
        }
        Ok(None)
    }

    fn find_by_appointment(
        &self,
        appointment_uuid: AppointmentId,
    ) -> RepoResult<Option<Invoice>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{INVOICE_SELECT_SQL} WHERE appointment_uuid = ?1;"))?;
        let mut rows = stmt.query([appointment_uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_invoice_row(row)?));
        }
        Ok(None)
    }

    fn update_amounts(
        &self,
        id: InvoiceId,
        total_amount: Money,
        tax_amount: Money,
        discount_amount: Money,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE invoices
             SET total_amount = ?2, tax_amount = ?3, discount_amount = ?4
             WHERE uuid = ?1;",
            params![
                id.to_string(),
                total_amount.to_string(),
                tax_amount.to_string(),
                discount_amount.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "invoice",
                id,
            });
        }
        Ok(())
    }

    fn sync_total(&self, id: InvoiceId, total_amount: Money) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE invoices SET total_amount = ?2 WHERE uuid = ?1;",
            params![id.to_string(), total_amount.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "invoice",
                id,
            });
        }
        Ok(())
    }

    fn update_status(&self, id: InvoiceId, status: InvoiceStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE invoices SET status = ?2 WHERE uuid = ?1;",
            params![id.to_string(), status_to_db(status)],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "invoice",
                id,
            });
        }
        Ok(())
    }

    fn list_for_patient(&self, patient_uuid: PatientId) -> RepoResult<Vec<Invoice>> {
        self.query_rows(
            &format!(
                "{INVOICE_SELECT_SQL}
                 WHERE patient_uuid = ?1
                 ORDER BY created_at DESC;"
            ),
            [patient_uuid.to_string()],
        )
    }

    fn list_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> RepoResult<Vec<Invoice>> {
        self.query_rows(
            &format!(
                "{INVOICE_SELECT_SQL}
                 WHERE created_at >= ?1 AND created_at <= ?2
                 ORDER BY created_at ASC;"
            ),
            params![to_epoch_ms(start), to_epoch_ms(end)],
        )
    }
}

impl TxScope for SqliteInvoiceRepository<'_> {
    fn with_tx<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        immediate_tx(self.conn, f)
    }
}

fn parse_invoice_row(row: &Row<'_>) -> RepoResult<Invoice> {
    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid invoice status `{status_text}` in invoices.status"
        ))
    })?;

    Ok(Invoice {
        uuid: parse_uuid("invoices.uuid", &row.get::<_, String>("uuid")?)?,
        appointment_uuid: parse_uuid(
            "invoices.appointment_uuid",
            &row.get::<_, String>("appointment_uuid")?,
        )?,
        patient_uuid: parse_uuid("invoices.patient_uuid", &row.get::<_, String>("patient_uuid")?)?,
        total_amount: parse_money("invoices.total_amount", &row.get::<_, String>("total_amount")?)?,
        tax_amount: parse_money("invoices.tax_amount", &row.get::<_, String>("tax_amount")?)?,
        discount_amount: parse_money(
            "invoices.discount_amount",
            &row.get::<_, String>("discount_amount")?,
        )?,
        due_date: row.get::<_, Option<NaiveDate>>("due_date")?,
        status,
        created_at: from_epoch_ms("invoices.created_at", row.get("created_at")?)?,
    })
}

fn status_to_db(status: InvoiceStatus) -> &'static str {
    match status {
        InvoiceStatus::Draft => "draft",
        InvoiceStatus::Issued => "issued",
        InvoiceStatus::PartiallyPaid => "partially_paid",
        InvoiceStatus::Paid => "paid",
        InvoiceStatus::Cancelled => "cancelled",
    }
}

fn parse_status(value: &str) -> Option<InvoiceStatus> {
    match value {
        "draft" => Some(InvoiceStatus::Draft),
        "issued" => Some(InvoiceStatus::Issued),
        "partially_paid" => Some(InvoiceStatus::PartiallyPaid),
        "paid" => Some(InvoiceStatus::Paid),
        "cancelled" => Some(InvoiceStatus::Cancelled),
        _ => None,
    }
}
