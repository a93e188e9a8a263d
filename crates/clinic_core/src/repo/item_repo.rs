//! Invoice line-item repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist the billable items owned by an invoice.
//!
//! # Invariants
//! - Items belong to exactly one invoice and are only mutated through the
//!   ledger service, which gates on the owning invoice's mutability.

use crate::model::invoice::{InvoiceId, InvoiceItem, InvoiceItemId};
use crate::repo::{immediate_tx, parse_money, parse_uuid, RepoError, RepoResult, TxScope};
use rusqlite::{params, Connection, Row};

const ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    invoice_uuid,
    description,
    unit_price,
    quantity
FROM invoice_items";

/// Repository interface for invoice line items.
pub trait InvoiceItemRepository {
    fn insert(&self, item: &InvoiceItem) -> RepoResult<InvoiceItemId>;
    fn get(&self, id: InvoiceItemId) -> RepoResult<Option<InvoiceItem>>;
    fn update(&self, item: &InvoiceItem) -> RepoResult<()>;
    fn delete(&self, id: InvoiceItemId) -> RepoResult<()>;
    fn list_for_invoice(&self, invoice_uuid: InvoiceId) -> RepoResult<Vec<InvoiceItem>>;
}

/// SQLite-backed line-item repository.
pub struct SqliteInvoiceItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteInvoiceItemRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl InvoiceItemRepository for SqliteInvoiceItemRepository<'_> {
    fn insert(&self, item: &InvoiceItem) -> RepoResult<InvoiceItemId> {
        self.conn.execute(
            "INSERT INTO invoice_items (uuid, invoice_uuid, description, unit_price, quantity)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                item.uuid.to_string(),
                item.invoice_uuid.to_string(),
                item.description.as_str(),
                item.unit_price.to_string(),
                item.quantity,
            ],
        )?;

        Ok(item.uuid)
    }

    fn get(&self, id: InvoiceItemId) -> RepoResult<Option<InvoiceItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ITEM_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }
        Ok(None)
    }

    fn update(&self, item: &InvoiceItem) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE invoice_items
             SET description = ?2, unit_price = ?3, quantity = ?4
             WHERE uuid = ?1;",
            params![
                item.uuid.to_string(),
                item.description.as_str(),
                item.unit_price.to_string(),
                item.quantity,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "invoice item",
                id: item.uuid,
            });
        }
        Ok(())
    }

    fn delete(&self, id: InvoiceItemId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM invoice_items WHERE uuid = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "invoice item",
                id,
            });
        }
        Ok(())
    }

    fn list_for_invoice(&self, invoice_uuid: InvoiceId) -> RepoResult<Vec<InvoiceItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE invoice_uuid = ?1
             ORDER BY uuid ASC;"
        ))?;

        let mut rows = stmt.query([invoice_uuid.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }
}

impl TxScope for SqliteInvoiceItemRepository<'_> {
    fn with_tx<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        immediate_tx(self.conn, f)
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<InvoiceItem> {
    Ok(InvoiceItem {
        uuid: parse_uuid("invoice_items.uuid", &row.get::<_, String>("uuid")?)?,
        invoice_uuid: parse_uuid(
            "invoice_items.invoice_uuid",
            &row.get::<_, String>("invoice_uuid")?,
        )?,
        description: row.get("description")?,
        unit_price: parse_money(
            "invoice_items.unit_price",
            &row.get::<_, String>("unit_price")?,
        )?,
        quantity: row.get("quantity")?,
    })
}
