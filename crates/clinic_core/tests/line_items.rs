use chrono::{NaiveDate, NaiveDateTime};
use clinic_core::db::open_db_in_memory;
use clinic_core::{
    BillingService, CreateInvoiceRequest, Invoice, InvoiceStatus, LedgerError, LineItemLedger,
    Money, NewItemRequest, PaymentMethod, PaymentRequest, PaymentService,
    SqliteInvoiceItemRepository, SqliteInvoiceRepository, SqlitePaymentRepository,
    UpdateItemRequest,
};
use rusqlite::Connection;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn fixed_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn ledger(
    conn: &Connection,
) -> LineItemLedger<
    SqliteInvoiceRepository<'_>,
    SqliteInvoiceItemRepository<'_>,
    SqlitePaymentRepository<'_>,
> {
    LineItemLedger::new(
        SqliteInvoiceRepository::new(conn),
        SqliteInvoiceItemRepository::new(conn),
        SqlitePaymentRepository::new(conn),
    )
}

fn billing(
    conn: &Connection,
) -> BillingService<SqliteInvoiceRepository<'_>, SqlitePaymentRepository<'_>> {
    BillingService::new(
        SqliteInvoiceRepository::new(conn),
        SqlitePaymentRepository::new(conn),
    )
}

fn create_invoice(conn: &Connection, total_amount: Money) -> Invoice {
    billing(conn)
        .create_invoice_at(
            &CreateInvoiceRequest {
                appointment_uuid: Uuid::new_v4(),
                patient_uuid: Uuid::new_v4(),
                total_amount,
                tax_amount: Money::ZERO,
                discount_amount: Money::ZERO,
                due_date: None,
                status: None,
            },
            fixed_now(),
        )
        .unwrap()
}

fn new_item(invoice_uuid: Uuid, unit_price: Money, quantity: u32) -> NewItemRequest {
    NewItemRequest {
        invoice_uuid,
        description: "consultation".to_string(),
        unit_price,
        quantity,
    }
}

#[test]
fn adding_items_syncs_the_invoice_total() {
    let conn = open_db_in_memory().unwrap();
    let invoice = create_invoice(&conn, dec!(500));
    let ledger = ledger(&conn);

    ledger
        .add_item(&new_item(invoice.uuid, dec!(150), 1))
        .unwrap();
    let loaded = billing(&conn).get_invoice(invoice.uuid).unwrap().unwrap();
    assert_eq!(loaded.total_amount, dec!(150));

    ledger
        .add_item(&new_item(invoice.uuid, dec!(25), 4))
        .unwrap();
    let loaded = billing(&conn).get_invoice(invoice.uuid).unwrap().unwrap();
    assert_eq!(loaded.total_amount, dec!(250));
    assert_eq!(ledger.subtotal_for(invoice.uuid).unwrap(), dec!(250));
}

#[test]
fn updating_an_item_resyncs_the_total() {
    let conn = open_db_in_memory().unwrap();
    let invoice = create_invoice(&conn, dec!(500));
    let ledger = ledger(&conn);

    let item = ledger
        .add_item(&new_item(invoice.uuid, dec!(150), 1))
        .unwrap();
    ledger
        .update_item(&UpdateItemRequest {
            item_uuid: item.uuid,
            description: "extended consultation".to_string(),
            unit_price: dec!(200),
            quantity: 2,
        })
        .unwrap();

    let loaded = billing(&conn).get_invoice(invoice.uuid).unwrap().unwrap();
    assert_eq!(loaded.total_amount, dec!(400));
    let items = ledger.items_for_invoice(invoice.uuid).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].description, "extended consultation");
}

#[test]
fn deleting_the_last_item_leaves_a_zero_total() {
    let conn = open_db_in_memory().unwrap();
    let invoice = create_invoice(&conn, dec!(500));
    let ledger = ledger(&conn);

    let item = ledger
        .add_item(&new_item(invoice.uuid, dec!(150), 1))
        .unwrap();
    ledger.delete_item(item.uuid).unwrap();

    let loaded = billing(&conn).get_invoice(invoice.uuid).unwrap().unwrap();
    assert_eq!(loaded.total_amount, Money::ZERO);
    assert!(ledger.items_for_invoice(invoice.uuid).unwrap().is_empty());
}

#[test]
fn paid_invoice_rejects_item_changes_and_keeps_its_total() {
    let conn = open_db_in_memory().unwrap();
    let invoice = create_invoice(&conn, dec!(500));
    let ledger = ledger(&conn);

    let item = ledger
        .add_item(&new_item(invoice.uuid, dec!(500), 1))
        .unwrap();
    billing(&conn)
        .transition_status(invoice.uuid, InvoiceStatus::Paid)
        .unwrap();

    assert!(matches!(
        ledger.delete_item(item.uuid).unwrap_err(),
        LedgerError::InvoiceAlreadyClosed
    ));
    assert!(matches!(
        ledger
            .add_item(&new_item(invoice.uuid, dec!(10), 1))
            .unwrap_err(),
        LedgerError::InvoiceAlreadyClosed
    ));

    let loaded = billing(&conn).get_invoice(invoice.uuid).unwrap().unwrap();
    assert_eq!(loaded.total_amount, dec!(500));
    assert_eq!(ledger.items_for_invoice(invoice.uuid).unwrap().len(), 1);
}

#[test]
fn cancelled_invoice_rejects_item_changes() {
    let conn = open_db_in_memory().unwrap();
    let invoice = create_invoice(&conn, dec!(500));
    let ledger = ledger(&conn);

    billing(&conn)
        .transition_status(invoice.uuid, InvoiceStatus::Cancelled)
        .unwrap();
    assert!(matches!(
        ledger
            .add_item(&new_item(invoice.uuid, dec!(10), 1))
            .unwrap_err(),
        LedgerError::InvoiceCancelled
    ));
}

#[test]
fn sync_refuses_to_drop_the_total_below_recorded_payments() {
    let conn = open_db_in_memory().unwrap();
    let invoice = create_invoice(&conn, dec!(200));
    let ledger = ledger(&conn);

    let item = ledger
        .add_item(&new_item(invoice.uuid, dec!(200), 1))
        .unwrap();
    PaymentService::new(
        SqliteInvoiceRepository::new(&conn),
        SqlitePaymentRepository::new(&conn),
    )
    .apply_at(
        &PaymentRequest {
            invoice_uuid: invoice.uuid,
            amount: dec!(150),
            method: PaymentMethod::Cash,
            transaction_ref: None,
        },
        fixed_now(),
    )
    .unwrap();

    let err = ledger
        .update_item(&UpdateItemRequest {
            item_uuid: item.uuid,
            description: "consultation".to_string(),
            unit_price: dec!(100),
            quantity: 1,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::TotalBelowAmountPaid { subtotal, paid }
            if subtotal == dec!(100) && paid == dec!(150)
    ));

    // The whole unit of work rolled back: item and total are untouched.
    let items = ledger.items_for_invoice(invoice.uuid).unwrap();
    assert_eq!(items[0].unit_price, dec!(200));
    let loaded = billing(&conn).get_invoice(invoice.uuid).unwrap().unwrap();
    assert_eq!(loaded.total_amount, dec!(200));
}

#[test]
fn unknown_invoice_and_item_are_reported_distinctly() {
    let conn = open_db_in_memory().unwrap();
    let ledger = ledger(&conn);
    let missing = Uuid::new_v4();

    assert!(matches!(
        ledger.add_item(&new_item(missing, dec!(10), 1)).unwrap_err(),
        LedgerError::InvoiceNotFound(id) if id == missing
    ));
    assert!(matches!(
        ledger.delete_item(missing).unwrap_err(),
        LedgerError::ItemNotFound(id) if id == missing
    ));
}
