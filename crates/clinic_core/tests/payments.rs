use chrono::{NaiveDate, NaiveDateTime};
use clinic_core::db::open_db_in_memory;
use clinic_core::{
    BillingService, CreateInvoiceRequest, Invoice, InvoiceStatus, Money, PaymentError,
    PaymentMethod, PaymentRequest, PaymentService, SqliteInvoiceRepository,
    SqlitePaymentRepository,
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

fn service(
    conn: &Connection,
) -> PaymentService<SqliteInvoiceRepository<'_>, SqlitePaymentRepository<'_>> {
    PaymentService::new(
        SqliteInvoiceRepository::new(conn),
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

fn card_payment(invoice_uuid: Uuid, amount: Money) -> PaymentRequest {
    PaymentRequest {
        invoice_uuid,
        amount,
        method: PaymentMethod::Card,
        transaction_ref: Some("TXN-2025-0601".to_string()),
    }
}

#[test]
fn partial_then_final_payment_walks_the_status_ladder() {
    let conn = open_db_in_memory().unwrap();
    let invoice = create_invoice(&conn, dec!(600));
    let service = service(&conn);

    service
        .apply_at(&card_payment(invoice.uuid, dec!(100)), fixed_now())
        .unwrap();
    let loaded = billing(&conn).get_invoice(invoice.uuid).unwrap().unwrap();
    assert_eq!(loaded.status, InvoiceStatus::PartiallyPaid);

    service
        .apply_at(&card_payment(invoice.uuid, dec!(500)), fixed_now())
        .unwrap();
    let loaded = billing(&conn).get_invoice(invoice.uuid).unwrap().unwrap();
    assert_eq!(loaded.status, InvoiceStatus::Paid);

    let err = service
        .apply_at(&card_payment(invoice.uuid, dec!(1)), fixed_now())
        .unwrap_err();
    assert!(matches!(err, PaymentError::InvoiceAlreadyPaid));
    assert_eq!(service.payments_for_invoice(invoice.uuid).unwrap().len(), 2);
}

#[test]
fn overpayment_is_rejected_and_leaves_no_row() {
    let conn = open_db_in_memory().unwrap();
    let invoice = create_invoice(&conn, dec!(600));
    let service = service(&conn);

    let err = service
        .apply_at(&card_payment(invoice.uuid, dec!(700)), fixed_now())
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::AmountExceedsRemainingBalance { requested, remaining }
            if requested == dec!(700) && remaining == dec!(600)
    ));

    assert!(service.payments_for_invoice(invoice.uuid).unwrap().is_empty());
    let loaded = billing(&conn).get_invoice(invoice.uuid).unwrap().unwrap();
    assert_eq!(loaded.status, InvoiceStatus::Issued);
}

#[test]
fn remaining_balance_shrinks_with_each_payment() {
    let conn = open_db_in_memory().unwrap();
    let invoice = create_invoice(&conn, dec!(600));
    let service = service(&conn);

    service
        .apply_at(&card_payment(invoice.uuid, dec!(400)), fixed_now())
        .unwrap();
    let err = service
        .apply_at(&card_payment(invoice.uuid, dec!(300)), fixed_now())
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::AmountExceedsRemainingBalance { remaining, .. }
            if remaining == dec!(200)
    ));
}

#[test]
fn payment_amount_must_be_positive() {
    let conn = open_db_in_memory().unwrap();
    let invoice = create_invoice(&conn, dec!(600));
    let service = service(&conn);

    for amount in [Money::ZERO, dec!(-5)] {
        assert!(matches!(
            service
                .apply_at(&card_payment(invoice.uuid, amount), fixed_now())
                .unwrap_err(),
            PaymentError::InvalidPaymentAmount
        ));
    }
}

#[test]
fn cancelled_invoice_cannot_take_payments() {
    let conn = open_db_in_memory().unwrap();
    let invoice = create_invoice(&conn, dec!(600));
    billing(&conn)
        .transition_status(invoice.uuid, InvoiceStatus::Cancelled)
        .unwrap();

    let err = service(&conn)
        .apply_at(&card_payment(invoice.uuid, dec!(100)), fixed_now())
        .unwrap_err();
    assert!(matches!(err, PaymentError::InvoiceCancelled));
}

#[test]
fn non_cash_methods_require_a_well_formed_reference() {
    let conn = open_db_in_memory().unwrap();
    let invoice = create_invoice(&conn, dec!(600));
    let service = service(&conn);

    let mut missing = card_payment(invoice.uuid, dec!(100));
    missing.transaction_ref = None;
    assert!(matches!(
        service.apply_at(&missing, fixed_now()).unwrap_err(),
        PaymentError::TransactionRefRequired
    ));

    let mut malformed = card_payment(invoice.uuid, dec!(100));
    malformed.transaction_ref = Some("ab".to_string());
    assert!(matches!(
        service.apply_at(&malformed, fixed_now()).unwrap_err(),
        PaymentError::InvalidTransactionRef
    ));

    let mut bad_chars = card_payment(invoice.uuid, dec!(100));
    bad_chars.transaction_ref = Some("TXN 2025/01".to_string());
    assert!(matches!(
        service.apply_at(&bad_chars, fixed_now()).unwrap_err(),
        PaymentError::InvalidTransactionRef
    ));

    // Cash needs no reference at all.
    service
        .apply_at(
            &PaymentRequest {
                invoice_uuid: invoice.uuid,
                amount: dec!(100),
                method: PaymentMethod::Cash,
                transaction_ref: None,
            },
            fixed_now(),
        )
        .unwrap();
}

#[test]
fn unknown_invoice_reports_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let missing = Uuid::new_v4();

    assert!(matches!(
        service
            .apply_at(&card_payment(missing, dec!(100)), fixed_now())
            .unwrap_err(),
        PaymentError::InvoiceNotFound(id) if id == missing
    ));
}

#[test]
fn daily_income_groups_by_method_and_omits_idle_methods() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let first = create_invoice(&conn, dec!(600));
    let second = create_invoice(&conn, dec!(600));
    service
        .apply_at(
            &PaymentRequest {
                invoice_uuid: first.uuid,
                amount: dec!(100),
                method: PaymentMethod::Cash,
                transaction_ref: None,
            },
            fixed_now(),
        )
        .unwrap();
    service
        .apply_at(&card_payment(first.uuid, dec!(200)), fixed_now())
        .unwrap();
    service
        .apply_at(&card_payment(second.uuid, dec!(50)), fixed_now())
        .unwrap();

    // A payment on another day stays out of the report.
    let other_day = NaiveDate::from_ymd_opt(2025, 6, 2)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    service
        .apply_at(&card_payment(second.uuid, dec!(75)), other_day)
        .unwrap();

    let report = service
        .income_by_method(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
        .unwrap();
    assert_eq!(report.len(), 2);
    assert_eq!(report[0].method, PaymentMethod::Cash);
    assert_eq!(report[0].total, dec!(100));
    assert_eq!(report[1].method, PaymentMethod::Card);
    assert_eq!(report[1].total, dec!(250));
}

#[test]
fn payment_history_is_ordered_and_complete() {
    let conn = open_db_in_memory().unwrap();
    let invoice = create_invoice(&conn, dec!(600));
    let service = service(&conn);

    let early = fixed_now();
    let later = NaiveDate::from_ymd_opt(2025, 6, 1)
        .unwrap()
        .and_hms_opt(15, 0, 0)
        .unwrap();
    service
        .apply_at(&card_payment(invoice.uuid, dec!(200)), later)
        .unwrap();
    service
        .apply_at(&card_payment(invoice.uuid, dec!(100)), early)
        .unwrap();

    let history = service.payments_for_invoice(invoice.uuid).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].paid_at, early);
    assert_eq!(history[1].paid_at, later);
}
