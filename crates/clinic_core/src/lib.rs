//! Scheduling and billing core for a clinic back office.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::appointment::{
    Appointment, AppointmentId, AppointmentStatus, DoctorId, PatientId, TimeSlot, UserId,
};
pub use model::invoice::{
    status_after_payment, subtotal, Invoice, InvoiceId, InvoiceItem, InvoiceItemId, InvoiceStatus,
    Money,
};
pub use model::payment::{is_valid_transaction_ref, Payment, PaymentId, PaymentMethod};
pub use repo::appointment_repo::{AppointmentRepository, SqliteAppointmentRepository};
pub use repo::invoice_repo::{InvoiceRepository, SqliteInvoiceRepository};
pub use repo::item_repo::{InvoiceItemRepository, SqliteInvoiceItemRepository};
pub use repo::payment_repo::{PaymentRepository, SqlitePaymentRepository};
pub use repo::{RepoError, RepoResult, TxScope};
pub use service::billing_service::{BillingError, BillingService, CreateInvoiceRequest};
pub use service::ledger_service::{LedgerError, LineItemLedger, NewItemRequest, UpdateItemRequest};
pub use service::payment_service::{MethodIncome, PaymentError, PaymentRequest, PaymentService};
pub use service::scheduling_service::{
    BookAppointmentRequest, SchedulingError, SchedulingService,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
