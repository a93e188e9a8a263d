//! Domain model for scheduling and billing.
//!
//! # Responsibility
//! - Define the canonical records shared by repositories and services.
//! - Keep the pure invariant predicates (slot overlap, status graphs,
//!   ledger math) free of storage concerns.
//!
//! # Invariants
//! - Every record is identified by a stable UUID that is never reused.
//! - Status enums encode their legal transition rules next to the data.

pub mod appointment;
pub mod invoice;
pub mod payment;
