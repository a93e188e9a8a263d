//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce the scheduling and billing invariants: no double-booking,
//!   ledger-synced totals, payment bounds, status monotonicity.
//!
//! # Invariants
//! - Expected business outcomes are typed errors, never panics.
//! - Race-sensitive units of work run inside a repository `TxScope`.

pub mod billing_service;
pub mod ledger_service;
pub mod payment_service;
pub mod scheduling_service;
