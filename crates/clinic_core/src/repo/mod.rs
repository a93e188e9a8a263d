//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per aggregate.
//! - Isolate SQLite query details from service/business orchestration.
//! - Provide the transaction seam services wrap around race-sensitive
//!   units of work.
//!
//! # Invariants
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repository APIs return semantic errors (`NotFound`) in addition to
//!   DB transport errors.

use crate::db::DbError;
use crate::model::invoice::Money;
use chrono::NaiveDateTime;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod appointment_repo;
pub mod invoice_repo;
pub mod item_repo;
pub mod payment_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for clinic persistence operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound { entity: &'static str, id: Uuid },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Transaction scope the services wrap around compound units of work.
///
/// The whole closure commits or rolls back as one: a business failure or
/// storage error inside leaves no partial effect (booking, payment and
/// item-sync races all close through this seam).
pub trait TxScope {
    fn with_tx<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>;
}

/// Runs `f` inside an IMMEDIATE transaction on a shared connection.
///
/// `Transaction::new_unchecked` lets repositories that only hold a
/// `&Connection` take the write lock up front; statements issued by `f`
/// on the same connection join the open transaction.
pub(crate) fn immediate_tx<T, E>(conn: &Connection, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
where
    E: From<RepoError>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|err| E::from(RepoError::from(err)))?;
    // Drop of `tx` rolls back when `f` fails.
    let value = f()?;
    tx.commit().map_err(|err| E::from(RepoError::from(err)))?;
    Ok(value)
}

pub(crate) fn to_epoch_ms(value: NaiveDateTime) -> i64 {
    value.and_utc().timestamp_millis()
}

pub(crate) fn from_epoch_ms(field: &'static str, value: i64) -> RepoResult<NaiveDateTime> {
    chrono::DateTime::from_timestamp_millis(value)
        .map(|instant| instant.naive_utc())
        .ok_or_else(|| RepoError::InvalidData(format!("invalid epoch millis `{value}` in {field}")))
}

pub(crate) fn parse_uuid(field: &'static str, value: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {field}")))
}

pub(crate) fn parse_money(field: &'static str, value: &str) -> RepoResult<Money> {
    value
        .parse::<Money>()
        .map_err(|_| RepoError::InvalidData(format!("invalid money value `{value}` in {field}")))
}
