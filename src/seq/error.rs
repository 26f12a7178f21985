//! Error taxonomy for sequence allocation.
//!
//! Database failures are split into transient lock contention, an unreachable
//! datastore, and everything else. Only the first two are retried.

use sea_orm::sqlx;
use sea_orm::{DbErr, RuntimeErr};
use thiserror::Error;

/// Postgres SQLSTATEs raised when a transaction loses a lock race:
/// deadlock_detected, lock_not_available, serialization_failure.
const PG_CONTENTION_CODES: [&str; 3] = ["40P01", "55P03", "40001"];

/// Postgres SQLSTATE class for connection exceptions.
const PG_CONNECTION_CLASS: &str = "08";

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Debug, Error)]
pub enum SeqError {
    #[error("lock contention: {0}")]
    Contention(#[source] DbErr),

    #[error("datastore unavailable: {0}")]
    Unavailable(#[source] DbErr),

    #[error("database error: {0}")]
    Database(#[source] DbErr),

    #[error("series not found: {0}")]
    SeriesNotFound(String),

    #[error("invalid counter value: {0}")]
    InvalidValue(i64),

    #[error("counter overflow in series {0}")]
    Overflow(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<SeqError>,
    },
}

impl SeqError {
    /// Whether the whole transaction may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SeqError::Contention(_) | SeqError::Unavailable(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorClass {
    Contention,
    Unavailable,
    Other,
}

impl From<DbErr> for SeqError {
    fn from(err: DbErr) -> Self {
        match classify(&err) {
            ErrorClass::Contention => SeqError::Contention(err),
            ErrorClass::Unavailable => SeqError::Unavailable(err),
            ErrorClass::Other => SeqError::Database(err),
        }
    }
}

fn classify(err: &DbErr) -> ErrorClass {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => ErrorClass::Unavailable,
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => {
            classify_sqlx(e)
        }
        _ => ErrorClass::Other,
    }
}

fn classify_sqlx(err: &sqlx::Error) -> ErrorClass {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some(code) => classify_code(code),
            None => ErrorClass::Other,
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => ErrorClass::Unavailable,
        _ => ErrorClass::Other,
    }
}

fn classify_code(code: &str) -> ErrorClass {
    if PG_CONTENTION_CODES.contains(&code) {
        return ErrorClass::Contention;
    }
    if code.len() == 5 && code.starts_with(PG_CONNECTION_CLASS) {
        return ErrorClass::Unavailable;
    }

    // SQLite reports extended result codes; the primary code is the low byte.
    match code.parse::<i32>() {
        Ok(c) if matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED) => ErrorClass::Contention,
        _ => ErrorClass::Other,
    }
}
