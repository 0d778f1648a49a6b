//! Mapping of sqlx failures onto [`ErrorKind`]s.
//!
//! The checker depends on this classification: a `Conflict` becomes a
//! rejection, a `Transient` error is redelivered, anything else fails the
//! batch.

use notary_core::error::{AppError, ErrorKind};

/// Postgres `unique_violation`.
pub const UNIQUE_VIOLATION: &str = "23505";

/// Kind for a Postgres SQLSTATE code.
pub fn kind_for_sqlstate(code: &str) -> ErrorKind {
    match code {
        UNIQUE_VIOLATION => ErrorKind::Conflict,
        // serialization_failure, deadlock_detected, lock_not_available,
        // query_canceled (statement/lock timeouts), admin/crash shutdown,
        // cannot_connect_now
        "40001" | "40P01" | "55P03" | "57014" | "57P01" | "57P02" | "57P03" => {
            ErrorKind::Transient
        }
        // connection_exception class
        code if code.starts_with("08") => ErrorKind::Transient,
        _ => ErrorKind::Database,
    }
}

/// Wrap a sqlx error with the kind the checker needs to act on it.
pub fn classify(err: sqlx::Error, context: &str) -> AppError {
    let kind = match &err {
        sqlx::Error::Database(db) => db
            .code()
            .map_or(ErrorKind::Database, |code| kind_for_sqlstate(&code)),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => ErrorKind::Transient,
        sqlx::Error::PoolClosed => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::Database,
    };
    AppError::with_source(kind, format!("{context}: {err}"), err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_is_conflict() {
        assert_eq!(kind_for_sqlstate("23505"), ErrorKind::Conflict);
    }

    #[test]
    fn test_contention_is_transient() {
        for code in ["40001", "40P01", "55P03", "57014", "08006", "08001"] {
            assert_eq!(kind_for_sqlstate(code), ErrorKind::Transient, "{code}");
        }
    }

    #[test]
    fn test_other_codes_are_database_errors() {
        assert_eq!(kind_for_sqlstate("23503"), ErrorKind::Database);
        assert_eq!(kind_for_sqlstate("42P01"), ErrorKind::Database);
    }

    #[test]
    fn test_pool_errors() {
        assert_eq!(
            classify(sqlx::Error::PoolTimedOut, "acquire").kind,
            ErrorKind::Transient
        );
        assert_eq!(
            classify(sqlx::Error::PoolClosed, "acquire").kind,
            ErrorKind::ServiceUnavailable
        );
        assert_eq!(
            classify(sqlx::Error::RowNotFound, "query").kind,
            ErrorKind::Database
        );
    }
}
