//! Mapping from `sqlx` failures to [`LedgerError`].

use seat_inventory_core::LedgerError;

/// SQLSTATE codes a caller may retry: serialization failure, deadlock
/// detected, lock not available.
const TRANSIENT_SQLSTATES: [&str; 3] = ["40001", "40P01", "55P03"];

/// Classify a `sqlx` error, prefixing it with what we were doing.
pub(crate) fn ledger_error(context: &str, e: sqlx::Error) -> LedgerError {
    if is_transient(&e) {
        LedgerError::Transient(format!("{context}: {e}"))
    } else {
        LedgerError::Database(format!("{context}: {e}"))
    }
}

fn is_transient(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| TRANSIENT_SQLSTATES.contains(&code.as_ref())),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_transient() {
        let err = ledger_error("Failed to begin transaction", sqlx::Error::PoolTimedOut);
        assert!(err.is_transient());
    }

    #[test]
    fn row_not_found_is_not_transient() {
        let err = ledger_error("Failed to load seat", sqlx::Error::RowNotFound);
        assert!(matches!(err, LedgerError::Database(ref msg) if msg.starts_with("Failed to load seat")));
    }
}
