//! Query engine error types
//!
//! Error codes:
//! - RELQ_QUERY_UNKNOWN_TABLE (REJECT)
//! - RELQ_QUERY_UNKNOWN_COLUMN (REJECT)
//! - RELQ_QUERY_DUPLICATE_COLUMN (REJECT)
//! - RELQ_QUERY_COMMON_COLUMNS (REJECT)
//! - RELQ_QUERY_NO_COMMON_COLUMNS (REJECT)
//! - RELQ_QUERY_NOT_UPDATEABLE (REJECT)
//! - RELQ_PLAN_INFEASIBLE (REJECT)
//! - RELQ_EXEC_KEY_TOO_LARGE (ABORT)
//! - RELQ_STORAGE (ABORT)

use std::fmt;

use crate::storage::StorageError;

/// Severity levels for query errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Request rejected before any work was done
    Reject,
    /// Operation failed mid-flight
    Abort,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Abort => write!(f, "ABORT"),
        }
    }
}

/// Query-engine error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorCode {
    /// Table not present in the schema
    RelqQueryUnknownTable,
    /// Column not produced by the source query
    RelqQueryUnknownColumn,
    /// Column introduced twice
    RelqQueryDuplicateColumn,
    /// Product operands share columns
    RelqQueryCommonColumns,
    /// Join operands share no columns
    RelqQueryNoCommonColumns,
    /// Write attempted through a derived query
    RelqQueryNotUpdateable,
    /// No finite-cost execution strategy exists
    RelqPlanInfeasible,
    /// Temp index key exceeded the size ceiling
    RelqExecKeyTooLarge,
    /// Storage boundary failure
    RelqStorage,
}

impl QueryErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            QueryErrorCode::RelqQueryUnknownTable => "RELQ_QUERY_UNKNOWN_TABLE",
            QueryErrorCode::RelqQueryUnknownColumn => "RELQ_QUERY_UNKNOWN_COLUMN",
            QueryErrorCode::RelqQueryDuplicateColumn => "RELQ_QUERY_DUPLICATE_COLUMN",
            QueryErrorCode::RelqQueryCommonColumns => "RELQ_QUERY_COMMON_COLUMNS",
            QueryErrorCode::RelqQueryNoCommonColumns => "RELQ_QUERY_NO_COMMON_COLUMNS",
            QueryErrorCode::RelqQueryNotUpdateable => "RELQ_QUERY_NOT_UPDATEABLE",
            QueryErrorCode::RelqPlanInfeasible => "RELQ_PLAN_INFEASIBLE",
            QueryErrorCode::RelqExecKeyTooLarge => "RELQ_EXEC_KEY_TOO_LARGE",
            QueryErrorCode::RelqStorage => "RELQ_STORAGE",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            QueryErrorCode::RelqExecKeyTooLarge | QueryErrorCode::RelqStorage => Severity::Abort,
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for QueryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Query error type with full context
#[derive(Debug, Clone)]
pub struct QueryError {
    /// Error code
    code: QueryErrorCode,
    /// Human-readable message
    message: String,
    /// Column name if applicable
    column: Option<String>,
}

impl QueryError {
    /// Create an unknown table error
    pub fn unknown_table(table: impl Into<String>) -> Self {
        Self {
            code: QueryErrorCode::RelqQueryUnknownTable,
            message: format!("table '{}' does not exist", table.into()),
            column: None,
        }
    }

    /// Create an unknown column error
    pub fn unknown_column(column: impl Into<String>) -> Self {
        let c = column.into();
        Self {
            code: QueryErrorCode::RelqQueryUnknownColumn,
            message: format!("column '{}' does not exist", c),
            column: Some(c),
        }
    }

    /// Create a duplicate column error
    pub fn duplicate_column(column: impl Into<String>) -> Self {
        let c = column.into();
        Self {
            code: QueryErrorCode::RelqQueryDuplicateColumn,
            message: format!("column '{}' already exists", c),
            column: Some(c),
        }
    }

    /// Create a common columns error (product operands overlap)
    pub fn common_columns(columns: &[String]) -> Self {
        Self {
            code: QueryErrorCode::RelqQueryCommonColumns,
            message: format!("product operands share columns ({})", columns.join(",")),
            column: columns.first().cloned(),
        }
    }

    /// Create a no common columns error (join operands disjoint)
    pub fn no_common_columns() -> Self {
        Self {
            code: QueryErrorCode::RelqQueryNoCommonColumns,
            message: "join operands have no columns in common".into(),
            column: None,
        }
    }

    /// Create a not updateable error
    pub fn not_updateable(what: impl Into<String>) -> Self {
        Self {
            code: QueryErrorCode::RelqQueryNotUpdateable,
            message: format!("{} query is not updateable", what.into()),
            column: None,
        }
    }

    /// Create an infeasible plan error
    pub fn infeasible(reason: impl Into<String>) -> Self {
        Self {
            code: QueryErrorCode::RelqPlanInfeasible,
            message: reason.into(),
            column: None,
        }
    }

    /// Create a key too large error
    pub fn key_too_large(size: usize, limit: usize) -> Self {
        Self {
            code: QueryErrorCode::RelqExecKeyTooLarge,
            message: format!("temp index key of {} bytes exceeds limit of {}", size, limit),
            column: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> QueryErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the column name if applicable
    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for QueryError {}

impl From<StorageError> for QueryError {
    fn from(err: StorageError) -> Self {
        Self {
            code: QueryErrorCode::RelqStorage,
            message: err.to_string(),
            column: None,
        }
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            QueryErrorCode::RelqQueryUnknownTable.code(),
            "RELQ_QUERY_UNKNOWN_TABLE"
        );
        assert_eq!(
            QueryErrorCode::RelqPlanInfeasible.code(),
            "RELQ_PLAN_INFEASIBLE"
        );
        assert_eq!(
            QueryErrorCode::RelqExecKeyTooLarge.code(),
            "RELQ_EXEC_KEY_TOO_LARGE"
        );
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(
            QueryErrorCode::RelqQueryUnknownColumn.severity(),
            Severity::Reject
        );
        assert_eq!(
            QueryErrorCode::RelqExecKeyTooLarge.severity(),
            Severity::Abort
        );
    }

    #[test]
    fn test_error_display() {
        let err = QueryError::unknown_column("age");
        let display = format!("{}", err);
        assert!(display.contains("RELQ_QUERY_UNKNOWN_COLUMN"));
        assert!(display.contains("age"));
        assert!(display.contains("REJECT"));
    }

    #[test]
    fn test_storage_error_wrapped() {
        let err: QueryError = StorageError::UnknownTable("t".into()).into();
        assert_eq!(err.code(), QueryErrorCode::RelqStorage);
        assert_eq!(err.severity(), Severity::Abort);
    }
}
