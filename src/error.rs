//! Error types for feedbot.

use thiserror::Error;

/// Common error type for feedbot.
#[derive(Error, Debug)]
pub enum FeedbotError {
    /// Database error.
    ///
    /// Any failure of the persistence layer other than a missing row. The
    /// dispatcher treats these as fatal for the whole poll cycle.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Feed fetch or parse error.
    #[error("feed error: {0}")]
    Fetch(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FeedbotError {
    /// Whether this error means the persistence layer itself failed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FeedbotError::Database(_) | FeedbotError::DatabaseConnection(_)
        )
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for FeedbotError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => FeedbotError::NotFound("row".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                FeedbotError::DatabaseConnection(e.to_string())
            }
            e => FeedbotError::Database(e.to_string()),
        }
    }
}

/// Result type alias for feedbot operations.
pub type Result<T> = std::result::Result<T, FeedbotError>;

/// Outcome of an operation that creates a row unless an equivalent one
/// already exists.
///
/// `AlreadyExists` is not a failure: it carries the row that was already
/// present so the caller can reply with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome<T> {
    /// A new row was inserted.
    Created(T),
    /// An equivalent row was already present; nothing was inserted.
    AlreadyExists(T),
}

impl<T> CreateOutcome<T> {
    /// Whether a new row was inserted.
    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }

    /// Borrow the row regardless of whether it was created.
    pub fn get(&self) -> &T {
        match self {
            CreateOutcome::Created(v) | CreateOutcome::AlreadyExists(v) => v,
        }
    }

    /// Take the row regardless of whether it was created.
    pub fn into_inner(self) -> T {
        match self {
            CreateOutcome::Created(v) | CreateOutcome::AlreadyExists(v) => v,
        }
    }
}
