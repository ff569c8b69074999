// Error taxonomy for card mutations and storage access

use thiserror::Error;

/// Everything the tracker core can fail with.
///
/// The first five variants are validation errors: they are detected before
/// any write happens and the user can correct them. The rest wrap failures
/// of the underlying storage or output stream.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Card code has no `-` separating edition and number
    #[error("card code '{0}' must contain '-' (e.g. OP13-118)")]
    CodeFormat(String),

    #[error("price must be a non-negative number, got {0}")]
    InvalidPrice(f64),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("name is {0} characters long, maximum is 60")]
    NameTooLong(usize),

    /// Same card code, or same name within the same edition
    #[error("card already exists: {0}")]
    Duplicate(String),

    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    /// Short machine-readable code, used by the web layer as `?error=<code>`
    pub fn code(&self) -> &'static str {
        match self {
            TrackerError::CodeFormat(_) => "codeformat",
            TrackerError::InvalidPrice(_) => "price",
            TrackerError::EmptyField(_) => "empty",
            TrackerError::NameTooLong(_) => "toolong",
            TrackerError::Duplicate(_) => "duplicate",
            TrackerError::Storage(_) => "storage",
            TrackerError::Csv(_) | TrackerError::Io(_) => "export",
        }
    }

    /// True for user-correctable input errors
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TrackerError::CodeFormat(_)
                | TrackerError::InvalidPrice(_)
                | TrackerError::EmptyField(_)
                | TrackerError::NameTooLong(_)
                | TrackerError::Duplicate(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
