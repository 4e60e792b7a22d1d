use thiserror::Error;

use crate::models::Pool;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("invalid outcome '{0}'. Use: correct, partial, or incorrect")]
    InvalidOutcome(String),

    #[error("invalid pool '{0}'. Use: vocabulary or grammar")]
    InvalidPool(String),

    #[error("daily learning limit reached for {pool}")]
    BudgetExhausted { pool: Pool },

    #[error("spaced repetition is disabled for set {0}")]
    SrsDisabled(i64),

    #[error("item {0} is already in the review cycle")]
    AlreadyAdopted(i64),

    #[error("item {0} has not been learned yet")]
    NotAdopted(i64),
}

impl Error {
    pub fn not_found(kind: &'static str, id: i64) -> Self {
        Error::NotFound { kind, id }
    }
}
