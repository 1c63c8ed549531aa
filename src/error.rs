//! Error types for the analytics engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The five confidence-category weights do not add up to 100.
    #[error("Weights must sum to 100, but current total is {total}")]
    InvalidWeights { total: u32 },

    /// An inventory or history collaborator could not supply data.
    #[error("Provider error: {0}")]
    Provider(String),
}
