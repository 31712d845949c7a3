//! Error types for the editor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid page capacity {rows}x{cols}")]
    InvalidCapacity { rows: u32, cols: u32 },

    #[error("Redistribution did not converge after {iterations} iterations")]
    RedistributionLimit { iterations: usize },

    #[error("Page not found: {0}")]
    UnknownPage(String),

    #[error("Project is not file-backed")]
    NotFileBacked,
}

pub type EditorResult<T> = Result<T, EditorError>;
