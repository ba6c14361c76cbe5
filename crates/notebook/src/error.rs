//! Error taxonomy shared across the notebook library.
//!
//! Cell-level evaluation failures are *not* part of this enum: they are
//! contained inside the failing cell (see `Notebook::run_cell`) and never
//! cross the cell boundary. Everything here is document- or transport-level
//! and aborts the operation that raised it, leaving prior state intact.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed document JSON, including unrecognized `cell_type` or
    /// `output_type` tags.
    #[error("malformed notebook document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A code cell record carried no `execute_result` output. This indicates
    /// a corrupt document and is never papered over with a default.
    #[error("code cell {index} has no execute_result output record")]
    MissingOutputRecord { index: usize },

    /// A cell index past the end of the notebook's cell sequence.
    #[error("no cell at index {index}")]
    NoSuchCell { index: usize },

    /// A failed fetch or post. Carries the failing URL; there is no
    /// automatic retry.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
