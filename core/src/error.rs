//! Error kinds surfaced across configuration loading, document
//! construction and the search loop.

use thiserror::Error;

/// The three error kinds the engine can surface.
///
/// `Configuration` and `FileFormat` are fatal: the driver is expected to
/// report them and terminate before entering the search loop.
/// `TransientSearchFailure` is not an error condition in the `Result`
/// sense — it is reported through [`crate::search::SearchOutcome::aborted`]
/// instead, since an abort is an ordinary outcome of the search, not a
/// failure of the program. It is kept in this enum because `spec.md` names
/// it alongside the other two as one of the three error kinds.
#[derive(Debug, Error)]
pub enum DocentError {
    #[error("configuration error at {path}: {detail}")]
    Configuration { path: String, detail: String },

    #[error("file format error in {filename} (record {record}): {detail}")]
    FileFormat {
        filename: String,
        record: String,
        detail: String,
    },

    #[error("search aborted for document {document_id}: operator refused {attempts} times in a row")]
    TransientSearchFailure {
        document_id: String,
        attempts: u32,
    },
}

impl DocentError {
    pub fn configuration(path: impl Into<String>, detail: impl Into<String>) -> Self {
        DocentError::Configuration {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn file_format(
        filename: impl Into<String>,
        record: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        DocentError::FileFormat {
            filename: filename.into(),
            record: record.into(),
            detail: detail.into(),
        }
    }
}

pub type DocentResult<T> = Result<T, DocentError>;
