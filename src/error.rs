//! Error types for riffle operations.

use thiserror::Error;

/// Errors that can occur while opening, extracting, or laying out a document.
///
/// Archive and structure errors are fatal to the whole load: either at least
/// one chapter loads, or the operation fails with one of these. Render errors
/// are recoverable — the layout pass that produced one is deferred and retried
/// on the next pass instead of being surfaced.
#[derive(Error, Debug)]
pub enum Error {
    /// The container is unreadable or corrupt: missing container descriptor,
    /// missing package document, or an archive that cannot be decompressed.
    #[error("invalid archive: {0}")]
    Archive(String),

    /// The package is readable but structurally unusable: the spine resolves
    /// to nothing, or no chapter survives extraction.
    #[error("invalid structure: {0}")]
    Structure(String),

    /// Pagination geometry cannot be computed (e.g. a zero-width viewport).
    #[error("render geometry: {0}")]
    Render(String),

    /// The load was cancelled via its [`CancelToken`](crate::document::CancelToken).
    #[error("load cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;
