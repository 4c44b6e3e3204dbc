use thiserror::Error;

/// Result alias for binary XML operations.
pub type AxmlResult<T> = Result<T, AxmlError>;

/// Errors surfaced while reading binary XML chunks or package archives.
///
/// Value formatting never fails; only the container parser, the XML writer and the
/// archive reader produce these.
#[derive(Debug, Error)]
pub enum AxmlError {
    /// A read ran past the end of the input.
    #[error("unexpected end of binary XML at offset {0:#x}")]
    Truncated(usize),

    /// A chunk header or body does not describe a valid record.
    #[error("malformed chunk at offset {offset:#x}: {reason}")]
    MalformedChunk { offset: usize, reason: String },

    /// A string pool entry could not be decoded as text.
    #[error("string pool entry {index} is not valid text")]
    InvalidString { index: usize },

    /// Text XML generation failure.
    #[error("XML error: {0}")]
    Xml(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    /// The requested archive entry does not exist.
    #[error("no entry named '{0}' in archive")]
    MissingEntry(String),
}

impl AxmlError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        AxmlError::MalformedChunk {
            offset,
            reason: reason.into(),
        }
    }
}

impl From<quick_xml::Error> for AxmlError {
    fn from(value: quick_xml::Error) -> Self {
        AxmlError::Xml(value.to_string())
    }
}
