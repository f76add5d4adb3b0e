use std::io;

use thiserror::Error;

/// Errors raised while converting an archive.
#[derive(Error, Debug)]
pub enum Error {
    /// Reading the archive or writing the transcript failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive is truncated or structurally corrupt
    #[error("invalid ZIP archive: {0}")]
    Archive(String),

    /// The archive uses a feature this reader does not implement
    #[error("unsupported ZIP feature: {0}")]
    Unsupported(String),

    /// An entry classified as XML is not well-formed
    #[error("malformed XML in {entry}: {source}")]
    Xml {
        entry: String,
        #[source]
        source: XmlError,
    },
}

/// Why an XML entry could not be pretty-printed
#[derive(Error, Debug)]
pub enum XmlError {
    #[error(transparent)]
    Syntax(#[from] quick_xml::Error),

    #[error(transparent)]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// Well-formedness violation the tokenizer lets through
    #[error("{0}")]
    Structure(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn archive(msg: impl Into<String>) -> Self {
        Error::Archive(msg.into())
    }

    /// Process exit status for this error.
    ///
    /// Usage errors exit with 1 and never reach this type.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Io(_) => 2,
            Error::Archive(_) | Error::Unsupported(_) => 3,
            Error::Xml { .. } => 4,
        }
    }
}

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_and_never_usage() {
        let io = Error::Io(io::Error::new(io::ErrorKind::NotFound, "missing"));
        let archive = Error::archive("bad header");
        let unsupported = Error::Unsupported("method 12".into());

        assert_eq!(io.exit_code(), 2);
        assert_eq!(archive.exit_code(), 3);
        assert_eq!(unsupported.exit_code(), 3);

        let xml = Error::Xml {
            entry: "content.xml".into(),
            source: XmlError::Structure("no root element".into()),
        };
        assert_eq!(xml.exit_code(), 4);
        assert_eq!(xml.to_string(), "malformed XML in content.xml: no root element");
    }

    #[test]
    fn archive_message_is_prefixed() {
        let err = Error::archive("invalid entry CRC");
        assert_eq!(err.to_string(), "invalid ZIP archive: invalid entry CRC");
    }
}
