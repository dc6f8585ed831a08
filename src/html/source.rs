use std::fmt::{Display, Formatter};
use std::io;
use tracing::{debug, warn};

/// Substituted for empty input so that parsing always has a root element to work with.
pub const FALLBACK_DOCUMENT: &[u8] = b"<html><body></body></html>";

/// Where the document bytes come from.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InputSource {
    /// A file, by path.
    File(String),
    /// Bytes already in memory.
    Inline(Vec<u8>),
    /// Standard input (or whatever the [`ByteSource`] treats as its default stream).
    Stream,
}

/// Stdin, a file by path, or in-memory bytes. Used to describe where an error happened.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Input {
    Stdin,
    FilePath(String),
    Inline,
}

impl Display for Input {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Input::Stdin => f.write_str("stdin"),
            Input::FilePath(file) => write!(f, "file {file:?}"),
            Input::Inline => f.write_str("inline input"),
        }
    }
}

/// Reads raw bytes from the outside world.
///
/// Implementations own whatever handle they open and must release it before returning.
pub trait ByteSource {
    /// Read standard input (or your mock of it) to the end.
    fn read_stdin(&self) -> io::Result<Vec<u8>>;

    /// Read a whole file (or your mock of one).
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{0} not found")]
    NotFound(Input),

    #[error("permission denied while reading {0}")]
    PermissionDenied(Input),

    #[error("{1} while reading {0}")]
    Io(Input, #[source] io::Error),
}

impl SourceError {
    fn from_io_error(error: io::Error, input: Input) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound(input),
            io::ErrorKind::PermissionDenied => SourceError::PermissionDenied(input),
            _ => SourceError::Io(input, error),
        }
    }
}

/// Resolves the input source to bytes.
///
/// Empty content is replaced by [`FALLBACK_DOCUMENT`], with a warning.
pub fn resolve(source: &InputSource, io: &impl ByteSource) -> Result<Vec<u8>, SourceError> {
    let (input, bytes) = match source {
        InputSource::File(path) => {
            let input = Input::FilePath(path.clone());
            let bytes = io.read_file(path).map_err(|err| SourceError::from_io_error(err, input.clone()))?;
            (input, bytes)
        }
        InputSource::Inline(bytes) => (Input::Inline, bytes.clone()),
        InputSource::Stream => {
            let bytes = io.read_stdin().map_err(|err| SourceError::from_io_error(err, Input::Stdin))?;
            (Input::Stdin, bytes)
        }
    };
    if bytes.is_empty() {
        warn!("{input} is empty; using a minimal empty document instead");
        return Ok(FALLBACK_DOCUMENT.to_vec());
    }
    debug!(%input, len = bytes.len(), "read input");
    Ok(bytes)
}
