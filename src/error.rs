use std::fmt;
use std::io;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    /// The underlying file failed: disk full, permission denied, and so on. Always fatal for the
    /// save or load in progress.
    Io(io::Error),
    /// A tag body, chunk, or file ended before a value finished decoding.
    ShortRead {
        step: &'static str,
        actual: usize,
        expected: usize,
    },
    /// A canary byte between two subsections didn't match. The previous subsection's reader
    /// consumed the wrong number of bytes, or the wrong migration branch ran.
    CanaryMismatch {
        section: &'static str,
        expected: u8,
        actual: u8,
    },
    /// A decoded length, count, or enumerated value was outside its allowed range.
    Format(String),
    /// A tag, chunk, or grid was larger than the maximum allowed size.
    LengthTooLong { max: usize, actual: usize },
    /// The save was written by a build with an older, incompatible major version.
    OldVersion { major: u8, minor: u8 },
    /// The save was written by a newer build than this one.
    NewerVersion { major: u8, minor: u8 },
    /// A named chunk isn't present in the package.
    MissingChunk(String),
}

impl Error {
    /// True if this error only means the data ran out early. Best-effort readers treat this as
    /// "not present".
    pub fn is_short_read(&self) -> bool {
        matches!(self, Error::ShortRead { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref err) => write!(f, "I/O failure: {}", err),
            Error::ShortRead {
                step,
                actual,
                expected,
            } => write!(
                f,
                "Expected {} more bytes, but only {} remain on step [{}]",
                expected, actual, step
            ),
            Error::CanaryMismatch {
                section,
                expected,
                actual,
            } => write!(
                f,
                "Canary before [{}] was 0x{:02x}, expected 0x{:02x}; save is corrupt or out of sync",
                section, actual, expected
            ),
            Error::Format(ref err) => write!(f, "Bad save encoding: {}", err),
            Error::LengthTooLong { max, actual } => write!(
                f,
                "Data too long: was {} bytes, maximum allowed is {}",
                actual, max
            ),
            Error::OldVersion { major, minor } => write!(
                f,
                "Save version {}.{} is too old for this build",
                major, minor
            ),
            Error::NewerVersion { major, minor } => write!(
                f,
                "Save version {}.{} was written by a newer build",
                major, minor
            ),
            Error::MissingChunk(ref name) => write!(f, "Chunk [{}] is missing", name),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl std::convert::From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
