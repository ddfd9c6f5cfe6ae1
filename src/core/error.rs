use std::fmt;

#[derive(Debug)]
pub enum ErrorKind {
    Io,
    Parse,
    NotFound,
    InvalidArgument,
    Internal,
    InvalidInput,
    OutOfMemory,
    InvalidState,
    UnsupportedQuery,

    // Fatal at startup: the process should abort rather than limp on.
    ConfigMissing,
    ConfigMalformed,

    // Recoverable at the call site.
    StoreIOError,
    NetworkError,
    RegistryError,
    DecodeError,
    CorruptPostings,
    PolicyBlocked,
    OverloadTimeout,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    /// Whether this error kind is one of the two that should abort the
    /// process during startup.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(self.kind, ErrorKind::ConfigMissing | ErrorKind::ConfigMalformed)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::DecodeError,
            context: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error {
            kind: ErrorKind::NetworkError,
            context: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error {
            kind: ErrorKind::RegistryError,
            context: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
