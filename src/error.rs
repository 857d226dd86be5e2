//! A dedicated error for all possible errors in DNS queries and FTP session handling: I/O, DNS
//! packet inconsistencies, protocol violations, filesystem faults, etc.
use std::io;
use std::str;

#[derive(Debug)]
pub enum DNSError {
    Io(io::Error),
    FromUtf8(std::string::FromUtf8Error),
    Utf8(str::Utf8Error),
    LoggerError(log::SetLoggerError),
    DNS(String),
    DNSInternalError(InternalError),
    /// all servers in the configured list were tried without an accepted reply
    Timeout,
}

#[derive(Debug)]
pub enum InternalError {
    DnsDomainNameTooLong,
    EmptyDomainName,
    /// label-compression pointer chain revisited a position already seen, or exceeded
    /// the message length in hops
    PointerLoop,
}

impl DNSError {
    // Helper function to create a new DNS error from a string
    pub fn new(s: &str) -> Self {
        DNSError::DNS(String::from(s))
    }
}

/// A specific custom `Result` for all DNS-related functions
pub type DNSResult<T> = Result<T, DNSError>;

// All conversions for internal errors for DNSError
impl From<io::Error> for DNSError {
    fn from(err: io::Error) -> Self {
        DNSError::Io(err)
    }
}

impl From<String> for DNSError {
    fn from(err: String) -> Self {
        DNSError::DNS(err)
    }
}

impl From<std::string::FromUtf8Error> for DNSError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        DNSError::FromUtf8(err)
    }
}

impl From<str::Utf8Error> for DNSError {
    fn from(err: str::Utf8Error) -> Self {
        DNSError::Utf8(err)
    }
}

impl From<log::SetLoggerError> for DNSError {
    fn from(err: log::SetLoggerError) -> Self {
        DNSError::LoggerError(err)
    }
}

/// Errors the FTP server distinguishes while running a session. Handlers never let these
/// escape the dispatch boundary: they are turned into a reply code and logged instead.
#[derive(Debug)]
pub enum FtpError {
    Io(io::Error),
    /// bad verb, wrong sequence (e.g. RNTO without RNFR, PASS without USER)
    ProtocolViolation(String),
    NotFound(String),
    AlreadyExists(String),
    PermissionDenied(String),
    /// no PASV port could be bound after a full cycle of the configured range
    ResourceExhaustion,
    /// startup-only: listener bind failure, unreadable served root
    Fatal(String),
}

pub type FtpResult<T> = Result<T, FtpError>;

impl From<io::Error> for FtpError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FtpError::NotFound(err.to_string()),
            io::ErrorKind::AlreadyExists => FtpError::AlreadyExists(err.to_string()),
            io::ErrorKind::PermissionDenied => FtpError::PermissionDenied(err.to_string()),
            _ => FtpError::Io(err),
        }
    }
}

impl std::fmt::Display for FtpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FtpError::Io(e) => write!(f, "{}", e),
            FtpError::ProtocolViolation(s) => write!(f, "{}", s),
            FtpError::NotFound(s) => write!(f, "{}", s),
            FtpError::AlreadyExists(s) => write!(f, "{}", s),
            FtpError::PermissionDenied(s) => write!(f, "{}", s),
            FtpError::ResourceExhaustion => write!(f, "resource exhaustion"),
            FtpError::Fatal(s) => write!(f, "{}", s),
        }
    }
}

impl std::error::Error for FtpError {}
