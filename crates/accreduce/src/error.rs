// We follow the same approach as the rest of this family of crates: a public
// `Error` struct wraps a private `ErrorKind`, and each kind is backed by a
// small struct that knows how to describe itself.
//
// The `no_std` kernel reports problems with `&'static str` (for layout
// checks), `TransferError` (for transfers) or `RankError` (from the reducer).
// All of them get wrapped here.

use accreduce_nostd_internal::{MAX_ARRAY, RankError, TransferError};

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

/// Coarse classification of an [`Error`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// the requested reduction can't be carried out as configured (e.g. too
    /// many arrays, a malformed layout, bad rank arguments)
    Configuration,
    /// scratch memory couldn't be reserved
    ResourceExhausted,
    /// the transfer machinery failed, or was handed a malformed request
    TransferFabric,
}

/// The underlying internal error type
#[non_exhaustive]
#[derive(Debug)]
enum ErrorKind {
    /// An error that occurs when a configuration file can't be parsed
    Config(ConfigError),
    /// An error that occurs when an integer lies outside of the acceptable
    /// range of values
    IntegerRange(IntegerRangeError),
    /// An error that occurs when the array-of-arrays is laid out incorrectly
    Layout(LayoutError),
    /// An error that occurs when scratch memory can't be reserved
    ResourceExhausted(ResourceExhaustedError),
    /// An error that occurs when a thread pool can't be built
    ThreadPool(ThreadPoolError),
    /// An error reported by a transfer engine
    Transfer(TransferError),
}

// define constructor methods for Error
impl Error {
    pub(crate) fn config(what: String) -> Self {
        Error {
            kind: ErrorKind::Config(ConfigError(what)),
        }
    }

    /// produce an error indicating that an integer lies outside the acceptable
    /// range of values
    pub(crate) fn integer_range(
        description: &'static str,
        actual: i64,
        min_val: i64,
        max_val: i64,
    ) -> Self {
        Error {
            kind: ErrorKind::IntegerRange(IntegerRangeError {
                description,
                actual,
                min_val,
                max_val,
            }),
        }
    }

    pub(crate) fn layout(what: &'static str) -> Self {
        Error {
            kind: ErrorKind::Layout(LayoutError(what)),
        }
    }

    pub(crate) fn resource_exhausted(what: &'static str, n_bytes: usize) -> Self {
        Error {
            kind: ErrorKind::ResourceExhausted(ResourceExhaustedError { what, n_bytes }),
        }
    }

    pub(crate) fn thread_pool(what: String) -> Self {
        Error {
            kind: ErrorKind::ThreadPool(ThreadPoolError(what)),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.kind {
            ErrorKind::Config(_)
            | ErrorKind::IntegerRange(_)
            | ErrorKind::Layout(_)
            | ErrorKind::ThreadPool(_) => ErrorCategory::Configuration,
            ErrorKind::ResourceExhausted(_) => ErrorCategory::ResourceExhausted,
            ErrorKind::Transfer(_) => ErrorCategory::TransferFabric,
        }
    }

    /// the wrapped transfer error, if this error came from a transfer engine
    pub fn transfer_error(&self) -> Option<&TransferError> {
        match self.kind {
            ErrorKind::Transfer(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransferError> for Error {
    fn from(err: TransferError) -> Self {
        Error {
            kind: ErrorKind::Transfer(err),
        }
    }
}

impl From<RankError> for Error {
    fn from(err: RankError) -> Self {
        match err {
            RankError::ArrayCount(n_array) => {
                Error::integer_range("n_array", n_array as i64, 2, MAX_ARRAY as i64)
            }
            RankError::Transfer(err) => err.into(),
        }
    }
}

impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        self.kind.fmt(f)
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match *self {
            ErrorKind::Config(ref err) => err.fmt(f),
            ErrorKind::IntegerRange(ref err) => err.fmt(f),
            ErrorKind::Layout(ref err) => err.fmt(f),
            ErrorKind::ResourceExhausted(ref err) => err.fmt(f),
            ErrorKind::ThreadPool(ref err) => err.fmt(f),
            ErrorKind::Transfer(ref err) => write!(f, "transfer failed: {err}"),
        }
    }
}

#[derive(Clone, Debug)]
struct ConfigError(String);

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "invalid configuration: {}", self.0)
    }
}

/// An error that occurs when an integer lies outside of the acceptable
/// range of values
#[derive(Clone, Debug)]
struct IntegerRangeError {
    description: &'static str,
    actual: i64,
    min_val: i64,
    max_val: i64,
}

impl core::fmt::Display for IntegerRangeError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "{} has a value of {}. The value should be no less than {} and \
             not exceed {}",
            self.description, self.actual, self.min_val, self.max_val
        )
    }
}

#[derive(Clone, Debug)]
struct LayoutError(&'static str);

impl core::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "bad accumulator layout: {}", self.0)
    }
}

#[derive(Clone, Debug)]
struct ResourceExhaustedError {
    what: &'static str,
    n_bytes: usize,
}

impl core::fmt::Display for ResourceExhaustedError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "unable to reserve {} bytes for {}",
            self.n_bytes, self.what
        )
    }
}

#[derive(Clone, Debug)]
struct ThreadPoolError(String);

impl core::fmt::Display for ThreadPoolError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "unable to build thread pool: {}", self.0)
    }
}
