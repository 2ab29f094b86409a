//! Failure taxonomy shared by the regex compiler and the device classifier.
//!
//! Three kinds, never conflated:
//!
//! | Variant        | Meaning                                   | Caller action                  |
//! |----------------|-------------------------------------------|--------------------------------|
//! | `Precondition` | caller supplied invalid input             | fix the input, never retried   |
//! | `Device`       | one device call failed, context intact    | retry or drop the unit of work |
//! | `FatalDevice`  | the device context is corrupted           | stop, rebuild the context      |
//!
//! Every failure carries the call site where it was detected.

use std::fmt;
use std::panic::Location;

use thiserror::Error;

use crate::device::DeviceStatus;

pub type DevrxResult<T> = Result<T, Failure>;

/// File/line of the call that detected a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
}

impl SourceLocation {
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }

    /// Location of the caller of the enclosing `#[track_caller]` function.
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }
}

impl From<&'static Location<'static>> for SourceLocation {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Which invariant a precondition failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreconditionKind {
    /// Generic logic error (the default)
    Logic,
    /// An argument was malformed, e.g. a pattern with bad syntax
    InvalidArgument,
    /// A value exceeded an engine limit
    OutOfRange,
    /// Well-formed input asking for something the engine cannot do
    Unsupported,
}

impl fmt::Display for PreconditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionKind::Logic => write!(f, "logic error"),
            PreconditionKind::InvalidArgument => write!(f, "invalid argument"),
            PreconditionKind::OutOfRange => write!(f, "out of range"),
            PreconditionKind::Unsupported => write!(f, "unsupported"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PreconditionError {
    kind: PreconditionKind,
    reason: String,
    message: String,
    location: SourceLocation,
}

impl PreconditionError {
    pub fn new(kind: PreconditionKind, reason: impl Into<String>, location: SourceLocation) -> Self {
        let reason = reason.into();
        let message = format!("devrx failure at: {}: {}", location, reason);
        Self {
            kind,
            reason,
            message,
            location,
        }
    }

    pub fn kind(&self) -> PreconditionKind {
        self.kind
    }

    /// The reason without the location prefix.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }
}

/// A device-runtime call that returned a non-success status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DeviceError {
    status: DeviceStatus,
    message: String,
    location: SourceLocation,
}

impl DeviceError {
    pub fn new(status: DeviceStatus, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            status,
            message: message.into(),
            location,
        }
    }

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    /// The failing call's effect is isolated; the context may accept new work.
    #[error(transparent)]
    Device(DeviceError),
    /// The device context is poisoned; no further work may be submitted to it.
    #[error(transparent)]
    FatalDevice(DeviceError),
}

impl Failure {
    pub fn is_precondition(&self) -> bool {
        matches!(self, Failure::Precondition(_))
    }

    /// True for both recoverable and fatal device failures.
    pub fn is_device(&self) -> bool {
        matches!(self, Failure::Device(_) | Failure::FatalDevice(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Failure::FatalDevice(_))
    }

    pub fn location(&self) -> SourceLocation {
        match self {
            Failure::Precondition(e) => e.location(),
            Failure::Device(e) | Failure::FatalDevice(e) => e.location(),
        }
    }

    /// Device status code, if this is a device failure.
    pub fn status(&self) -> Option<DeviceStatus> {
        match self {
            Failure::Precondition(_) => None,
            Failure::Device(e) | Failure::FatalDevice(e) => Some(e.status()),
        }
    }

    pub fn precondition_kind(&self) -> Option<PreconditionKind> {
        match self {
            Failure::Precondition(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// Fails with a [`PreconditionKind::Logic`] failure when `condition` is false.
#[track_caller]
pub fn check_condition(condition: bool, reason: &str) -> DevrxResult<()> {
    check_condition_at(condition, PreconditionKind::Logic, reason, SourceLocation::caller())
}

/// Same as [`check_condition`] with an explicit failure kind.
///
/// Only precondition failures are raised here. [`Failure::Device`] and
/// [`Failure::FatalDevice`] come solely from classifying a device status, see
/// [`crate::device::checked_call`].
#[track_caller]
pub fn check_condition_as(condition: bool, kind: PreconditionKind, reason: &str) -> DevrxResult<()> {
    check_condition_at(condition, kind, reason, SourceLocation::caller())
}

pub fn check_condition_at(
    condition: bool,
    kind: PreconditionKind,
    reason: &str,
    location: SourceLocation,
) -> DevrxResult<()> {
    if condition {
        Ok(())
    } else {
        Err(PreconditionError::new(kind, reason, location).into())
    }
}

/// Always fails; marks a code path that must not be taken.
#[track_caller]
pub fn unconditional_fail<T>(reason: &str) -> DevrxResult<T> {
    Err(PreconditionError::new(PreconditionKind::Logic, reason, SourceLocation::caller()).into())
}

/// Returns early with a precondition failure when the condition is false.
///
/// ```
/// # use devrx::{expects, error::{DevrxResult, PreconditionKind}};
/// fn threads(n: i64) -> DevrxResult<usize> {
///     expects!(n >= 0, kind = PreconditionKind::OutOfRange, "negative thread count {}", n);
///     Ok(n as usize)
/// }
/// assert!(threads(-1).unwrap_err().is_precondition());
/// ```
#[macro_export]
macro_rules! expects {
    ($cond:expr, kind = $kind:expr, $($arg:tt)+) => {
        if !($cond) {
            return Err($crate::error::Failure::from($crate::error::PreconditionError::new(
                $kind,
                format!($($arg)+),
                $crate::error::SourceLocation::new(file!(), line!()),
            ))
            .into());
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        $crate::expects!($cond, kind = $crate::error::PreconditionKind::Logic, $($arg)+)
    };
}

/// Returns early with a [`PreconditionKind::Logic`] failure.
#[macro_export]
macro_rules! fail {
    ($($arg:tt)+) => {
        return Err($crate::error::Failure::from($crate::error::PreconditionError::new(
            $crate::error::PreconditionKind::Logic,
            format!($($arg)+),
            $crate::error::SourceLocation::new(file!(), line!()),
        ))
        .into())
    };
}
