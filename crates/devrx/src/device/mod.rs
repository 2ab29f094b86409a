// Device-runtime failure classification
//
// Every call into the device runtime goes through `checked_call`. A failing
// status is classified with a drain-and-synchronize double check:
//
// 1. drain the pending error flag (result discarded)
// 2. query the pending error again -> `last`
// 3. `last == status` and a full device synchronize also reports `status`
//    -> Fatal, the context is corrupted
// 4. anything else -> Recoverable, only this call failed
//
// Device work is submitted asynchronously, so a status seen at one call site
// may belong to an earlier operation. A single check cannot tell a stale
// reflected error from a context-corrupting one.

mod check_option;
mod context;

use std::borrow::Cow;
use std::fmt;

pub use check_option::CheckOption;
pub use context::DeviceContext;

use crate::error::{DeviceError, DevrxResult, Failure, SourceLocation};

/// Raw status code returned by the device runtime. Zero is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceStatus(pub i32);

impl DeviceStatus {
    pub const SUCCESS: DeviceStatus = DeviceStatus(0);

    #[inline]
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    #[inline]
    pub fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buffer = itoa::Buffer::new();
        f.write_str(buffer.format(self.0))
    }
}

/// Handle to an execution stream. `StreamHandle::DEFAULT` is the legacy
/// default stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamHandle(pub usize);

impl StreamHandle {
    pub const DEFAULT: StreamHandle = StreamHandle(0);
}

/// The status-source capability the classifier needs from a device runtime.
///
/// Real bindings forward to the vendor runtime; tests script the sequence of
/// statuses.
pub trait DeviceRuntime {
    /// Returns the pending error and resets it to success.
    fn get_last_error(&self) -> DeviceStatus;

    /// Returns the pending error without resetting it.
    fn peek_at_last_error(&self) -> DeviceStatus;

    /// Blocks until all work on the device has completed.
    fn device_synchronize(&self) -> DeviceStatus;

    /// Blocks until all work on `stream` has completed.
    fn stream_synchronize(&self, stream: StreamHandle) -> DeviceStatus;

    /// Symbolic name of a status, e.g. `cudaErrorIllegalAddress`.
    fn error_name(&self, status: DeviceStatus) -> Cow<'static, str> {
        let _ = status;
        Cow::Borrowed("unknown_error")
    }

    /// Human readable description of a status.
    fn error_string(&self, status: DeviceStatus) -> Cow<'static, str> {
        let _ = status;
        Cow::Borrowed("unrecognized error code")
    }
}

impl<R: DeviceRuntime + ?Sized> DeviceRuntime for &R {
    fn get_last_error(&self) -> DeviceStatus {
        (**self).get_last_error()
    }

    fn peek_at_last_error(&self) -> DeviceStatus {
        (**self).peek_at_last_error()
    }

    fn device_synchronize(&self) -> DeviceStatus {
        (**self).device_synchronize()
    }

    fn stream_synchronize(&self, stream: StreamHandle) -> DeviceStatus {
        (**self).stream_synchronize(stream)
    }

    fn error_name(&self, status: DeviceStatus) -> Cow<'static, str> {
        (**self).error_name(status)
    }

    fn error_string(&self, status: DeviceStatus) -> Cow<'static, str> {
        (**self).error_string(status)
    }
}

/// Outcome of a single device-runtime call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    /// Only the failing call is affected
    Recoverable,
    /// The device context itself is corrupted
    Fatal,
}

/// Classify the outcome of a device call that returned `status`.
///
/// Issues no runtime requests when `status` is success. Otherwise drains the
/// pending error, queries it again, and only synchronizes the device when the
/// second query still reports `status`.
pub fn classify<R: DeviceRuntime + ?Sized>(runtime: &R, status: DeviceStatus) -> Classification {
    if status.is_success() {
        return Classification::Success;
    }

    let _ = runtime.get_last_error();
    let last = runtime.get_last_error();
    tracing::trace!(status = status.code(), last = last.code(), "drained device error");

    if last == status && runtime.device_synchronize() == status {
        Classification::Fatal
    } else {
        Classification::Recoverable
    }
}

/// Formats the failure for a non-success `status` observed at `location`.
pub fn device_failure<R: DeviceRuntime + ?Sized>(
    runtime: &R,
    status: DeviceStatus,
    classification: Classification,
    location: SourceLocation,
) -> Failure {
    let message = format!(
        "Device error encountered at: {}: {} {} {}",
        location,
        status,
        runtime.error_name(status),
        runtime.error_string(status)
    );
    match classification {
        Classification::Fatal => {
            tracing::error!(status = status.code(), %location, "fatal device error, context is unusable");
            Failure::FatalDevice(DeviceError::new(status, format!("Fatal {}", message), location))
        }
        _ => {
            tracing::warn!(status = status.code(), %location, "device call failed");
            Failure::Device(DeviceError::new(status, message, location))
        }
    }
}

/// Checks the status returned by a device call made by the caller.
#[track_caller]
pub fn checked_call<R: DeviceRuntime + ?Sized>(runtime: &R, status: DeviceStatus) -> DevrxResult<()> {
    checked_call_at(runtime, status, SourceLocation::caller())
}

pub fn checked_call_at<R: DeviceRuntime + ?Sized>(
    runtime: &R,
    status: DeviceStatus,
    location: SourceLocation,
) -> DevrxResult<()> {
    match classify(runtime, status) {
        Classification::Success => Ok(()),
        classification => Err(device_failure(runtime, status, classification, location)),
    }
}

/// Checks for pending asynchronous errors on `stream`.
///
/// With the default option this synchronizes the stream first in debug
/// builds, making asynchronous failures deterministic at the call site. In
/// optimized builds it only peeks at the pending error, which is cheaper but
/// may report a failure later than where it occurred.
#[track_caller]
pub fn debug_checked_sync<R: DeviceRuntime + ?Sized>(runtime: &R, stream: StreamHandle) -> DevrxResult<()> {
    debug_checked_sync_at(runtime, stream, &CheckOption::default(), SourceLocation::caller())
}

#[track_caller]
pub fn debug_checked_sync_with<R: DeviceRuntime + ?Sized>(
    runtime: &R,
    stream: StreamHandle,
    option: &CheckOption,
) -> DevrxResult<()> {
    debug_checked_sync_at(runtime, stream, option, SourceLocation::caller())
}

pub fn debug_checked_sync_at<R: DeviceRuntime + ?Sized>(
    runtime: &R,
    stream: StreamHandle,
    option: &CheckOption,
    location: SourceLocation,
) -> DevrxResult<()> {
    if option.sync_on_check {
        checked_call_at(runtime, runtime.stream_synchronize(stream), location)?;
    }
    checked_call_at(runtime, runtime.peek_at_last_error(), location)
}

/// Evaluates a device call and returns early with a classified failure when
/// it does not report success.
///
/// ```ignore
/// device_try!(runtime, runtime.memcpy_async(dst, src, len, stream));
/// ```
#[macro_export]
macro_rules! device_try {
    ($runtime:expr, $call:expr) => {
        $crate::device::checked_call_at(
            &$runtime,
            $call,
            $crate::error::SourceLocation::new(file!(), line!()),
        )?
    };
}

/// Checks `stream` for pending errors, synchronizing first in debug builds.
#[macro_export]
macro_rules! check_device {
    ($runtime:expr, $stream:expr) => {
        $crate::device::debug_checked_sync_at(
            &$runtime,
            $stream,
            &$crate::device::CheckOption::default(),
            $crate::error::SourceLocation::new(file!(), line!()),
        )?
    };
}
