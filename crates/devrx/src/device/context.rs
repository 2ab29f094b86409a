use std::sync::OnceLock;

use super::{
    CheckOption, Classification, DeviceRuntime, DeviceStatus, StreamHandle, classify, debug_checked_sync_at,
    device_failure,
};
use crate::error::{DeviceError, DevrxResult, Failure, SourceLocation};

/// A device runtime plus the poison state of its context.
///
/// After the first fatal failure the context refuses further checked work:
/// every later call returns the original fatal failure without touching the
/// runtime. Tearing down and rebuilding the context is left to the owner.
pub struct DeviceContext<R: DeviceRuntime> {
    runtime: R,
    option: CheckOption,
    poison: OnceLock<DeviceError>,
}

impl<R: DeviceRuntime> DeviceContext<R> {
    pub fn new(runtime: R) -> Self {
        Self::with_option(runtime, CheckOption::default())
    }

    pub fn with_option(runtime: R, option: CheckOption) -> Self {
        Self {
            runtime,
            option,
            poison: OnceLock::new(),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn option(&self) -> &CheckOption {
        &self.option
    }

    pub fn is_poisoned(&self) -> bool {
        self.poison.get().is_some()
    }

    /// The fatal failure that poisoned this context, if any.
    pub fn poison_error(&self) -> Option<&DeviceError> {
        self.poison.get()
    }

    /// Issues `call` against the runtime and checks the returned status.
    ///
    /// The call is not issued at all once the context is poisoned.
    #[track_caller]
    pub fn call<F>(&self, call: F) -> DevrxResult<()>
    where
        F: FnOnce(&R) -> DeviceStatus,
    {
        let location = SourceLocation::caller();
        self.ensure_usable()?;
        let status = call(&self.runtime);
        self.check_at(status, location)
    }

    /// Checks a status returned by a call made outside the context.
    #[track_caller]
    pub fn check(&self, status: DeviceStatus) -> DevrxResult<()> {
        let location = SourceLocation::caller();
        self.ensure_usable()?;
        self.check_at(status, location)
    }

    /// Checks `stream` for pending asynchronous errors according to the
    /// context's [`CheckOption`].
    #[track_caller]
    pub fn sync(&self, stream: StreamHandle) -> DevrxResult<()> {
        let location = SourceLocation::caller();
        self.ensure_usable()?;
        debug_checked_sync_at(&self.runtime, stream, &self.option, location).inspect_err(|e| self.record(e))
    }

    fn ensure_usable(&self) -> DevrxResult<()> {
        match self.poison.get() {
            Some(error) => Err(Failure::FatalDevice(error.clone())),
            None => Ok(()),
        }
    }

    fn check_at(&self, status: DeviceStatus, location: SourceLocation) -> DevrxResult<()> {
        match classify(&self.runtime, status) {
            Classification::Success => Ok(()),
            classification => {
                let failure = device_failure(&self.runtime, status, classification, location);
                self.record(&failure);
                Err(failure)
            }
        }
    }

    fn record(&self, failure: &Failure) {
        if let Failure::FatalDevice(error) = failure
            && self.poison.set(error.clone()).is_ok()
        {
            tracing::error!(status = error.status().code(), "device context poisoned");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Every error is sticky: once `broken` is set all queries report it.
    struct Sticky {
        broken: Cell<Option<DeviceStatus>>,
        issued: Cell<usize>,
    }

    impl Sticky {
        fn new() -> Self {
            Self {
                broken: Cell::new(None),
                issued: Cell::new(0),
            }
        }

        fn status(&self) -> DeviceStatus {
            self.broken.get().unwrap_or(DeviceStatus::SUCCESS)
        }
    }

    impl DeviceRuntime for Sticky {
        fn get_last_error(&self) -> DeviceStatus {
            self.status()
        }

        fn peek_at_last_error(&self) -> DeviceStatus {
            self.status()
        }

        fn device_synchronize(&self) -> DeviceStatus {
            self.status()
        }

        fn stream_synchronize(&self, _stream: StreamHandle) -> DeviceStatus {
            self.status()
        }
    }

    #[test]
    fn test_fatal_poisons_context() {
        let ctx = DeviceContext::with_option(Sticky::new(), CheckOption::deferred());
        ctx.call(|rt| {
            rt.issued.set(rt.issued.get() + 1);
            DeviceStatus::SUCCESS
        })
        .unwrap();
        assert!(!ctx.is_poisoned());

        let err = ctx
            .call(|rt| {
                rt.issued.set(rt.issued.get() + 1);
                rt.broken.set(Some(DeviceStatus(719)));
                DeviceStatus(719)
            })
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(ctx.is_poisoned());
        assert_eq!(ctx.poison_error().map(|e| e.status()), Some(DeviceStatus(719)));

        // later work is refused without reaching the runtime
        let again = ctx
            .call(|rt| {
                rt.issued.set(rt.issued.get() + 1);
                DeviceStatus::SUCCESS
            })
            .unwrap_err();
        assert_eq!(again, err);
        assert_eq!(ctx.runtime().issued.get(), 2);
        assert!(ctx.sync(StreamHandle::DEFAULT).unwrap_err().is_fatal());
        assert!(ctx.check(DeviceStatus::SUCCESS).unwrap_err().is_fatal());
    }

    #[test]
    fn test_recoverable_keeps_context() {
        let ctx = DeviceContext::new(Sticky::new());
        // runtime reports clean on drain, so the failure is isolated
        let err = ctx.check(DeviceStatus(2)).unwrap_err();
        assert!(err.is_device());
        assert!(!err.is_fatal());
        assert!(!ctx.is_poisoned());
        assert!(ctx.check(DeviceStatus::SUCCESS).is_ok());
        assert!(ctx.sync(StreamHandle(1)).is_ok());
    }

    #[test]
    fn test_sync_failure_poisons() {
        let rt = Sticky::new();
        rt.broken.set(Some(DeviceStatus(700)));
        let ctx = DeviceContext::with_option(rt, CheckOption::synchronous());
        let err = ctx.sync(StreamHandle::DEFAULT).unwrap_err();
        assert!(err.is_fatal());
        assert!(ctx.is_poisoned());
    }
}
