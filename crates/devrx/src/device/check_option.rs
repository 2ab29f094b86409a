/// Controls how deferred device checks behave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOption {
    /// Synchronize the stream before peeking at the pending error.
    /// Makes asynchronous failures surface at the checking call site at the
    /// cost of a blocking wait. Defaults to on in debug builds only.
    pub sync_on_check: bool,
}

impl Default for CheckOption {
    fn default() -> Self {
        Self {
            sync_on_check: cfg!(debug_assertions),
        }
    }
}

impl CheckOption {
    /// Always synchronize before checking.
    pub fn synchronous() -> Self {
        Self {
            sync_on_check: true,
        }
    }

    /// Only peek at the pending error; failures may surface at a later check.
    pub fn deferred() -> Self {
        Self {
            sync_on_check: false,
        }
    }
}
