//! Tracks metadata for a filter rendering session.

use std::sync::Arc;

use crate::log;

/// Metadata for a rendering session.
///
/// A caller creates a `Session` once and passes it to every filter invocation.  It
/// is cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    log_enabled: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                log_enabled: log::log_enabled(),
            }),
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session with logging turned off, regardless of the environment.
    pub fn new_for_test_suite() -> Self {
        Self::with_logging(false)
    }

    pub fn with_logging(log_enabled: bool) -> Self {
        Self {
            inner: Arc::new(SessionInner { log_enabled }),
        }
    }

    pub fn log_enabled(&self) -> bool {
        self.inner.log_enabled
    }
}
