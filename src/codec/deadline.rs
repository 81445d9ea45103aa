//! Read and write deadlines shared between a connection and its owners.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::{Instant, timeout_at};

use crate::error::{Error, Result};

/// Absolute read and write deadlines. `None` waits forever.
#[derive(Debug, Clone, Copy, Default)]
struct Deadlines {
    read: Option<Instant>,
    write: Option<Instant>,
}

/// Cloneable handle to a connection's deadlines.
///
/// Heartbeat callbacks and timers hold a clone to push the read deadline
/// forward; the connection re-reads the deadline before each transport call.
#[derive(Debug, Clone, Default)]
pub struct DeadlineHandle {
    inner: Arc<Mutex<Deadlines>>,
}

impl DeadlineHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_read(&self, deadline: Option<Instant>) {
        self.inner.lock().read = deadline;
    }

    pub fn set_write(&self, deadline: Option<Instant>) {
        self.inner.lock().write = deadline;
    }

    #[must_use]
    pub fn read(&self) -> Option<Instant> {
        self.inner.lock().read
    }

    #[must_use]
    pub fn write(&self) -> Option<Instant> {
        self.inner.lock().write
    }
}

/// Run one transport operation, failing with a timeout once `deadline` has passed.
///
/// An already expired deadline fails without polling `op`.
pub(crate) async fn with_deadline<F, O>(deadline: Option<Instant>, op: F) -> Result<O>
where
    F: Future<Output = std::io::Result<O>>,
{
    match deadline {
        None => Ok(op.await?),
        Some(at) if Instant::now() >= at => Err(Error::timed_out()),
        Some(at) => match timeout_at(at, op).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(Error::timed_out()),
        },
    }
}
