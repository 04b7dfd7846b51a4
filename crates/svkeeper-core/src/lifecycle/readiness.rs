//! Waiting for `runsv` to accept commands.
//!
//! `runsv` creates the named pipe `supervise/ok` once it is ready. The wait
//! polls for that pipe at a fixed interval, optionally bounded by a timeout
//! and interruptible through a [`CancellationToken`].

use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use super::LIFECYCLE_TARGET;
use super::error::LifecycleError;

const MIN_INTERVAL: Duration = Duration::from_millis(1);
const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Suspends the caller between readiness checks.
pub trait Pause {
    /// Blocks for roughly `duration`.
    fn pause(&mut self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Shared flag that aborts a readiness wait.
///
/// Clones observe the same flag, so a signal handler or another thread can
/// cancel a wait in progress.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates an uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying flag, for registration with signal handlers.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How long and how often to wait for readiness.
#[derive(Debug, Clone)]
pub struct ReadinessPolicy {
    interval: Duration,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL, None)
    }
}

impl ReadinessPolicy {
    /// Polls every `interval` (at least one millisecond) until `timeout`
    /// elapses, or forever when `timeout` is `None`.
    #[must_use]
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` to abort waits.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Delay between checks.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound on the wait.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Token observed by waits under this policy.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Whether `path` exists and is a named pipe.
#[must_use]
pub fn is_ready(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|metadata| metadata.file_type().is_fifo())
}

/// Blocks until the pipe at `path` appears.
///
/// # Errors
///
/// Returns [`LifecycleError::ReadinessTimeout`] once the policy's timeout
/// has been spent pausing, or [`LifecycleError::ReadinessCancelled`] when
/// the token is cancelled first.
pub fn wait_for_marker(
    path: &Path,
    policy: &ReadinessPolicy,
    pause: &mut dyn Pause,
) -> Result<(), LifecycleError> {
    let mut waited = Duration::ZERO;
    let mut announced = false;
    loop {
        if is_ready(path) {
            debug!(target: LIFECYCLE_TARGET, marker = %path.display(), "supervisor ready");
            return Ok(());
        }
        if policy.cancel.is_cancelled() {
            return Err(LifecycleError::ReadinessCancelled {
                path: path.to_path_buf(),
            });
        }
        if let Some(timeout) = policy.timeout
            && waited >= timeout
        {
            return Err(LifecycleError::ReadinessTimeout {
                path: path.to_path_buf(),
                timeout,
            });
        }
        if !announced {
            info!(
                target: LIFECYCLE_TARGET,
                marker = %path.display(),
                "waiting for supervisor to start"
            );
            announced = true;
        }
        pause.pause(policy.interval);
        waited = waited.saturating_add(policy.interval);
    }
}
