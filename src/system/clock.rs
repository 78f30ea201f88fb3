//! Wall-clock time and time synchronization.
//!
//! All timestamps in the crate are Unix seconds in UTC (`i64`). A clock that
//! reports less than one day after the epoch is treated as "not yet
//! synchronized": that is what an embedded RTC reads right after boot.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Any time below this many seconds after the epoch counts as unsynchronized.
pub const SYNC_THRESHOLD_SECS: i64 = 24 * 3600;

/// Default number of polls while waiting for time sync.
pub const DEFAULT_SYNC_RETRIES: u32 = 100;

/// Default delay between polls while waiting for time sync.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(100);

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current Unix time in seconds.
    fn now(&self) -> i64;

    /// Ask the platform to (re)synchronize time, e.g. by starting an NTP
    /// exchange. Must not block; the default does nothing.
    fn request_sync(&self) {}

    /// Current Unix time in milliseconds, derived from [`now`](Clock::now).
    fn now_millis(&self) -> u64 {
        u64::try_from(self.now()).unwrap_or(0) * 1000
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> i64 {
        (**self).now()
    }

    fn request_sync(&self) {
        (**self).request_sync()
    }
}

/// Returns `true` once `now` looks like a real calendar time.
pub fn is_synchronized(now: i64) -> bool {
    now >= SYNC_THRESHOLD_SECS
}

/// Blocks until `clock` reports a synchronized time, polling at most
/// `retries` times.
///
/// Returns whether time is synchronized when the wait ends. Running out of
/// retries is not an error: callers proceed with whatever time they have.
pub fn wait_for_valid_time<C: Clock + ?Sized>(clock: &C, retries: u32, interval: Duration) -> bool {
    if is_synchronized(clock.now()) {
        return true;
    }
    log::info!("[clock] time not synchronized, requesting sync");
    clock.request_sync();
    for _ in 0..retries {
        thread::sleep(interval);
        if is_synchronized(clock.now()) {
            return true;
        }
    }
    log::warn!("[clock] time still not synchronized after {retries} polls");
    false
}

/// The host's real-time clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock that only moves when told to.
///
/// Cloning shares the underlying time, so a test can keep one handle and give
/// another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
    sync_requests: Arc<AtomicUsize>,
}

impl ManualClock {
    /// Creates a clock reading `now`.
    pub fn new(now: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now)),
            sync_requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// How many times [`Clock::request_sync`] was called.
    pub fn sync_requests(&self) -> usize {
        self.sync_requests.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    fn request_sync(&self) {
        self.sync_requests.fetch_add(1, Ordering::SeqCst);
    }
}
