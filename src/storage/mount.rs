use super::{Error, KeyValueStore};
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

/// How long callers wait for a deferred mount before giving up.
pub const DEFAULT_MOUNT_TIMEOUT: Duration = Duration::from_secs(10);

/// A store whose one-time initialization runs on a background thread.
///
/// Flash filesystems can take a long time to mount (or format on first boot).
/// `Deferred` starts that work immediately and makes every store operation
/// block until it has finished, bounded by a timeout. A failed mount turns
/// every later operation into [`Error::NotInitialized`].
pub struct Deferred<S> {
    slot: Arc<Slot<S>>,
    timeout: Duration,
}

struct Slot<S> {
    result: OnceLock<Result<S, Error>>,
    lock: Mutex<()>,
    ready: Condvar,
}

impl<S: KeyValueStore + 'static> Deferred<S> {
    /// Runs `mount` on a background thread.
    pub fn spawn<F>(mount: F) -> Self
    where
        F: FnOnce() -> Result<S, Error> + Send + 'static,
    {
        let slot = Arc::new(Slot {
            result: OnceLock::new(),
            lock: Mutex::new(()),
            ready: Condvar::new(),
        });
        let worker = Arc::clone(&slot);
        let spawned = thread::Builder::new()
            .name("store-mount".into())
            .spawn(move || {
                let result = mount();
                if let Err(e) = &result {
                    log::error!("[storage] mount failed: {e}");
                }
                worker.finish(result);
            });
        if let Err(e) = spawned {
            log::error!("[storage] cannot spawn mount thread: {e}");
            slot.finish(Err(Error::NotInitialized));
        }
        Self {
            slot,
            timeout: DEFAULT_MOUNT_TIMEOUT,
        }
    }

    /// Wraps a store that is already usable.
    pub fn ready(store: S) -> Self {
        let slot = Arc::new(Slot {
            result: OnceLock::new(),
            lock: Mutex::new(()),
            ready: Condvar::new(),
        });
        slot.finish(Ok(store));
        Self {
            slot,
            timeout: DEFAULT_MOUNT_TIMEOUT,
        }
    }

    /// Overrides how long operations wait for the mount.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns `true` once the mount has finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        self.slot.result.get().is_some()
    }

    /// Blocks until the mount has finished and returns the store.
    pub fn wait(&self) -> Result<&S, Error> {
        let deadline = Instant::now() + self.timeout;
        let mut guard = self.slot.lock.lock();
        loop {
            if let Some(result) = self.slot.result.get() {
                return result.as_ref().map_err(|_| Error::NotInitialized);
            }
            if self.slot.ready.wait_until(&mut guard, deadline).timed_out() {
                return match self.slot.result.get() {
                    Some(result) => result.as_ref().map_err(|_| Error::NotInitialized),
                    None => {
                        log::warn!("[storage] mount still pending after {:?}", self.timeout);
                        Err(Error::NotInitialized)
                    }
                };
            }
        }
    }
}

impl<S> Slot<S> {
    fn finish(&self, result: Result<S, Error>) {
        let _ = self.result.set(result);
        let _guard = self.lock.lock();
        self.ready.notify_all();
    }
}

impl<S: KeyValueStore + 'static> KeyValueStore for Deferred<S> {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        self.wait()?.read(key)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), Error> {
        self.wait()?.write(key, bytes)
    }

    fn mkdir(&self, dir: &str) -> Result<(), Error> {
        self.wait()?.mkdir(dir)
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, Error> {
        self.wait()?.list(dir)
    }

    fn remove(&self, key: &str) -> Result<bool, Error> {
        self.wait()?.remove(key)
    }

    fn exists(&self, key: &str) -> bool {
        self.wait().map(|s| s.exists(key)).unwrap_or(false)
    }
}

impl<S> std::fmt::Debug for Deferred<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("settled", &self.slot.result.get().is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}
