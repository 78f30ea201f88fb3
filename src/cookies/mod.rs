//! # Persistent cookie jar
//!
//! Cookies are stored per host in one JSON file each, under [`COOKIE_DIR`]:
//!
//! ```text
//! /cookies/example.com.json
//! [{"name":"sid","value":"abc","expire":1893456000,"domain":"example.com","path":"/"}]
//! ```
//!
//! `expire` is an absolute Unix time in seconds; `0` marks a session cookie
//! that never expires by time. Expired records are not swept proactively:
//! they are dropped the next time the file for their host is read or written.
//!
//! Every read-modify-write of a host file runs under a per-host lock, so
//! engines on different threads can share one jar.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use carmeleon_client::cookies::CookieJar;
//! use carmeleon_client::storage::MemoryStore;
//! use carmeleon_client::system::clock::ManualClock;
//!
//! let clock = ManualClock::new(1_700_000_000);
//! let jar = CookieJar::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()));
//!
//! jar.process_set_cookie("sid=abc; Max-Age=60", "example.com");
//! assert_eq!(jar.valid_cookie_header("example.com"), "sid=abc");
//!
//! clock.advance(61);
//! assert_eq!(jar.valid_cookie_header("example.com"), "");
//! ```

mod parse;

pub use parse::{SetCookie, parse_http_date, parse_set_cookie};

use crate::storage::{self, KeyValueStore};
use crate::system::clock::{Clock, is_synchronized};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Directory holding one cookie file per host.
pub const COOKIE_DIR: &str = "/cookies";

/// Most records kept per host; further cookies are not added.
pub const MAX_COOKIES: usize = 20;

/// Lifetime in seconds given to [`CookieJar::set_cookie`] calls without an
/// explicit expiry.
pub const DEFAULT_COOKIE_LIFETIME: i64 = 30 * 24 * 3600;

/// One stored cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Absolute expiry in Unix seconds, `0` for a session cookie.
    pub expire: i64,
    /// Host the cookie belongs to.
    #[serde(default)]
    pub domain: String,
    /// Always `/`.
    #[serde(default = "root_path")]
    pub path: String,
}

fn root_path() -> String {
    "/".into()
}

impl Cookie {
    /// Whether the cookie has a real expiry that lies before `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expire > 0 && self.expire < now
    }
}

/// Lenient on-disk shape: records missing `name` or `expire` are dropped.
#[derive(Deserialize)]
struct StoredCookie {
    name: Option<String>,
    #[serde(default)]
    value: Option<String>,
    expire: Option<i64>,
    #[serde(default)]
    domain: Option<String>,
}

type CookieSet = heapless::Vec<Cookie, MAX_COOKIES>;

/// Per-host persisted cookie storage.
pub struct CookieJar {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl core::fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CookieJar")
            .field("hosts_locked", &self.locks.lock().len())
            .finish_non_exhaustive()
    }
}

/// Store key for the cookie file of `host`. Port separators are replaced so
/// they cannot be confused with path separators.
pub fn cookie_file(host: &str) -> String {
    let sanitized: String = host
        .chars()
        .map(|c| if c == ':' || c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{COOKIE_DIR}/{sanitized}.json")
}

impl CookieJar {
    /// Creates a jar persisting into `store` and reading time from `clock`.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The clock the jar judges expiry against.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Locks are keyed by cookie file, so `h:8080` and `h_8080` share one.
    fn host_lock(&self, host: &str) -> Arc<Mutex<()>> {
        self.file_lock(&cookie_file(host))
    }

    fn file_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Loads the set for `host`. The flag reports whether malformed records
    /// were dropped.
    fn load(&self, host: &str) -> (CookieSet, bool) {
        let mut set = CookieSet::new();
        let key = cookie_file(host);
        let bytes = match self.store.read(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return (set, false),
            Err(e) => {
                log::error!("[cookie] reading {key} failed: {e}");
                return (set, false);
            }
        };
        let records: Vec<serde_json::Value> = match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(e) => {
                log::warn!("[cookie] {key} is not a JSON array ({e}), starting over");
                return (set, true);
            }
        };

        let mut dropped = false;
        for record in records {
            let Ok(StoredCookie {
                name: Some(name),
                value,
                expire: Some(expire),
                domain,
            }) = serde_json::from_value::<StoredCookie>(record)
            else {
                dropped = true;
                continue;
            };
            let cookie = Cookie {
                name,
                value: value.unwrap_or_default(),
                expire,
                domain: domain.unwrap_or_else(|| host.to_owned()),
                path: root_path(),
            };
            if set.push(cookie).is_err() {
                dropped = true;
            }
        }
        (set, dropped)
    }

    fn save(&self, host: &str, set: &CookieSet) -> Result<(), storage::Error> {
        let key = cookie_file(host);
        let json = serde_json::to_vec(set).map_err(|_| storage::Error::WriteError)?;
        self.store.mkdir(COOKIE_DIR)?;
        self.store.write(&key, &json).inspect_err(|e| {
            log::error!("[cookie] writing {key} failed: {e}");
        })
    }

    /// Drops expired records, returning whether anything was removed.
    fn prune(set: &mut CookieSet, now: i64) -> bool {
        let before = set.len();
        set.retain(|c| {
            let expired = c.is_expired(now);
            if expired {
                log::debug!("[cookie] {} expired at {} (now {now})", c.name, c.expire);
            }
            !expired
        });
        set.len() != before
    }

    /// Builds the `Cookie` request header value for `host`.
    ///
    /// Expired records are pruned and the pruned set is written back. Returns
    /// an empty string when there is nothing to send.
    pub fn valid_cookie_header(&self, host: &str) -> String {
        let lock = self.host_lock(host);
        let _guard = lock.lock();

        let (mut set, dropped) = self.load(host);
        let pruned = Self::prune(&mut set, self.clock.now());
        if dropped || pruned {
            let _ = self.save(host, &set);
        }

        set.iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Records one `Set-Cookie` header received from `host`.
    ///
    /// Cookies are not stored while the clock is unsynchronized, because their
    /// expiry would be computed from a bogus time.
    pub fn process_set_cookie(&self, raw: &str, host: &str) {
        let now = self.clock.now();
        if !is_synchronized(now) {
            log::warn!("[cookie] clock not synchronized, skipping Set-Cookie from {host}");
            return;
        }
        let Some(parsed) = parse_set_cookie(raw) else {
            log::warn!("[cookie] ignoring malformed Set-Cookie from {host}");
            return;
        };
        let expire = parsed.expire_at(now);

        let lock = self.host_lock(host);
        let _guard = lock.lock();
        let (mut set, _) = self.load(host);
        Self::prune(&mut set, now);

        if expire > 0 && expire < now {
            set.retain(|c| c.name != parsed.name);
        } else {
            Self::upsert(&mut set, host, parsed.name, parsed.value, expire);
        }
        let _ = self.save(host, &set);
    }

    fn upsert(set: &mut CookieSet, domain: &str, name: &str, value: &str, expire: i64) {
        if let Some(existing) = set.iter_mut().find(|c| c.name == name) {
            existing.value = value.to_owned();
            existing.expire = expire;
            return;
        }
        let cookie = Cookie {
            name: name.to_owned(),
            value: value.to_owned(),
            expire,
            domain: domain.to_owned(),
            path: root_path(),
        };
        if set.push(cookie).is_err() {
            log::warn!("[cookie] {domain} already holds {MAX_COOKIES} cookies, dropping {name}");
        }
    }

    /// The value of cookie `name` for `domain`, if present and unexpired.
    pub fn get_cookie(&self, domain: &str, name: &str) -> Option<String> {
        let lock = self.host_lock(domain);
        let _guard = lock.lock();
        let now = self.clock.now();
        let (set, _) = self.load(domain);
        set.into_iter()
            .find(|c| c.name == name && !c.is_expired(now))
            .map(|c| c.value)
    }

    /// Stores a cookie directly.
    ///
    /// `expire` is an absolute Unix time; `None` (or `Some(0)`) means
    /// [`DEFAULT_COOKIE_LIFETIME`] from now.
    pub fn set_cookie(
        &self,
        domain: &str,
        name: &str,
        value: &str,
        expire: Option<i64>,
    ) -> Result<(), storage::Error> {
        let now = self.clock.now();
        if !is_synchronized(now) {
            log::warn!("[cookie] clock not synchronized, expiry of {name} may be wrong");
        }
        let expire = match expire {
            Some(at) if at != 0 => at,
            _ => now + DEFAULT_COOKIE_LIFETIME,
        };

        let lock = self.host_lock(domain);
        let _guard = lock.lock();
        let (mut set, _) = self.load(domain);
        Self::prune(&mut set, now);
        Self::upsert(&mut set, domain, name, value, expire);
        self.save(domain, &set)
    }

    /// Removes cookie `name` for `domain`. Returns whether it existed.
    pub fn remove_cookie(&self, domain: &str, name: &str) -> Result<bool, storage::Error> {
        let lock = self.host_lock(domain);
        let _guard = lock.lock();
        let (mut set, _) = self.load(domain);
        let before = set.len();
        set.retain(|c| c.name != name);
        if set.len() == before {
            return Ok(false);
        }
        self.save(domain, &set)?;
        log::info!("[cookie] removed {name} for {domain}");
        Ok(true)
    }

    /// Deletes every cookie file.
    ///
    /// Each file is removed under its host lock. Locks nobody else holds are
    /// released afterwards.
    pub fn clear_all(&self) -> Result<(), storage::Error> {
        let result = self.remove_files();
        self.locks.lock().retain(|_, lock| Arc::strong_count(lock) > 1);
        result
    }

    fn remove_files(&self) -> Result<(), storage::Error> {
        for file in self.store.list(COOKIE_DIR)? {
            let key = format!("{COOKIE_DIR}/{file}");
            let lock = self.file_lock(&key);
            let _guard = lock.lock();
            match self.store.remove(&key) {
                Ok(_) => log::info!("[cookie] deleted {file}"),
                Err(e) => {
                    log::error!("[cookie] deleting {file} failed: {e}");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Every stored cookie, expired or not, paired with the file it came from.
    pub fn list_all(&self) -> Vec<(String, Cookie)> {
        let files = match self.store.list(COOKIE_DIR) {
            Ok(files) => files,
            Err(e) => {
                log::error!("[cookie] listing {COOKIE_DIR} failed: {e}");
                return Vec::new();
            }
        };
        let mut all = Vec::new();
        for file in files {
            let Some(host) = file.strip_suffix(".json") else {
                continue;
            };
            let lock = self.host_lock(host);
            let _guard = lock.lock();
            let (set, _) = self.load(host);
            all.extend(set.into_iter().map(|c| (host.to_owned(), c)));
        }
        all
    }
}
