//! System utilities for the client stack.
//!
//! This module provides the system-level services the network protocols lean
//! on but do not own. Today that is wall-clock time: cookie expiry and the RPC
//! passphrase derivation are both time-derived, and a freshly booted device
//! has no valid time until an NTP exchange completes.
//!
//! # Available Utilities
//!
//! - **[`clock`]**: the [`Clock`](clock::Clock) abstraction, a system clock,
//!   a manually driven clock for tests, and the bounded wait for time sync
//!
//! # Usage
//!
//! ```rust
//! use carmeleon_client::system::clock::{Clock, ManualClock, is_synchronized};
//!
//! let clock = ManualClock::new(0);
//! assert!(!is_synchronized(clock.now()));
//!
//! clock.set(1_700_000_000);
//! assert!(is_synchronized(clock.now()));
//! ```

/// Wall-clock time and time synchronization.
pub mod clock;
