//! # snapshot
//!
//! Keeping a client's view of the service list consistent across refreshes.
//!
//! ## Core Concepts
//!
//! - **OfflineReconciler**: counts consecutive discovery failures and serves
//!   the last good snapshot once the service manager looks unreachable
//! - **merge**: diffs two snapshots so unchanged services keep their
//!   identity (`Arc::ptr_eq`)
//! - **MetadataCache**: bounded LRU for lazily fetched detail with at most
//!   one fetch in flight per id
//! - **RefreshScheduler**: auto-refresh and reconnect timers that are torn
//!   down and recreated when their inputs change

pub mod cache;
pub mod diff;
pub mod offline;
pub mod timers;

pub use cache::{DEFAULT_CAPACITY, FetchOutcome, MetadataCache};
pub use diff::{Keyed, MergeOutcome, merge};
pub use offline::{
    DEFAULT_FAILURE_THRESHOLD, OfflineReconciler, OfflineState, RefreshOutcome, Transition,
};
pub use timers::{
    ActivityTracker, AdaptiveInterval, DEFAULT_RECONNECT_INTERVAL, RefreshScheduler, Tick,
    TimerHandle,
};
