//! Platform abstraction traits for the listrender runtime services.
//!
//! The deferred and cooperative strategies never drive themselves: they ask
//! the host for a turn and read time through these traits, which keeps the
//! core free of direct dependencies on `std` threading or timing APIs.

/// Requests execution turns from the host event loop.
///
/// Implementations must be safe to use from multiple threads, although the
/// runtime only ever calls them from the thread that drives rendering.
pub trait HostScheduler: Send + Sync {
    /// Request that the host run a turn soon (drain the microtask queue and
    /// give the priority scheduler a slice).
    fn request_turn(&self);
}

/// Provides timing information for frame budgets and task expiration.
pub trait Clock: Send + Sync {
    /// Returns a monotonic timestamp in milliseconds.
    fn now_millis(&self) -> u64;

    /// Returns the number of milliseconds elapsed since `since`.
    fn elapsed_millis(&self, since: u64) -> u64 {
        self.now_millis().saturating_sub(since)
    }
}
