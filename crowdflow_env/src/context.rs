//! Core environment context trait for CrowdFlow services.

use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, SystemTime};

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that the CrowdFlow core can run
/// in both production (tokio) and simulation (virtual clock) environments.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, OS entropy
/// - **Simulation**: `SimContext` - virtual clock, `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// Every timestamp the core stores (presence updates, join times,
/// reservations) comes from `now()`, and every random tie-break draws from
/// an RNG handed out by `derive_rng()`. A simulation seeded with the same
/// value therefore replays identically.
#[async_trait]
pub trait CrowdContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Presence TTLs, reservation TTLs and the new-arrival window are all
    /// measured against this clock.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time for report timestamps.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);

    /// Derives a random number generator from a seed extension.
    ///
    /// The implementation combines the global seed with `seed_extension`
    /// so that independent consumers (recommendation tie-break, crowd
    /// movement, GPS noise) get reproducible but uncorrelated streams.
    fn derive_rng(&self, seed_extension: u64) -> ChaCha8Rng;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
