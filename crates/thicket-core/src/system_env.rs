//! [`Environment`] backed by the operating system.

use std::time::Duration;

use crate::env::Environment;

/// The real clock, the tokio timer and the OS RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. Without working randomness no stream number,
/// file name or relay token can be generated safely.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// The system environment.
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }

    fn wall_clock_secs(&self) -> u64 {
        // A clock before 1970 is treated as the epoch
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use thicket_crypto::DEFAULT_ROTATION_PERIOD_LENGTH;

    use super::*;

    #[test]
    fn monotonic_clock_never_goes_back() {
        let env = SystemEnv::new();
        let earlier = env.now();
        assert!(env.now() >= earlier);
    }

    #[test]
    fn random_values_differ() {
        let env = SystemEnv::new();
        assert_ne!(env.random_u64(), env.random_u64());
    }

    #[test]
    fn current_period_matches_wall_clock() {
        let env = SystemEnv::new();
        let secs = env.wall_clock_secs();
        assert!(secs > 1_577_836_800);

        let period = env.rotation_period(DEFAULT_ROTATION_PERIOD_LENGTH).unwrap();
        let expected = secs / DEFAULT_ROTATION_PERIOD_LENGTH.as_secs();
        assert!(period.get() == expected || period.get() == expected + 1);
    }

    #[tokio::test]
    async fn sleep_waits_at_least_the_backoff() {
        let env = SystemEnv::new();
        let start = env.now();
        env.sleep(Duration::from_millis(15)).await;
        assert!(env.now() - start >= Duration::from_millis(15));
    }
}
