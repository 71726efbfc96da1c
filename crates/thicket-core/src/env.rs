//! Environment abstraction for deterministic testing.
//!
//! Keeps key management and transports off the real clock and RNG. Tests
//! substitute a fixed clock and seeded bytes; production
//! uses [`crate::SystemEnv`].

use std::time::Duration;

use thicket_crypto::{CryptoError, RotationPeriod};

/// Clock, entropy and timer used by key management and transports.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type used by this environment.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only used by driver code (polling loops, retry backoff), never by
    /// key derivation.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Seconds since the Unix epoch. Drives the global rotation period.
    fn wall_clock_secs(&self) -> u64;

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Rotation period containing the current wall-clock time.
    ///
    /// # Errors
    ///
    /// - `ZeroPeriodLength` if `period_length` is shorter than one second
    fn rotation_period(&self, period_length: Duration) -> Result<RotationPeriod, CryptoError> {
        RotationPeriod::from_unix_secs(self.wall_clock_secs(), period_length)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use thicket_crypto::DEFAULT_ROTATION_PERIOD_LENGTH;

    use super::*;

    #[derive(Clone)]
    struct FixedEnv {
        unix_secs: u64,
    }

    impl Environment for FixedEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            Instant::now()
        }

        async fn sleep(&self, _duration: Duration) {}

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0xA5);
        }

        fn wall_clock_secs(&self) -> u64 {
            self.unix_secs
        }
    }

    #[test]
    fn rotation_period_from_wall_clock() {
        let env = FixedEnv { unix_secs: 3 * 86_400 + 17 };
        assert_eq!(
            env.rotation_period(DEFAULT_ROTATION_PERIOD_LENGTH).unwrap(),
            RotationPeriod::new(3)
        );
    }

    #[test]
    fn random_u64_uses_random_bytes() {
        let env = FixedEnv { unix_secs: 0 };
        assert_eq!(env.random_u64(), 0xA5A5_A5A5_A5A5_A5A5);
    }
}
