//! Wall-clock time source.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::Timestamp;
use crate::ports::TimeSource;

/// Seconds since the Unix epoch from the system clock.
///
/// A clock set before 1970 reads as zero, which every caller treats as
/// "implausible" and sanitizes.
///
/// ```rust
/// use qc_addrman::adapters::SystemTimeSource;
/// use qc_addrman::ports::TimeSource;
///
/// assert!(SystemTimeSource.now().as_secs() > 0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        Timestamp::new(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MIN_TIMESTAMP;

    #[test]
    fn test_system_clock_is_plausible() {
        let first = SystemTimeSource::new().now();
        assert!(first.as_secs() > MIN_TIMESTAMP);
        assert!(SystemTimeSource::new().now() >= first);
    }
}
