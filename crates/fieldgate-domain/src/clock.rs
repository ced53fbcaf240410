use crate::ports::Clock;
use std::time::{SystemTime, UNIX_EPOCH};

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs() as i64,
            // Pre-epoch clocks only occur on badly misconfigured hosts;
            // freshness checks will reject everything until realignment.
            Err(err) => -(err.duration().as_secs() as i64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_past_2020() {
        let now = SystemClock.now_epoch_secs();
        assert!(now > 1_577_836_800); // 2020-01-01
    }
}
