//! Monotonic acquisition clock.
//!
//! Producers that do not supply their own timestamp are stamped with the
//! number of seconds elapsed since the first call in this process. The
//! anchor is process-local; absolute wall time never enters the buffer.

use std::sync::OnceLock;
use std::time::Instant;

static ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Seconds since the process-local monotonic anchor.
pub fn now_seconds() -> f64 {
    ANCHOR.get_or_init(Instant::now).elapsed().as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_seconds_is_monotonic() {
        let a = now_seconds();
        let b = now_seconds();
        assert!(b >= a);
        assert!(a >= 0.0);
    }
}
