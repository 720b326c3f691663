//! Time source for timestamps and expiry checks.
//!
//! Timestamps are Unix seconds. Business code never calls the system clock
//! directly; it asks a [`Clock`] so tests can move time forward.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub trait Clock: Send + Sync {
	/// Current Unix timestamp in seconds.
	fn now(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> u64 {
		u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
	}
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
	now: AtomicU64,
}

impl ManualClock {
	pub fn new(start: u64) -> Self {
		Self {
			now: AtomicU64::new(start),
		}
	}

	pub fn set(&self, now: u64) {
		self.now.store(now, Ordering::SeqCst);
	}

	pub fn advance(&self, by: Duration) {
		self.now.fetch_add(by.as_secs(), Ordering::SeqCst);
	}
}

impl Clock for ManualClock {
	fn now(&self) -> u64 {
		self.now.load(Ordering::SeqCst)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_manual_clock_advances() {
		let clock = ManualClock::new(100);
		clock.advance(Duration::from_secs(60));
		assert_eq!(clock.now(), 160);
		clock.set(5);
		assert_eq!(clock.now(), 5);
	}

	#[test]
	fn test_system_clock_is_after_2020() {
		assert!(SystemClock.now() > 1_577_836_800);
	}
}
