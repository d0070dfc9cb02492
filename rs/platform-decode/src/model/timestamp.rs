use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timestamp overflow")]
pub struct TimestampOverflow;

/// Number of 100ns ticks in a microsecond, the unit platform transforms use for sample times.
const TICKS_PER_MICRO: i64 = 10;

/// A timestamp representing the presentation time of a media sample in microseconds.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
	/// The maximum representable timestamp.
	pub const MAX: Self = Self(u64::MAX);

	/// The zero timestamp.
	pub const ZERO: Self = Self(0);

	pub const fn from_secs(seconds: u64) -> Result<Self, TimestampOverflow> {
		match seconds.checked_mul(1_000_000) {
			Some(micros) => Ok(Self(micros)),
			None => Err(TimestampOverflow),
		}
	}

	pub const fn from_millis(millis: u64) -> Result<Self, TimestampOverflow> {
		match millis.checked_mul(1000) {
			Some(micros) => Ok(Self(micros)),
			None => Err(TimestampOverflow),
		}
	}

	pub const fn from_micros(micros: u64) -> Self {
		Self(micros)
	}

	/// Convert a platform sample time, expressed in hundreds of nanoseconds.
	///
	/// Negative sample times are clamped to zero.
	pub const fn from_ticks(ticks: i64) -> Self {
		if ticks <= 0 {
			return Self::ZERO;
		}
		Self((ticks / TICKS_PER_MICRO) as u64)
	}

	/// The timestamp of `frames` audio frames at `sample_rate`, rounded to the nearest microsecond.
	pub fn from_frames(frames: u64, sample_rate: u32) -> Result<Self, TimestampOverflow> {
		if sample_rate == 0 {
			return Err(TimestampOverflow);
		}
		let rate = sample_rate as u128;
		let micros = (frames as u128 * 1_000_000 + rate / 2) / rate;
		u64::try_from(micros).map(Self).map_err(|_| TimestampOverflow)
	}

	/// Get the timestamp as a platform sample time in hundreds of nanoseconds.
	pub fn as_ticks(self) -> Result<i64, TimestampOverflow> {
		i64::try_from(self.0)
			.ok()
			.and_then(|micros| micros.checked_mul(TICKS_PER_MICRO))
			.ok_or(TimestampOverflow)
	}

	/// Get the timestamp as microseconds.
	pub const fn as_micros(self) -> u64 {
		self.0
	}

	/// Get the timestamp as milliseconds.
	pub const fn as_millis(self) -> u64 {
		self.0 / 1000
	}

	/// Get the timestamp as seconds.
	pub const fn as_secs(self) -> u64 {
		self.0 / 1_000_000
	}

	/// Get the maximum of two timestamps.
	pub fn max(self, other: Self) -> Self {
		Self(self.0.max(other.0))
	}

	pub fn checked_add(self, rhs: Self) -> Option<Self> {
		self.0.checked_add(rhs.0).map(Self)
	}

	pub fn checked_sub(self, rhs: Self) -> Option<Self> {
		self.0.checked_sub(rhs.0).map(Self)
	}
}

impl TryFrom<Duration> for Timestamp {
	type Error = TimestampOverflow;

	fn try_from(duration: Duration) -> Result<Self, Self::Error> {
		Ok(Self(duration.as_micros().try_into().map_err(|_| TimestampOverflow)?))
	}
}

impl From<Timestamp> for Duration {
	fn from(timestamp: Timestamp) -> Self {
		Duration::from_micros(timestamp.0)
	}
}

impl std::fmt::Debug for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}µs", self.0)
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}µs", self.0)
	}
}

impl std::ops::Add<Duration> for Timestamp {
	type Output = Self;

	fn add(self, rhs: Duration) -> Self {
		let rhs = Timestamp::try_from(rhs).expect("timestamp overflow");
		self.checked_add(rhs).expect("timestamp overflow")
	}
}

impl std::ops::Sub for Timestamp {
	type Output = Duration;

	fn sub(self, rhs: Self) -> Duration {
		Duration::from_micros(self.0.checked_sub(rhs.0).expect("timestamp underflow"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_ticks_round_trip() {
		let ts = Timestamp::from_millis(40).unwrap();
		assert_eq!(ts.as_ticks().unwrap(), 400_000);
		assert_eq!(Timestamp::from_ticks(400_000), ts);
	}

	#[test]
	fn test_negative_ticks_clamp() {
		assert_eq!(Timestamp::from_ticks(-5), Timestamp::ZERO);
	}

	#[test]
	fn test_ticks_overflow() {
		assert_eq!(Timestamp::MAX.as_ticks(), Err(TimestampOverflow));
	}

	#[test]
	fn test_from_frames() {
		// One AAC frame at 44.1kHz.
		let ts = Timestamp::from_frames(1024, 44_100).unwrap();
		assert_eq!(ts.as_micros(), 23_220);

		assert_eq!(Timestamp::from_frames(48_000, 48_000).unwrap().as_secs(), 1);
		assert_eq!(Timestamp::from_frames(1, 0), Err(TimestampOverflow));
	}

	#[test]
	fn test_duration_arithmetic() {
		let a = Timestamp::from_millis(10).unwrap();
		let b = a + Duration::from_millis(5);
		assert_eq!(b.as_millis(), 15);
		assert_eq!(b - a, Duration::from_millis(5));
	}
}
