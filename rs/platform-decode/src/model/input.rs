use std::time::Duration;

use bytes::Bytes;

use super::Timestamp;

/// Frames to drop from the front and back of the decoded output of one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscardPadding {
	pub front: Padding,
	pub back: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Padding {
	#[default]
	None,
	Duration(Duration),
	/// Discard everything decoded from this input.
	Infinite,
}

impl Padding {
	pub fn is_none(&self) -> bool {
		matches!(self, Self::None) || matches!(self, Self::Duration(d) if d.is_zero())
	}
}

/// The timing of an input unit, kept after the payload has been handed to the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeInfo {
	pub timestamp: Timestamp,
	pub duration: Option<Duration>,
	pub discard_padding: DiscardPadding,
}

/// A compressed buffer submitted to a decoder.
#[derive(Clone, PartialEq, Eq)]
pub struct InputUnit {
	pub payload: Bytes,
	pub timing: TimeInfo,
	pub end_of_stream: bool,
}

impl InputUnit {
	pub fn new(payload: impl Into<Bytes>, timestamp: Timestamp) -> Self {
		Self {
			payload: payload.into(),
			timing: TimeInfo {
				timestamp,
				..Default::default()
			},
			end_of_stream: false,
		}
	}

	/// The marker that ends a stream and drains the decoder.
	pub fn end_of_stream() -> Self {
		Self {
			payload: Bytes::new(),
			timing: TimeInfo::default(),
			end_of_stream: true,
		}
	}

	pub fn with_duration(mut self, duration: Duration) -> Self {
		self.timing.duration = Some(duration);
		self
	}

	pub fn with_discard_padding(mut self, padding: DiscardPadding) -> Self {
		self.timing.discard_padding = padding;
		self
	}

	pub fn timestamp(&self) -> Timestamp {
		self.timing.timestamp
	}
}

impl std::fmt::Debug for InputUnit {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.end_of_stream {
			return f.write_str("InputUnit(EOS)");
		}

		f.debug_struct("InputUnit")
			.field("timestamp", &self.timing.timestamp)
			.field("size", &self.payload.len())
			.finish()
	}
}
