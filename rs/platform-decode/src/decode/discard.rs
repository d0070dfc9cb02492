use std::time::Duration;

use crate::{AudioBuffer, Padding, TimeInfo, Timestamp};

/// Assigns timestamps to decoded audio and trims encoder priming and padding.
///
/// Decoded buffers are paired one-to-one with the timing of the input that produced them.
/// Output timestamps are derived from the first input timestamp plus the number of frames emitted since,
/// so they stay contiguous even when the codec delays or splits output.
#[derive(Debug)]
pub struct DiscardHelper {
	sample_rate: u32,

	// Frames of latency introduced by the decoder; discards for an input land this much later in the output.
	decoder_delay: usize,

	// Frames still to be dropped from the front of upcoming output.
	discard_frames: usize,

	// End discard of the previous input which, due to decoder delay, shows up in the current output.
	delayed_end_discard: usize,

	last_input_timestamp: Option<Timestamp>,

	// The timestamp of the first output and the frames emitted since.
	base: Option<Timestamp>,
	frames: u64,
}

impl DiscardHelper {
	pub fn new(sample_rate: u32, decoder_delay: usize) -> Self {
		Self {
			sample_rate,
			decoder_delay,
			discard_frames: 0,
			delayed_end_discard: 0,
			last_input_timestamp: None,
			base: None,
			frames: 0,
		}
	}

	/// Forget all timing and start dropping `initial_discard` frames again.
	pub fn reset(&mut self, initial_discard: usize) {
		self.discard_frames = initial_discard;
		self.delayed_end_discard = 0;
		self.last_input_timestamp = None;
		self.base = None;
		self.frames = 0;
	}

	pub fn is_initialized(&self) -> bool {
		self.base.is_some()
	}

	fn duration_to_frames(&self, duration: Duration) -> usize {
		let frames = duration.as_secs_f64() * self.sample_rate as f64;
		frames.round() as usize
	}

	fn current_timestamp(&self) -> Timestamp {
		let base = self.base.unwrap_or_default();
		let offset = Timestamp::from_frames(self.frames, self.sample_rate).unwrap_or(Timestamp::MAX);
		base.checked_add(offset).unwrap_or(Timestamp::MAX)
	}

	/// Process one decoded buffer along with the timing of its input.
	///
	/// Returns `None` when the whole buffer was discarded.
	pub fn process(&mut self, timing: &TimeInfo, mut buffer: AudioBuffer) -> Option<AudioBuffer> {
		if let Some(last) = self.last_input_timestamp {
			if timing.timestamp < last {
				tracing::warn!(last = %last, current = %timing.timestamp, "input timestamps are not monotonic");
			}
		}
		self.last_input_timestamp = Some(timing.timestamp);

		if self.base.is_none() {
			self.base = Some(timing.timestamp);
			self.frames = 0;
		}

		let original_frames = buffer.frames();

		// Priming carried over from a reset or a previous end discard.
		if self.discard_frames > 0 {
			let decoded_frames = buffer.frames();
			let discard = self.discard_frames.min(decoded_frames);
			self.discard_frames -= discard;

			tracing::trace!(discard, decoded_frames, "initial discard");

			if discard == decoded_frames {
				return None;
			}
			buffer.trim_start(discard);
		}

		if self.delayed_end_discard > 0 {
			let decoded_frames = buffer.frames();
			let end = self.decoder_delay.min(decoded_frames);
			let start = end.saturating_sub(self.delayed_end_discard);
			self.delayed_end_discard = 0;

			if start >= decoded_frames {
				tracing::warn!(start, decoded_frames, "delayed end discard outside of the buffer");
				return None;
			}
			buffer.trim_range(start, end);
		}

		let padding = timing.discard_padding;

		if !padding.front.is_none() {
			let decoded_frames = buffer.frames();

			let front_frames = match padding.front {
				Padding::Infinite if self.decoder_delay > 0 => {
					self.duration_to_frames(timing.duration.unwrap_or_default())
				}
				Padding::Infinite => decoded_frames,
				Padding::Duration(duration) => self.duration_to_frames(duration),
				Padding::None => 0,
			};

			// The output for this input lands `decoder_delay` frames later, minus anything already trimmed.
			let already_discarded = original_frames - decoded_frames;
			let discard_start = self.decoder_delay.saturating_sub(already_discarded);

			if discard_start >= decoded_frames {
				tracing::warn!(discard_start, decoded_frames, "front discard starts outside of the buffer");
				return None;
			}

			let discard = front_frames.min(decoded_frames - discard_start);
			self.discard_frames = front_frames - discard;

			if discard == decoded_frames {
				return None;
			}
			buffer.trim_range(discard_start, discard_start + discard);
		}

		if !padding.back.is_zero() {
			let decoded_frames = buffer.frames();
			let mut end_frames = self.duration_to_frames(padding.back);

			if self.decoder_delay > 0 {
				if end_frames >= self.decoder_delay {
					// Trim what we can here, and the decoder delay's worth from the next buffer.
					self.discard_frames = self.decoder_delay;
					end_frames -= self.decoder_delay;
				} else {
					self.delayed_end_discard = end_frames;
					end_frames = 0;
				}
			}

			if end_frames > decoded_frames {
				tracing::warn!(end_frames, decoded_frames, "invalid end discard padding");
				return None;
			}

			if end_frames == decoded_frames {
				return None;
			}
			buffer.trim_end(end_frames);
		}

		buffer.timestamp = Some(self.current_timestamp());
		self.frames += buffer.frames() as u64;

		Some(buffer)
	}
}
