use std::time::Duration;

use bytes::{Bytes, BytesMut};

use super::{ChannelLayout, Timestamp};

/// Interleaved PCM sample format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
	/// Unsigned 8-bit integer samples
	U8,
	/// Signed 16-bit integer samples (most common)
	S16,
	/// Signed 32-bit integer samples
	S32,
}

impl SampleFormat {
	/// Integer PCM formats by their size in bytes.
	pub fn from_sample_size(bytes: u32) -> Option<Self> {
		match bytes {
			1 => Some(Self::U8),
			2 => Some(Self::S16),
			4 => Some(Self::S32),
			_ => None,
		}
	}

	/// Get the size of one sample in bytes.
	pub fn sample_size(&self) -> usize {
		match self {
			Self::U8 => 1,
			Self::S16 => 2,
			Self::S32 => 4,
		}
	}
}

/// Decoded audio, ready to be played.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
	/// Presentation timestamp, assigned once the discard helper has processed the buffer.
	pub timestamp: Option<Timestamp>,

	pub format: SampleFormat,
	pub channel_layout: ChannelLayout,
	pub channels: u32,

	/// Sample rate in Hz.
	pub sample_rate: u32,

	/// Raw interleaved samples, `frames * channels * format.sample_size()` bytes.
	pub data: Bytes,
}

impl AudioBuffer {
	pub fn frame_size(&self) -> usize {
		self.format.sample_size() * self.channels as usize
	}

	/// Number of frames (samples per channel).
	pub fn frames(&self) -> usize {
		match self.frame_size() {
			0 => 0,
			size => self.data.len() / size,
		}
	}

	pub fn duration(&self) -> Duration {
		match self.sample_rate {
			0 => Duration::ZERO,
			rate => Duration::from(Timestamp::from_frames(self.frames() as u64, rate).unwrap_or(Timestamp::MAX)),
		}
	}

	/// Drop `frames` frames from the start.
	pub fn trim_start(&mut self, frames: usize) {
		let frames = frames.min(self.frames());
		let _ = self.data.split_to(frames * self.frame_size());
	}

	/// Drop `frames` frames from the end.
	pub fn trim_end(&mut self, frames: usize) {
		let keep = self.frames().saturating_sub(frames);
		self.data.truncate(keep * self.frame_size());
	}

	/// Drop the frames in `start..end`.
	pub fn trim_range(&mut self, start: usize, end: usize) {
		let frames = self.frames();
		let end = end.min(frames);
		if start >= end {
			return;
		}
		if end == frames {
			return self.trim_end(end - start);
		}
		if start == 0 {
			return self.trim_start(end);
		}

		let size = self.frame_size();
		let mut data = BytesMut::with_capacity((frames - (end - start)) * size);
		data.extend_from_slice(&self.data[..start * size]);
		data.extend_from_slice(&self.data[end * size..]);
		self.data = data.freeze();
	}

	/// Convert to one `f32` vector per channel in `[-1.0, 1.0]`.
	pub fn to_planar_f32(&self) -> Vec<Vec<f32>> {
		let channels = self.channels as usize;
		let frames = self.frames();
		let mut planes = vec![Vec::with_capacity(frames); channels];

		let size = self.format.sample_size();
		for (index, sample) in self.data.chunks_exact(size).take(frames * channels).enumerate() {
			let value = match self.format {
				SampleFormat::U8 => (sample[0] as f32 - 128.0) / 128.0,
				SampleFormat::S16 => i16::from_le_bytes([sample[0], sample[1]]) as f32 / 32768.0,
				SampleFormat::S32 => {
					i32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]) as f32 / 2147483648.0
				}
			};
			planes[index % channels].push(value);
		}

		planes
	}
}
