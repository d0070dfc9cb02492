use bytes::BytesMut;

use super::TransformError;
use crate::{InputUnit, Timestamp};

/// Platforms express alignment as a byte count; anything below 2 means unaligned.
fn alignment(align: usize) -> usize {
	align.max(1).next_power_of_two()
}

/// A fixed capacity memory buffer with a current length, aligned as the transform requires.
pub struct MediaBuffer {
	// Always `max_len` bytes long, starting at an aligned address.
	data: BytesMut,
	len: usize,
}

impl MediaBuffer {
	pub fn aligned(max_len: usize, align: usize) -> Self {
		let align = alignment(align);

		let mut raw = BytesMut::zeroed(max_len + align - 1);
		let offset = raw.as_ptr().align_offset(align);

		let mut data = raw.split_off(offset);
		data.truncate(max_len);

		Self { data, len: 0 }
	}

	pub fn max_len(&self) -> usize {
		self.data.len()
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	pub fn set_len(&mut self, len: usize) -> Result<(), TransformError> {
		if len > self.max_len() {
			return Err(TransformError::BufferTooSmall);
		}
		self.len = len;
		Ok(())
	}

	/// The valid bytes.
	pub fn data(&self) -> &[u8] {
		&self.data[..self.len]
	}

	/// The whole buffer, for the writer to fill before calling [Self::set_len].
	pub fn data_mut(&mut self) -> &mut [u8] {
		&mut self.data[..]
	}

	pub fn as_ptr(&self) -> *const u8 {
		self.data.as_ptr()
	}
}

impl std::fmt::Debug for MediaBuffer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MediaBuffer")
			.field("len", &self.len)
			.field("max_len", &self.max_len())
			.finish()
	}
}

/// A unit of media exchanged with a transform.
#[derive(Debug)]
pub struct Sample {
	pub buffer: MediaBuffer,

	/// Presentation time in hundreds of nanoseconds.
	pub time: Option<i64>,
}

impl Sample {
	/// An empty sample with room for `size` bytes.
	pub fn allocate(size: usize, align: usize) -> Self {
		Self {
			buffer: MediaBuffer::aligned(size, align),
			time: None,
		}
	}

	/// Copy an input unit into a sample the transform can consume.
	pub fn from_input(input: &InputUnit, align: usize) -> Result<Self, TransformError> {
		let mut sample = Self::allocate(input.payload.len(), align);
		sample.buffer.data_mut().copy_from_slice(&input.payload);
		sample.buffer.set_len(input.payload.len())?;
		sample.time = Some(input.timestamp().as_ticks().map_err(|_| TransformError::Unexpected)?);
		Ok(sample)
	}

	/// Copy raw bytes into a new sample, used by transforms that allocate their own output.
	pub fn copy_from(data: &[u8], time: Option<i64>) -> Self {
		let mut sample = Self::allocate(data.len(), 1);
		sample.buffer.data_mut().copy_from_slice(data);
		sample.buffer.len = data.len();
		sample.time = time;
		sample
	}

	pub fn timestamp(&self) -> Timestamp {
		Timestamp::from_ticks(self.time.unwrap_or_default())
	}

	pub fn data(&self) -> &[u8] {
		self.buffer.data()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_buffer_alignment() {
		for align in [0, 1, 16, 64, 4096] {
			let buffer = MediaBuffer::aligned(100, align);
			assert_eq!(buffer.max_len(), 100);
			assert_eq!(buffer.as_ptr() as usize % alignment(align), 0);
		}
	}

	#[test]
	fn test_odd_alignment_rounds_up() {
		assert_eq!(alignment(0), 1);
		assert_eq!(alignment(12), 16);
	}

	#[test]
	fn test_set_len_bounds() {
		let mut buffer = MediaBuffer::aligned(8, 16);
		assert!(buffer.is_empty());
		buffer.set_len(8).unwrap();
		assert_eq!(buffer.len(), 8);
		assert_eq!(buffer.set_len(9), Err(TransformError::BufferTooSmall));
	}

	#[test]
	fn test_from_input() {
		let input = InputUnit::new(vec![1u8, 2, 3], Timestamp::from_millis(2).unwrap());
		let sample = Sample::from_input(&input, 16).unwrap();
		assert_eq!(sample.data(), &[1, 2, 3]);
		assert_eq!(sample.time, Some(20_000));
		assert_eq!(sample.timestamp(), input.timestamp());
	}
}
