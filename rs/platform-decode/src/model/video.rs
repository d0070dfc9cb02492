use bytes::Bytes;

use super::{Rect, Size, Timestamp};

/// Video pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
	/// YUV 4:2:0 planar, with the planes stored in Y, V, U order.
	Yv12,
	/// YUV 4:2:0 planar, with the planes stored in Y, U, V order.
	I420,
}

/// A single plane of pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
	/// Raw pixel data for this plane.
	///
	/// Planes of one frame are slices of the same decoded buffer.
	pub data: Bytes,

	/// Number of bytes between rows (may include padding).
	pub stride: usize,
}

/// Decoded video, ready to be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
	pub timestamp: Timestamp,

	pub format: PixelFormat,

	pub coded_size: Size,
	pub visible_rect: Rect,
	pub natural_size: Size,

	/// The luma plane.
	pub y: Plane,
	/// The blue-difference chroma plane.
	pub u: Plane,
	/// The red-difference chroma plane.
	pub v: Plane,
}

impl VideoFrame {
	pub fn planes(&self) -> [&Plane; 3] {
		[&self.y, &self.u, &self.v]
	}
}
