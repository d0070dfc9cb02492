use anyhow::Context;
use ffmpeg_next as ffmpeg;

use super::{context, is_again, platform_error};
use crate::Size;
use crate::decode::Yv12Layout;
use crate::transform::*;

/// H.264 to planar 4:2:0, written into a caller provided sample.
///
/// The planes are padded to the 16-aligned layout of [Yv12Layout].
pub struct FfmpegVideo {
	decoder: Option<ffmpeg::decoder::Video>,
	input: Option<VideoType>,
	output: Option<VideoType>,

	// The size of the most recently decoded frame, if it differs from the input type.
	decoded: Option<Size>,

	stashed: Option<ffmpeg::frame::Video>,
	draining: bool,
}

impl FfmpegVideo {
	pub fn new() -> Self {
		Self {
			decoder: None,
			input: None,
			output: None,
			decoded: None,
			stashed: None,
			draining: false,
		}
	}

	fn open() -> anyhow::Result<ffmpeg::decoder::Video> {
		// Annex B streams carry SPS/PPS in band.
		let context = context(CodecId::H264, None)?;
		let decoder = context.decoder().video().context("failed to open h264 decoder")?;
		Ok(decoder)
	}

	fn current_size(&self) -> Option<Size> {
		self.decoded.or_else(|| self.input.as_ref()?.frame_size)
	}

	/// Every output is written in the layout of the configured size, whatever size is decoded.
	fn layout(&self) -> Option<Yv12Layout> {
		Some(Yv12Layout::new(self.input.as_ref()?.frame_size?))
	}

	fn receive(&mut self) -> Result<Option<ffmpeg::frame::Video>, TransformError> {
		if let Some(frame) = self.stashed.take() {
			return Ok(Some(frame));
		}

		let decoder = self.decoder.as_mut().ok_or(TransformError::TypeNotSet)?;
		let mut frame = ffmpeg::frame::Video::empty();

		match decoder.receive_frame(&mut frame) {
			Ok(()) => Ok(Some(frame)),
			Err(err) if is_again(&err) => Ok(None),
			Err(ffmpeg::Error::Eof) => {
				decoder.flush();
				self.draining = false;
				Ok(None)
			}
			Err(err) => Err(platform_error(err)),
		}
	}
}

impl Default for FfmpegVideo {
	fn default() -> Self {
		Self::new()
	}
}

/// Whether a `size` frame can be copied into `layout` without spilling past a plane.
fn fits(layout: Yv12Layout, size: Size) -> bool {
	size.width as usize <= layout.stride && size.height as usize <= layout.rows
}

fn copy_plane(dst: &mut [u8], dst_stride: usize, src: &[u8], src_stride: usize, width: usize, height: usize) {
	for row in 0..height {
		let src = &src[row * src_stride..row * src_stride + width];
		dst[row * dst_stride..row * dst_stride + width].copy_from_slice(src);
	}
}

/// Copy a decoded 4:2:0 frame into `dst` using the padded layout, in the plane order of `subtype`.
fn write_frame(
	frame: &ffmpeg::frame::Video,
	subtype: VideoSubtype,
	layout: Yv12Layout,
	dst: &mut [u8],
) -> Result<(), TransformError> {
	use ffmpeg::format::Pixel;

	if !matches!(frame.format(), Pixel::YUV420P | Pixel::YUVJ420P) {
		tracing::warn!(format = ?frame.format(), "unsupported pixel format");
		return Err(TransformError::InvalidMediaType);
	}

	let size = Size::new(frame.width(), frame.height());
	if !fits(layout, size) {
		tracing::warn!(%size, stride = layout.stride, rows = layout.rows, "frame larger than the output layout");
		return Err(TransformError::InvalidMediaType);
	}

	if dst.len() < layout.len() {
		return Err(TransformError::BufferTooSmall);
	}

	let width = frame.width() as usize;
	let height = frame.height() as usize;
	let chroma_width = width.div_ceil(2);
	let chroma_height = height.div_ceil(2);

	let (luma, chroma) = dst[..layout.len()].split_at_mut(layout.luma_size());
	let (first, second) = chroma.split_at_mut(layout.chroma_size());

	// YV12 stores V before U.
	let (u, v) = match subtype {
		VideoSubtype::Yv12 => (second, first),
		_ => (first, second),
	};

	copy_plane(luma, layout.stride, frame.data(0), frame.stride(0), width, height);
	copy_plane(u, layout.stride / 2, frame.data(1), frame.stride(1), chroma_width, chroma_height);
	copy_plane(v, layout.stride / 2, frame.data(2), frame.stride(2), chroma_width, chroma_height);

	Ok(())
}

impl Transform for FfmpegVideo {
	fn set_input_type(&mut self, media_type: &MediaType) -> Result<(), TransformError> {
		let input = media_type
			.video()
			.filter(|video| video.subtype == VideoSubtype::H264)
			.ok_or(TransformError::InvalidMediaType)?;

		let decoder = Self::open().map_err(|err| {
			tracing::warn!("failed to open decoder: {err:#}");
			TransformError::InvalidMediaType
		})?;

		self.decoder = Some(decoder);
		self.input = Some(input.clone());
		self.output = None;
		self.decoded = None;
		self.stashed = None;

		Ok(())
	}

	fn output_available_types(&mut self) -> Result<Vec<MediaType>, TransformError> {
		if self.decoder.is_none() {
			return Err(TransformError::TypeNotSet);
		}

		let frame_size = self.current_size();
		let candidate = |subtype| {
			MediaType::Video(VideoType {
				frame_size,
				interlace: Some(InterlaceMode::Progressive),
				..VideoType::new(subtype)
			})
		};

		Ok(vec![candidate(VideoSubtype::I420), candidate(VideoSubtype::Yv12)])
	}

	fn set_output_type(&mut self, media_type: &MediaType) -> Result<(), TransformError> {
		if self.decoder.is_none() {
			return Err(TransformError::TypeNotSet);
		}

		let output = media_type
			.video()
			.filter(|video| matches!(video.subtype, VideoSubtype::I420 | VideoSubtype::Yv12))
			.ok_or(TransformError::InvalidMediaType)?;

		if output.frame_size.is_none() {
			return Err(TransformError::InvalidMediaType);
		}

		self.output = Some(output.clone());
		Ok(())
	}

	fn buffer_requirements(&self) -> Result<BufferRequirements, TransformError> {
		if self.output.is_none() {
			return Err(TransformError::TypeNotSet);
		}
		let layout = self.layout().ok_or(TransformError::TypeNotSet)?;

		Ok(BufferRequirements {
			input_alignment: 0,
			output_size: layout.len(),
			output_alignment: 16,
			provides_samples: false,
		})
	}

	fn process_input(&mut self, sample: Sample) -> Result<(), TransformError> {
		if self.draining || self.stashed.is_some() {
			return Err(TransformError::NotAccepting);
		}

		let decoder = self.decoder.as_mut().ok_or(TransformError::TypeNotSet)?;

		let mut packet = ffmpeg::codec::packet::Packet::copy(sample.data());
		packet.set_pts(sample.time);

		match decoder.send_packet(&packet) {
			Ok(()) => Ok(()),
			Err(err) if is_again(&err) => Err(TransformError::NotAccepting),
			Err(err) => Err(platform_error(err)),
		}
	}

	fn process_output(&mut self, output: &mut Option<Sample>) -> Result<OutputStatus, TransformError> {
		let Some(frame) = self.receive()? else {
			return Ok(OutputStatus::NeedMoreInput);
		};

		let layout = self.layout().ok_or(TransformError::TypeNotSet)?;
		let size = Size::new(frame.width(), frame.height());

		// Consumers slice planes using the configured size, so a larger frame can't be delivered.
		if !fits(layout, size) {
			tracing::warn!(%size, "decoded frame exceeds the configured size");
			return Err(TransformError::InvalidMediaType);
		}

		let negotiated = self.output.as_ref().and_then(|output| output.frame_size);

		if negotiated != Some(size) {
			tracing::debug!(?negotiated, %size, "video size changed");
			self.decoded = Some(size);
			self.output = None;
			self.stashed = Some(frame);
			return Ok(OutputStatus::StreamChange);
		}

		let subtype = self.output.as_ref().map(|output| output.subtype).ok_or(TransformError::TypeNotSet)?;
		let sample = output.as_mut().ok_or(TransformError::BufferTooSmall)?;

		write_frame(&frame, subtype, layout, sample.buffer.data_mut())?;
		sample.buffer.set_len(layout.len())?;
		sample.time = frame.pts();

		Ok(OutputStatus::Produced)
	}

	fn process_message(&mut self, message: Message) -> Result<(), TransformError> {
		let decoder = self.decoder.as_mut().ok_or(TransformError::TypeNotSet)?;

		match message {
			Message::Flush => {
				decoder.flush();
				self.stashed = None;
				self.draining = false;
			}
			Message::Drain => {
				if !self.draining {
					decoder.send_eof().map_err(platform_error)?;
					self.draining = true;
				}
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_copy_plane_pads_rows() {
		let src: Vec<u8> = (0..6).collect();
		let mut dst = vec![0u8; 16 * 2];
		copy_plane(&mut dst, 16, &src, 3, 3, 2);

		assert_eq!(&dst[..3], &[0, 1, 2]);
		assert_eq!(&dst[16..19], &[3, 4, 5]);
		assert!(dst[3..16].iter().all(|&b| b == 0));
	}

	fn filled_frame(width: u32, height: u32) -> ffmpeg::frame::Video {
		let mut frame = ffmpeg::frame::Video::new(ffmpeg::format::Pixel::YUV420P, width, height);
		frame.data_mut(0).fill(0x10);
		frame.data_mut(1).fill(0x20);
		frame.data_mut(2).fill(0x30);
		frame
	}

	#[test]
	fn test_write_frame_yv12_order() {
		let layout = Yv12Layout::new(Size::new(300, 200));
		let mut dst = vec![0u8; layout.len()];

		write_frame(&filled_frame(300, 200), VideoSubtype::Yv12, layout, &mut dst).unwrap();

		assert_eq!(dst[0], 0x10);
		assert_eq!(dst[300], 0, "row padding");
		assert_eq!(dst[layout.luma_size()], 0x30);
		assert_eq!(dst[layout.luma_size() + layout.chroma_size()], 0x20);
	}

	#[test]
	fn test_write_frame_rejects_larger_frame() {
		let layout = Yv12Layout::new(Size::new(640, 360));
		let mut dst = vec![0u8; Yv12Layout::new(Size::new(1280, 720)).len()];

		let result = write_frame(&filled_frame(1280, 720), VideoSubtype::Yv12, layout, &mut dst);
		assert_eq!(result, Err(TransformError::InvalidMediaType));
	}

	#[test]
	fn test_write_frame_same_layout() {
		// 1920x1080 is padded to the same layout as the 1920x1088 coded size.
		let layout = Yv12Layout::new(Size::new(1920, 1088));
		let mut dst = vec![0u8; layout.len()];

		write_frame(&filled_frame(1920, 1080), VideoSubtype::I420, layout, &mut dst).unwrap();
		assert_eq!(dst[layout.luma_size()], 0x20);
		assert_eq!(dst[layout.luma_size() + layout.chroma_size()], 0x30);
	}

	#[test]
	fn test_negotiate() {
		ffmpeg::init().unwrap();

		let mut video = FfmpegVideo::new();
		let input = MediaType::Video(VideoType {
			frame_size: Some(Size::new(300, 200)),
			..VideoType::new(VideoSubtype::H264)
		});
		video.set_input_type(&input).unwrap();

		let types = video.output_available_types().unwrap();
		assert_eq!(types[1].video().unwrap().subtype, VideoSubtype::Yv12);
		video.set_output_type(&types[1]).unwrap();

		let requirements = video.buffer_requirements().unwrap();
		assert!(!requirements.provides_samples);
		assert_eq!(requirements.output_size, 304 * 208 * 3 / 2);
	}
}
