use bytes::Bytes;

use super::{Engine, Kind, OutputTypeMatch};
use crate::transform::{CodecId, InterlaceMode, MediaType, Platform, Transform, VideoSubtype, VideoType};
use crate::{PixelFormat, Plane, Rect, Size, Timestamp, VideoCodec, VideoCodecProfile, VideoDecoderConfig, VideoFrame};

/// Decodes H.264 to planar YV12.
pub type VideoDecoder = Engine<Video>;

/// The video [Kind].
///
/// Output timestamps come straight from the transform's sample time.
#[derive(Debug, Default)]
pub struct Video;

/// The layout of a YV12 output sample for a coded size.
///
/// The transform pads both the luma stride and the row count to a multiple of 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Yv12Layout {
	pub stride: usize,
	pub rows: usize,
}

impl Yv12Layout {
	pub fn new(coded_size: Size) -> Self {
		Self {
			stride: align16(coded_size.width as usize),
			rows: align16(coded_size.height as usize),
		}
	}

	pub fn luma_size(&self) -> usize {
		self.rows * self.stride
	}

	pub fn chroma_size(&self) -> usize {
		self.luma_size() / 4
	}

	/// The minimum number of bytes for all three planes.
	pub fn len(&self) -> usize {
		self.luma_size() + 2 * self.chroma_size()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

fn align16(value: usize) -> usize {
	(value + 15) & !15
}

impl Kind for Video {
	type Config = VideoDecoderConfig;
	type Output = VideoFrame;

	const NAME: &'static str = "video";

	fn codec(_config: &Self::Config) -> CodecId {
		CodecId::H264
	}

	fn is_config_supported(config: &Self::Config, platform: &dyn Platform) -> bool {
		if !platform.is_available(CodecId::H264) {
			tracing::debug!("video platform decoder unavailable");
			return false;
		}

		if config.codec != VideoCodec::H264 {
			tracing::warn!(codec = %config.codec, "unsupported video codec");
		} else {
			if config.profile < VideoCodecProfile::H264_MIN {
				tracing::warn!(profile = config.profile.0, "unsupported video profile (too low)");
			}
			if config.profile > VideoCodecProfile::H264_MAX {
				tracing::warn!(profile = config.profile.0, "unsupported video profile (too high)");
			}
		}

		if config.encrypted {
			tracing::debug!(codec = %config.codec, "unsupported encrypted video");
			return false;
		}

		config.codec == VideoCodec::H264
			&& config.profile >= VideoCodecProfile::H264_MIN
			&& config.profile <= VideoCodecProfile::H264_MAX
	}

	fn input_type(config: &Self::Config) -> MediaType {
		MediaType::Video(VideoType {
			frame_size: Some(config.coded_size),
			interlace: Some(InterlaceMode::MixedInterlaceOrProgressive),
			..VideoType::new(VideoSubtype::H264)
		})
	}

	fn accept_output_type(
		&mut self,
		_config: &Self::Config,
		candidate: &MediaType,
		transform: &mut dyn Transform,
	) -> OutputTypeMatch {
		if !matches!(candidate.video(), Some(video) if video.subtype == VideoSubtype::Yv12) {
			return OutputTypeMatch::KeepSearching;
		}

		match transform.set_output_type(candidate) {
			Ok(()) => OutputTypeMatch::Accept,
			Err(err) => {
				tracing::warn!(%err, "failed to set output type");
				OutputTypeMatch::Reject
			}
		}
	}

	fn build_output(&mut self, config: &Self::Config, data: &[u8], timestamp: Timestamp) -> Option<Self::Output> {
		let layout = Yv12Layout::new(config.coded_size);
		if data.len() < layout.len() {
			tracing::warn!(size = data.len(), expected = layout.len(), coded = %config.coded_size, "short video frame");
			return None;
		}

		if layout.stride != config.coded_size.width as usize || layout.rows != config.coded_size.height as usize {
			tracing::trace!(stride = layout.stride, rows = layout.rows, coded = %config.coded_size, "padded plane layout");
		}

		let buffer = Bytes::copy_from_slice(&data[..layout.len()]);
		let luma = layout.luma_size();
		let chroma = layout.chroma_size();

		// Y, then V, then U.
		let y = buffer.slice(..luma);
		let v = buffer.slice(luma..luma + chroma);
		let u = buffer.slice(luma + chroma..luma + 2 * chroma);

		Some(VideoFrame {
			timestamp,
			format: PixelFormat::Yv12,
			coded_size: config.coded_size,
			visible_rect: config.visible_rect,
			natural_size: config.natural_size,
			y: Plane {
				data: y,
				stride: layout.stride,
			},
			u: Plane {
				data: u,
				stride: layout.stride / 2,
			},
			v: Plane {
				data: v,
				stride: layout.stride / 2,
			},
		})
	}

	fn reset_timestamp_state(&mut self, _config: &Self::Config) {}
}

impl Engine<Video> {
	pub fn coded_size(&self) -> Option<Size> {
		self.config().map(|config| config.coded_size)
	}

	pub fn visible_rect(&self) -> Option<Rect> {
		self.config().map(|config| config.visible_rect)
	}

	pub fn natural_size(&self) -> Option<Size> {
		self.config().map(|config| config.natural_size)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use tokio::sync::mpsc;

	use super::*;
	use crate::transform::fake::{FakePlatform, Script};
	use crate::{Error, H264Profile, InputUnit, Sequence};

	fn h264_config(size: Size) -> VideoDecoderConfig {
		VideoDecoderConfig {
			codec: VideoCodec::H264,
			profile: H264Profile::High.into(),
			encrypted: false,
			coded_size: size,
			visible_rect: Rect::from_size(size),
			natural_size: size,
			extra_data: None,
		}
	}

	#[test]
	fn test_layout_is_16_aligned() {
		let layout = Yv12Layout::new(Size::new(300, 200));
		assert_eq!(layout.stride, 304);
		assert_eq!(layout.rows, 208);
		assert_eq!(layout.len(), 304 * 208 * 3 / 2);

		let layout = Yv12Layout::new(Size::new(1920, 1088));
		assert_eq!(layout.stride, 1920);
		assert_eq!(layout.rows, 1088);
	}

	#[test]
	fn test_plane_offsets() {
		let config = h264_config(Size::new(300, 200));
		let layout = Yv12Layout::new(config.coded_size);

		// Fill each plane with a distinct value.
		let mut data = vec![0u8; layout.len()];
		data[layout.luma_size()..layout.luma_size() + layout.chroma_size()].fill(0x56);
		data[layout.luma_size() + layout.chroma_size()..].fill(0x55);

		let frame = Video.build_output(&config, &data, Timestamp::from_micros(40)).unwrap();
		assert_eq!(frame.format, PixelFormat::Yv12);
		assert_eq!(frame.timestamp, Timestamp::from_micros(40));
		assert_eq!(frame.y.stride, 304);
		assert_eq!(frame.u.stride, 152);
		assert_eq!(frame.v.stride, 152);
		assert_eq!(frame.y.data.len(), 304 * 208);
		assert!(frame.u.data.iter().all(|&b| b == 0x55));
		assert!(frame.v.data.iter().all(|&b| b == 0x56));
	}

	#[test]
	fn test_short_buffer_is_rejected() {
		let config = h264_config(Size::new(64, 64));
		assert!(Video.build_output(&config, &[0u8; 100], Timestamp::ZERO).is_none());
	}

	#[test]
	fn test_config_support() {
		let platform = FakePlatform::new(Script::video(Size::new(64, 64)));
		let config = h264_config(Size::new(64, 64));
		assert!(Video::is_config_supported(&config, &platform));

		let vp9 = VideoDecoderConfig {
			codec: VideoCodec::Vp9,
			..config.clone()
		};
		assert!(!Video::is_config_supported(&vp9, &platform));

		let unknown = VideoDecoderConfig {
			profile: VideoCodecProfile::UNKNOWN,
			..config.clone()
		};
		assert!(!Video::is_config_supported(&unknown, &platform));

		let encrypted = VideoDecoderConfig {
			encrypted: true,
			..config.clone()
		};
		assert!(!Video::is_config_supported(&encrypted, &platform));

		platform.update(|script| script.available = false);
		assert!(!Video::is_config_supported(&config, &platform));
	}

	#[test]
	fn test_input_type() {
		let MediaType::Video(input) = Video::input_type(&h264_config(Size::new(640, 360))) else {
			panic!("expected video");
		};
		assert_eq!(input.subtype, VideoSubtype::H264);
		assert_eq!(input.frame_size, Some(Size::new(640, 360)));
		assert_eq!(input.interlace, Some(InterlaceMode::MixedInterlaceOrProgressive));
	}

	#[tokio::test]
	async fn test_decode_into_caller_sample() {
		let size = Size::new(300, 200);
		let platform = FakePlatform::new(Script::video(size));
		let shared = Arc::new(platform.clone());
		let seq = Sequence::spawn(move |runner| VideoDecoder::new(shared, runner));

		let (tx, mut rx) = mpsc::unbounded_channel();
		let output: crate::OutputCallback<VideoFrame> = Arc::new(move |frame| {
			let _ = tx.send(frame);
		});

		let config = h264_config(size);
		seq.call(move |decoder| decoder.initialize(config, Some(output)))
			.await
			.unwrap()
			.unwrap();

		let requirements = seq.call(|decoder| decoder.buffer_requirements()).await.unwrap();
		assert!(!requirements.provides_samples);

		for index in 0..3u64 {
			let (done, result) = tokio::sync::oneshot::channel();
			let unit = InputUnit::new(vec![0, 0, 0, 1], Timestamp::from_micros(index * 33_333));
			seq.post(move |decoder| {
				decoder.decode(unit, move |res| {
					let _ = done.send(res);
				})
			});
			result.await.unwrap().unwrap();
		}

		let mut timestamps = Vec::new();
		while let Ok(frame) = rx.try_recv() {
			assert_eq!(frame.y.stride, 304);
			assert_eq!(frame.coded_size, size);
			timestamps.push(frame.timestamp.as_micros());
		}
		assert_eq!(timestamps, vec![0, 33_333, 66_666]);

		// YV12 was chosen over the I420 candidate offered first.
		let record = platform.record();
		assert!(matches!(&record.output_types[..], [MediaType::Video(video)] if video.subtype == VideoSubtype::Yv12));

		let coded = seq.call(|decoder| decoder.coded_size()).await.unwrap();
		assert_eq!(coded, Some(size));
	}

	#[tokio::test]
	async fn test_output_too_small() {
		let size = Size::new(64, 64);
		let mut script = Script::video(size);
		script.requirements.output_size = 16;

		let seq = Sequence::spawn(move |runner| VideoDecoder::new(Arc::new(FakePlatform::new(script)), runner));
		let output: crate::OutputCallback<VideoFrame> = Arc::new(|_| {});
		let config = h264_config(size);
		seq.call(move |decoder| decoder.initialize(config, Some(output)))
			.await
			.unwrap()
			.unwrap();

		let (done, result) = tokio::sync::oneshot::channel();
		let unit = InputUnit::new(vec![0, 0, 0, 1], Timestamp::ZERO);
		seq.post(move |decoder| {
			decoder.decode(unit, move |res| {
				let _ = done.send(res);
			})
		});
		assert_eq!(result.await.unwrap(), Err(Error::PlatformDecodeFailure));
	}
}
