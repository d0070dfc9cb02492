use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use serde_with::hex::Hex;

/// Compressed audio codecs a stream may declare.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
	#[display("aac")]
	Aac,
	#[display("opus")]
	Opus,
	#[display("mp3")]
	Mp3,
	#[display("flac")]
	Flac,
	#[display("vorbis")]
	Vorbis,
}

/// Compressed video codecs a stream may declare.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
	#[display("h264")]
	H264,
	#[display("hevc")]
	Hevc,
	#[display("vp8")]
	Vp8,
	#[display("vp9")]
	Vp9,
	#[display("av1")]
	Av1,
}

/// The H.264 profiles, numbered the way the media pipeline numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum H264Profile {
	Baseline = 0,
	Main = 1,
	Extended = 2,
	High = 3,
	High10 = 4,
	High422 = 5,
	High444Predictive = 6,
	ScalableBaseline = 7,
	ScalableHigh = 8,
	StereoHigh = 9,
	MultiviewHigh = 10,
}

/// A codec profile as reported by the container.
///
/// This is kept as the raw number because containers happily report values outside of the known ranges.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[serde(transparent)]
pub struct VideoCodecProfile(pub i32);

impl VideoCodecProfile {
	pub const UNKNOWN: Self = Self(-1);
	pub const H264_MIN: Self = Self(H264Profile::Baseline as i32);
	pub const H264_MAX: Self = Self(H264Profile::MultiviewHigh as i32);

	pub fn h264(self) -> Option<H264Profile> {
		H264Profile::try_from(self.0).ok()
	}
}

impl From<H264Profile> for VideoCodecProfile {
	fn from(profile: H264Profile) -> Self {
		Self(profile.into())
	}
}

/// Speaker arrangement of an audio stream.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayout {
	Unsupported,
	Mono,
	Stereo,
	Surround,
	Quad,
	#[serde(rename = "5.0")]
	FivePointZero,
	#[serde(rename = "5.1")]
	FivePointOne,
	#[serde(rename = "6.1")]
	SixPointOne,
	#[serde(rename = "7.1")]
	SevenPointOne,
}

impl ChannelLayout {
	pub fn channel_count(self) -> u32 {
		match self {
			Self::Unsupported => 0,
			Self::Mono => 1,
			Self::Stereo => 2,
			Self::Surround => 3,
			Self::Quad => 4,
			Self::FivePointZero => 5,
			Self::FivePointOne => 6,
			Self::SixPointOne => 7,
			Self::SevenPointOne => 8,
		}
	}

	/// Best guess at a layout when only the channel count is known.
	pub fn guess(channels: u32) -> Self {
		match channels {
			1 => Self::Mono,
			2 => Self::Stereo,
			3 => Self::Surround,
			4 => Self::Quad,
			5 => Self::FivePointZero,
			6 => Self::FivePointOne,
			7 => Self::SixPointOne,
			8 => Self::SevenPointOne,
			_ => Self::Unsupported,
		}
	}
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, derive_more::Display)]
#[display("{width}x{height}")]
pub struct Size {
	pub width: u32,
	pub height: u32,
}

impl Size {
	pub const fn new(width: u32, height: u32) -> Self {
		Self { width, height }
	}
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
	pub x: u32,
	pub y: u32,
	pub width: u32,
	pub height: u32,
}

impl Rect {
	pub const fn from_size(size: Size) -> Self {
		Self {
			x: 0,
			y: 0,
			width: size.width,
			height: size.height,
		}
	}

	pub const fn size(&self) -> Size {
		Size::new(self.width, self.height)
	}
}

/// Everything needed to initialize an audio decoder.
#[serde_with::serde_as]
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioDecoderConfig {
	pub codec: AudioCodec,

	#[serde(default)]
	pub encrypted: bool,

	pub channel_layout: ChannelLayout,

	// The sample rate of the audio in Hz
	pub sample_rate: u32,

	// Container supplied initialization data, ex. the AudioSpecificConfig for AAC.
	#[serde(default)]
	#[serde_as(as = "Option<Hex>")]
	pub extra_data: Option<Bytes>,

	/// Number of leading decoded frames that are encoder priming and must be discarded.
	#[serde(default)]
	pub codec_delay: u32,

	/// Whether a container demuxer produced the stream.
	///
	/// Demuxed AAC is raw and initialized by `extra_data`; otherwise every payload carries an ADTS header.
	#[serde(default)]
	pub demuxed: bool,
}

impl AudioDecoderConfig {
	pub fn channels(&self) -> u32 {
		self.channel_layout.channel_count()
	}
}

/// Everything needed to initialize a video decoder.
#[serde_with::serde_as]
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoDecoderConfig {
	pub codec: VideoCodec,

	pub profile: VideoCodecProfile,

	#[serde(default)]
	pub encrypted: bool,

	pub coded_size: Size,
	pub visible_rect: Rect,
	pub natural_size: Size,

	#[serde(default)]
	#[serde_as(as = "Option<Hex>")]
	pub extra_data: Option<Bytes>,
}
