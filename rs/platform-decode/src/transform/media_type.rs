use bytes::Bytes;

use crate::Size;

/// A negotiated description of the samples on one side of a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
	Audio(AudioType),
	Video(VideoType),
}

impl MediaType {
	pub fn audio(&self) -> Option<&AudioType> {
		match self {
			Self::Audio(audio) => Some(audio),
			Self::Video(_) => None,
		}
	}

	pub fn video(&self) -> Option<&VideoType> {
		match self {
			Self::Video(video) => Some(video),
			Self::Audio(_) => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum AudioSubtype {
	#[display("aac")]
	Aac,
	/// Integer PCM.
	#[display("pcm")]
	Pcm,
	/// Floating point PCM.
	#[display("float")]
	Float,
}

/// How AAC payloads are framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacPayloadType {
	Raw,
	Adts,
}

/// Attributes of an audio media type.
///
/// Attributes are optional because a transform may offer a type without filling them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioType {
	pub subtype: AudioSubtype,
	pub channels: Option<u32>,
	pub sample_rate: Option<u32>,
	pub bits_per_sample: Option<u32>,
	pub aac_payload_type: Option<AacPayloadType>,
	pub user_data: Option<Bytes>,
}

impl AudioType {
	pub fn new(subtype: AudioSubtype) -> Self {
		Self {
			subtype,
			channels: None,
			sample_rate: None,
			bits_per_sample: None,
			aac_payload_type: None,
			user_data: None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum VideoSubtype {
	#[display("h264")]
	H264,
	/// Planar 4:2:0, Y then V then U.
	#[display("yv12")]
	Yv12,
	/// Planar 4:2:0, Y then U then V.
	#[display("i420")]
	I420,
	/// Semi-planar 4:2:0.
	#[display("nv12")]
	Nv12,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlaceMode {
	Progressive,
	MixedInterlaceOrProgressive,
}

/// Attributes of a video media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoType {
	pub subtype: VideoSubtype,
	pub frame_size: Option<Size>,
	pub interlace: Option<InterlaceMode>,
}

impl VideoType {
	pub fn new(subtype: VideoSubtype) -> Self {
		Self {
			subtype,
			frame_size: None,
			interlace: None,
		}
	}
}
