//! A software [Platform] backed by FFmpeg.
//!
//! Handy on machines without a hardware codec, and as a reference for platform backends.
//! The transforms follow the same polling contract as a platform codec:
//! output is produced one frame per [Transform::process_output] call and format changes are reported as [OutputStatus::StreamChange].

mod audio;
mod video;

pub use audio::*;
pub use video::*;

use anyhow::Context;
use ffmpeg_next as ffmpeg;

use super::{CodecId, Platform, Transform, TransformError};

/// Creates FFmpeg backed transforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegPlatform;

impl FfmpegPlatform {
	pub fn new() -> Self {
		Self
	}
}

fn codec_id(codec: CodecId) -> ffmpeg::codec::Id {
	match codec {
		CodecId::Aac => ffmpeg::codec::Id::AAC,
		CodecId::H264 => ffmpeg::codec::Id::H264,
	}
}

impl Platform for FfmpegPlatform {
	fn is_available(&self, codec: CodecId) -> bool {
		if let Err(err) = ffmpeg::init() {
			tracing::warn!(%err, "failed to initialize ffmpeg");
			return false;
		}

		ffmpeg::codec::decoder::find(codec_id(codec)).is_some()
	}

	fn create(&self, codec: CodecId) -> Result<Box<dyn Transform>, TransformError> {
		ffmpeg::init().map_err(|err| {
			tracing::warn!(%err, "failed to initialize ffmpeg");
			TransformError::ModuleNotFound
		})?;

		if ffmpeg::codec::decoder::find(codec_id(codec)).is_none() {
			tracing::warn!(%codec, "ffmpeg decoder not found");
			return Err(TransformError::ModuleNotFound);
		}

		Ok(match codec {
			CodecId::Aac => Box::new(FfmpegAudio::new()),
			CodecId::H264 => Box::new(FfmpegVideo::new()),
		})
	}
}

/// A codec context with the initialization data attached, ready to be opened.
fn context(codec: CodecId, extra_data: Option<&[u8]>) -> anyhow::Result<ffmpeg::codec::context::Context> {
	let decoder = ffmpeg::codec::decoder::find(codec_id(codec)).context("decoder not found")?;
	let mut context = ffmpeg::codec::context::Context::new_with_codec(decoder);

	if let Some(data) = extra_data.filter(|data| !data.is_empty()) {
		// FFmpeg reads past the end of extradata, so it must be padded with zeros.
		let size = data.len() + ffmpeg::sys::AV_INPUT_BUFFER_PADDING_SIZE as usize;

		unsafe {
			let buffer = ffmpeg::sys::av_mallocz(size) as *mut u8;
			anyhow::ensure!(!buffer.is_null(), "failed to allocate extradata");

			std::ptr::copy_nonoverlapping(data.as_ptr(), buffer, data.len());

			let context = context.as_mut_ptr();
			(*context).extradata = buffer;
			(*context).extradata_size = data.len() as i32;
		}
	}

	Ok(context)
}

fn is_again(err: &ffmpeg::Error) -> bool {
	matches!(err, ffmpeg::Error::Other { errno } if *errno == ffmpeg::error::EAGAIN)
}

fn platform_error(err: ffmpeg::Error) -> TransformError {
	tracing::debug!(%err, "ffmpeg error");
	TransformError::Platform(err.into())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_codec_ids() {
		assert_eq!(codec_id(CodecId::Aac), ffmpeg::codec::Id::AAC);
		assert_eq!(codec_id(CodecId::H264), ffmpeg::codec::Id::H264);
	}

	#[test]
	fn test_again_is_not_fatal() {
		let again = ffmpeg::Error::Other {
			errno: ffmpeg::error::EAGAIN,
		};
		assert!(is_again(&again));
		assert!(!is_again(&ffmpeg::Error::Eof));
	}

	#[test]
	fn test_platform_available() {
		let platform = FfmpegPlatform::new();
		assert!(platform.is_available(CodecId::Aac));
		assert!(platform.create(CodecId::Aac).is_ok());
	}
}
