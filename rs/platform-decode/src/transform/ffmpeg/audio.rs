use anyhow::Context;
use ffmpeg_next as ffmpeg;

use super::{context, is_again, platform_error};
use crate::transform::*;

/// Bytes at the start of the AAC user data before the AudioSpecificConfig.
const USER_DATA_HEADER: usize = 12;

/// AAC to interleaved PCM.
///
/// Offers 32-bit float and 16-bit integer output, and allocates its own output samples.
pub struct FfmpegAudio {
	decoder: Option<ffmpeg::decoder::Audio>,
	input: Option<AudioType>,
	output: Option<AudioType>,

	// The format of the most recently decoded frame, if it differs from the input type.
	decoded: Option<(u32, u32)>,

	// A frame held back while the output type is renegotiated.
	stashed: Option<ffmpeg::frame::Audio>,
	draining: bool,
}

impl FfmpegAudio {
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

	fn open(input: &AudioType) -> anyhow::Result<ffmpeg::decoder::Audio> {
		// ADTS carries its config in band; raw AAC needs the AudioSpecificConfig.
		let extra_data = match input.aac_payload_type {
			Some(AacPayloadType::Adts) => None,
			_ => input
				.user_data
				.as_ref()
				.and_then(|data| data.get(USER_DATA_HEADER..)),
		};

		let context = context(CodecId::Aac, extra_data)?;
		let decoder = context.decoder().audio().context("failed to open aac decoder")?;

		Ok(decoder)
	}

	/// (sample rate, channels) of what the decoder currently produces.
	fn current_format(&self) -> Option<(u32, u32)> {
		self.decoded.or_else(|| {
			let input = self.input.as_ref()?;
			Some((input.sample_rate?, input.channels?))
		})
	}

	fn receive(&mut self) -> Result<Option<ffmpeg::frame::Audio>, TransformError> {
		if let Some(frame) = self.stashed.take() {
			return Ok(Some(frame));
		}

		let decoder = self.decoder.as_mut().ok_or(TransformError::TypeNotSet)?;
		let mut frame = ffmpeg::frame::Audio::empty();

		match decoder.receive_frame(&mut frame) {
			Ok(()) => Ok(Some(frame)),
			Err(err) if is_again(&err) => Ok(None),
			Err(ffmpeg::Error::Eof) => {
				// Fully drained; accept input again.
				decoder.flush();
				self.draining = false;
				Ok(None)
			}
			Err(err) => Err(platform_error(err)),
		}
	}
}

impl Default for FfmpegAudio {
	fn default() -> Self {
		Self::new()
	}
}

/// Convert every sample to the output subtype and interleave the channels.
fn interleave(frame: &ffmpeg::frame::Audio, subtype: AudioSubtype) -> Result<Vec<u8>, TransformError> {
	use ffmpeg::format::Sample;

	let channels = frame.channels() as usize;
	let samples = frame.samples();

	let (size, planar) = match frame.format() {
		Sample::I16(kind) => (2, kind),
		Sample::I32(kind) => (4, kind),
		Sample::F32(kind) => (4, kind),
		Sample::F64(kind) => (8, kind),
		format => {
			tracing::warn!(?format, "unsupported sample format");
			return Err(TransformError::InvalidMediaType);
		}
	};
	let planar = planar == ffmpeg::format::sample::Type::Planar;

	let format = frame.format();
	let out_size = match subtype {
		AudioSubtype::Float => 4,
		_ => 2,
	};
	let mut out = Vec::with_capacity(samples * channels * out_size);

	for index in 0..samples {
		for channel in 0..channels {
			let (plane, offset) = match planar {
				true => (channel, index * size),
				false => (0, (index * channels + channel) * size),
			};
			let bytes = &frame.data(plane)[offset..offset + size];

			let value = match format {
				Sample::I16(_) => i16::from_ne_bytes([bytes[0], bytes[1]]) as f64 / 32768.0,
				Sample::I32(_) => i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64 / 2147483648.0,
				Sample::F32(_) => f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
				_ => {
					let mut raw = [0u8; 8];
					raw.copy_from_slice(bytes);
					f64::from_ne_bytes(raw)
				}
			};

			match subtype {
				AudioSubtype::Float => out.extend_from_slice(&(value as f32).to_le_bytes()),
				_ => {
					let sample = (value * 32768.0).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
					out.extend_from_slice(&sample.to_le_bytes());
				}
			}
		}
	}

	Ok(out)
}

impl Transform for FfmpegAudio {
	fn set_input_type(&mut self, media_type: &MediaType) -> Result<(), TransformError> {
		let input = media_type
			.audio()
			.filter(|audio| audio.subtype == AudioSubtype::Aac)
			.ok_or(TransformError::InvalidMediaType)?;

		let decoder = Self::open(input).map_err(|err| {
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
		let (sample_rate, channels) = self.current_format().ok_or(TransformError::TypeNotSet)?;

		let candidate = |subtype, bits| {
			MediaType::Audio(AudioType {
				sample_rate: Some(sample_rate),
				channels: Some(channels),
				bits_per_sample: Some(bits),
				..AudioType::new(subtype)
			})
		};

		Ok(vec![candidate(AudioSubtype::Float, 32), candidate(AudioSubtype::Pcm, 16)])
	}

	fn set_output_type(&mut self, media_type: &MediaType) -> Result<(), TransformError> {
		if self.decoder.is_none() {
			return Err(TransformError::TypeNotSet);
		}

		let output = media_type.audio().ok_or(TransformError::InvalidMediaType)?;
		match (output.subtype, output.bits_per_sample) {
			(AudioSubtype::Float, Some(32)) | (AudioSubtype::Pcm, Some(16)) => {}
			_ => return Err(TransformError::InvalidMediaType),
		}

		if output.sample_rate.zip(output.channels) != self.current_format() {
			return Err(TransformError::InvalidMediaType);
		}

		self.output = Some(output.clone());
		Ok(())
	}

	fn buffer_requirements(&self) -> Result<BufferRequirements, TransformError> {
		if self.output.is_none() {
			return Err(TransformError::TypeNotSet);
		}

		Ok(BufferRequirements {
			input_alignment: 0,
			output_size: 0,
			output_alignment: 0,
			provides_samples: true,
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

		let format = (frame.rate(), frame.channels() as u32);
		let negotiated = self
			.output
			.as_ref()
			.and_then(|output| output.sample_rate.zip(output.channels));

		if negotiated != Some(format) {
			tracing::debug!(?negotiated, ?format, "audio format changed");
			self.decoded = Some(format);
			self.output = None;
			self.stashed = Some(frame);
			return Ok(OutputStatus::StreamChange);
		}

		let subtype = self.output.as_ref().map(|output| output.subtype).ok_or(TransformError::TypeNotSet)?;
		let data = interleave(&frame, subtype)?;

		*output = Some(Sample::copy_from(&data, frame.pts()));
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

	fn adts_input() -> MediaType {
		let mut input = AudioType::new(AudioSubtype::Aac);
		input.sample_rate = Some(44_100);
		input.channels = Some(2);
		input.aac_payload_type = Some(AacPayloadType::Adts);
		MediaType::Audio(input)
	}

	#[test]
	fn test_types_require_input() {
		let mut audio = FfmpegAudio::new();
		assert_eq!(audio.output_available_types(), Err(TransformError::TypeNotSet));
	}

	#[test]
	fn test_negotiate() {
		ffmpeg::init().unwrap();

		let mut audio = FfmpegAudio::new();
		audio.set_input_type(&adts_input()).unwrap();

		let types = audio.output_available_types().unwrap();
		assert_eq!(types.len(), 2);
		assert_eq!(types[0].audio().unwrap().subtype, AudioSubtype::Float);

		audio.set_output_type(&types[1]).unwrap();
		assert!(audio.buffer_requirements().unwrap().provides_samples);

		// Nothing decoded yet.
		let mut output = None;
		assert_eq!(audio.process_output(&mut output), Ok(OutputStatus::NeedMoreInput));
	}

	#[test]
	fn test_rejects_video_input() {
		let mut audio = FfmpegAudio::new();
		let video = MediaType::Video(VideoType::new(VideoSubtype::H264));
		assert_eq!(audio.set_input_type(&video), Err(TransformError::InvalidMediaType));
	}
}
