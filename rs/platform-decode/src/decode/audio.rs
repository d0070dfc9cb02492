use std::collections::VecDeque;

use bytes::{BufMut, Bytes, BytesMut};

use super::{DiscardHelper, Engine, Kind, OutputTypeMatch};
use crate::transform::{AacPayloadType, AudioSubtype, AudioType, CodecId, MediaType, Platform, Transform};
use crate::{AudioBuffer, AudioCodec, AudioDecoderConfig, ChannelLayout, SampleFormat, TimeInfo, Timestamp};

/// Decodes AAC to interleaved integer PCM.
pub type AudioDecoder = Engine<Audio>;

/// The audio [Kind].
///
/// Output timestamps are not taken from the transform.
/// Each output is paired with the oldest pending input timing and passed through a [DiscardHelper].
#[derive(Debug, Default)]
pub struct Audio {
	channels: u32,
	sample_rate: u32,
	channel_layout: Option<ChannelLayout>,
	sample_size: u32,

	pending: VecDeque<TimeInfo>,
	discard: Option<DiscardHelper>,
}

impl Audio {
	pub fn pending_inputs(&self) -> usize {
		self.pending.len()
	}
}

/// The tail of a HEAACWAVEFORMAT, starting at `wPayloadType`, which the AAC transform expects as user data.
pub fn aac_user_data(config: &AudioDecoderConfig) -> Bytes {
	let extra = match config.demuxed {
		true => config.extra_data.as_deref().unwrap_or_default(),
		false => &[][..],
	};

	let mut data = BytesMut::with_capacity(12 + extra.len());

	// 0 is raw AAC, 1 is ADTS
	data.put_u16_le(match config.demuxed {
		true => 0,
		false => 1,
	});
	data.put_u16_le(0); // wAudioProfileLevelIndication
	data.put_u16_le(0); // wStructType
	data.put_u16_le(0); // wReserved1
	data.put_u32_le(0); // dwReserved2

	// The AudioSpecificConfig.
	data.extend_from_slice(extra);

	data.freeze()
}

impl Kind for Audio {
	type Config = AudioDecoderConfig;
	type Output = AudioBuffer;

	const NAME: &'static str = "audio";

	fn codec(_config: &Self::Config) -> CodecId {
		CodecId::Aac
	}

	fn is_config_supported(config: &Self::Config, platform: &dyn Platform) -> bool {
		if config.codec != AudioCodec::Aac {
			tracing::debug!(codec = %config.codec, "unsupported audio codec");
			return false;
		}

		if config.encrypted {
			tracing::debug!(codec = %config.codec, "unsupported encrypted audio");
			return false;
		}

		let available = platform.is_available(CodecId::Aac);
		if !available {
			tracing::warn!(codec = %config.codec, "audio platform decoder unavailable");
		}

		available
	}

	fn input_type(config: &Self::Config) -> MediaType {
		MediaType::Audio(AudioType {
			channels: Some(config.channels()),
			sample_rate: Some(config.sample_rate),
			aac_payload_type: (!config.demuxed).then_some(AacPayloadType::Adts),
			user_data: Some(aac_user_data(config)),
			..AudioType::new(AudioSubtype::Aac)
		})
	}

	fn accept_output_type(
		&mut self,
		config: &Self::Config,
		candidate: &MediaType,
		transform: &mut dyn Transform,
	) -> OutputTypeMatch {
		let Some(audio) = candidate.audio().filter(|audio| audio.subtype == AudioSubtype::Pcm) else {
			return OutputTypeMatch::KeepSearching;
		};

		if let Err(err) = transform.set_output_type(candidate) {
			tracing::warn!(%err, "failed to set output type");
			return OutputTypeMatch::Reject;
		}

		let (Some(sample_rate), Some(channels), Some(bits)) = (audio.sample_rate, audio.channels, audio.bits_per_sample)
		else {
			tracing::warn!(?audio, "output type is missing attributes");
			return OutputTypeMatch::Reject;
		};

		if channels == 0 || bits < 8 {
			tracing::warn!(channels, bits, "invalid output type");
			return OutputTypeMatch::Reject;
		}

		self.sample_rate = sample_rate;
		self.channels = channels;
		self.channel_layout = Some(match channels == config.channels() {
			true => config.channel_layout,
			false => ChannelLayout::guess(channels),
		});
		self.sample_size = bits / 8;

		OutputTypeMatch::Accept
	}

	fn build_output(&mut self, _config: &Self::Config, data: &[u8], _timestamp: Timestamp) -> Option<Self::Output> {
		let Some(format) = SampleFormat::from_sample_size(self.sample_size) else {
			tracing::warn!(sample_size = self.sample_size, "unsupported sample size");
			return None;
		};

		let frame_size = self.sample_size as usize * self.channels as usize;
		if frame_size == 0 {
			return None;
		}
		let frames = data.len() / frame_size;

		Some(AudioBuffer {
			// Assigned by the discard helper.
			timestamp: None,
			format,
			channel_layout: self.channel_layout.unwrap_or(ChannelLayout::Unsupported),
			channels: self.channels,
			sample_rate: self.sample_rate,
			data: Bytes::copy_from_slice(&data[..frames * frame_size]),
		})
	}

	fn record_input(&mut self, timing: &TimeInfo) {
		// Output may lag behind input, so the timing waits here until its output shows up.
		self.pending.push_back(*timing);
	}

	fn finish_output(&mut self, output: Self::Output) -> Option<Self::Output> {
		let Some(timing) = self.pending.pop_front() else {
			tracing::warn!("output without pending input timing, dropping");
			return None;
		};

		let discard = self.discard.as_mut()?;
		discard.process(&timing, output)
	}

	fn reset_timestamp_state(&mut self, config: &Self::Config) {
		let mut discard = DiscardHelper::new(config.sample_rate, config.codec_delay as usize);
		discard.reset(config.codec_delay as usize);

		self.discard = Some(discard);
		self.pending.clear();
	}
}

impl Engine<Audio> {
	/// The negotiated channel count.
	pub fn channels(&self) -> u32 {
		self.kind().channels
	}

	/// The negotiated sample rate, as reported by the transform.
	pub fn sample_rate(&self) -> u32 {
		self.kind().sample_rate
	}

	pub fn channel_layout(&self) -> ChannelLayout {
		self.kind().channel_layout.unwrap_or(ChannelLayout::Unsupported)
	}

	pub fn sample_format(&self) -> Option<SampleFormat> {
		SampleFormat::from_sample_size(self.kind().sample_size)
	}
}
