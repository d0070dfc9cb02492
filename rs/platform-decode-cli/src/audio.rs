use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use platform_decode::{AudioBuffer, AudioCodec, AudioDecoderConfig, ChannelLayout, InputUnit, SampleFormat, Timestamp};

use crate::adts;

pub fn run(sync: platform_decode::SyncConfig, input: &Path, output: &Path, codec_delay: u32) -> anyhow::Result<()> {
	let data = std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
	let (header, frames) = adts::split(Bytes::from(data)).context("failed to parse ADTS")?;

	tracing::info!(
		sample_rate = header.sample_rate,
		channels = header.channels,
		frames = frames.len(),
		"parsed input"
	);

	let config = AudioDecoderConfig {
		codec: AudioCodec::Aac,
		encrypted: false,
		channel_layout: ChannelLayout::guess(header.channels),
		sample_rate: header.sample_rate,
		extra_data: None,
		codec_delay,
		demuxed: false,
	};

	let inputs = units(header, frames)?;
	let buffers = decode(sync, config, inputs)?;

	let mut pcm = Vec::new();
	for buffer in &buffers {
		write_s16(buffer, &mut pcm);
	}

	std::fs::write(output, &pcm).with_context(|| format!("failed to write {}", output.display()))?;

	Ok(())
}

fn units(header: adts::Header, frames: Vec<Bytes>) -> anyhow::Result<Vec<InputUnit>> {
	let duration = Timestamp::from_frames(header.samples as u64, header.sample_rate)?;

	frames
		.into_iter()
		.enumerate()
		.map(|(index, frame)| -> anyhow::Result<InputUnit> {
			let timestamp = Timestamp::from_frames(index as u64 * header.samples as u64, header.sample_rate)?;
			Ok(InputUnit::new(frame, timestamp).with_duration(duration.into()))
		})
		.collect()
}

#[cfg(feature = "ffmpeg")]
fn decode(
	sync: platform_decode::SyncConfig,
	config: AudioDecoderConfig,
	inputs: Vec<InputUnit>,
) -> anyhow::Result<Vec<AudioBuffer>> {
	use std::sync::Arc;

	let platform = Arc::new(platform_decode::transform::ffmpeg::FfmpegPlatform::new());
	let mut decoder = platform_decode::SyncAudioDecoder::new(platform, sync).context("failed to start decoder")?;

	decoder.initialize(config).context("failed to initialize decoder")?;
	let buffers = decoder.read(inputs).context("failed to decode")?;

	tracing::info!(
		channels = decoder.channels(),
		sample_rate = decoder.sample_rate(),
		frames = decoder.number_of_frames(),
		duration = ?decoder.duration(),
		"decoded"
	);

	Ok(buffers)
}

#[cfg(not(feature = "ffmpeg"))]
fn decode(
	_sync: platform_decode::SyncConfig,
	_config: AudioDecoderConfig,
	_inputs: Vec<InputUnit>,
) -> anyhow::Result<Vec<AudioBuffer>> {
	anyhow::bail!("no platform backend compiled in; rebuild with --features ffmpeg")
}

/// Append the buffer to `out` as interleaved little-endian 16-bit samples.
fn write_s16(buffer: &AudioBuffer, out: &mut Vec<u8>) {
	if buffer.format == SampleFormat::S16 {
		out.extend_from_slice(&buffer.data);
		return;
	}

	let planes = buffer.to_planar_f32();
	for frame in 0..buffer.frames() {
		for plane in &planes {
			let sample = (plane[frame] * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
			out.extend_from_slice(&sample.to_le_bytes());
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn header() -> adts::Header {
		adts::Header {
			sample_rate: 48_000,
			channels: 2,
			length: 0,
			samples: 1024,
		}
	}

	#[test]
	fn test_units() {
		let frames = vec![Bytes::from_static(b"a"), Bytes::from_static(b"b"), Bytes::from_static(b"c")];
		let units = units(header(), frames).unwrap();

		assert_eq!(units.len(), 3);
		assert_eq!(units[0].timestamp(), Timestamp::ZERO);
		assert_eq!(units[2].timestamp(), Timestamp::from_micros(42_667));
		assert_eq!(
			units[1].timing.duration,
			Some(std::time::Duration::from_micros(21_333))
		);
	}

	#[test]
	fn test_write_s16_converts() {
		let buffer = AudioBuffer {
			timestamp: None,
			format: SampleFormat::S32,
			channel_layout: ChannelLayout::Mono,
			channels: 1,
			sample_rate: 48_000,
			data: Bytes::from((i32::MAX / 2 + 1).to_le_bytes().to_vec()),
		};

		let mut out = Vec::new();
		write_s16(&buffer, &mut out);
		assert_eq!(out, 16384i16.to_le_bytes());
	}
}
