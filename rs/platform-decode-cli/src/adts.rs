use bytes::{Buf, Bytes};

const SAMPLE_RATES: [u32; 13] = [
	96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// The fields of an ADTS header needed to configure a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
	pub sample_rate: u32,
	pub channels: u32,

	/// The length of the frame including the header.
	pub length: usize,

	/// PCM frames per channel decoded from this ADTS frame.
	pub samples: u32,
}

impl Header {
	pub fn decode<B: Buf>(buf: &mut B) -> anyhow::Result<Self> {
		anyhow::ensure!(buf.remaining() >= 7, "ADTS header must be at least 7 bytes");

		let mut header = [0u8; 7];
		buf.copy_to_slice(&mut header);

		anyhow::ensure!(
			header[0] == 0xff && header[1] & 0xf0 == 0xf0,
			"invalid ADTS sync word"
		);
		anyhow::ensure!(header[1] & 0x06 == 0, "invalid ADTS layer");

		let index = ((header[2] >> 2) & 0x0f) as usize;
		let sample_rate = *SAMPLE_RATES
			.get(index)
			.ok_or_else(|| anyhow::anyhow!("reserved sample rate index: {index}"))?;

		let channels = (((header[2] & 0x01) << 2) | (header[3] >> 6)) as u32;
		anyhow::ensure!(channels != 0, "in-band channel configuration is not supported");

		let length = (((header[3] & 0x03) as usize) << 11) | ((header[4] as usize) << 3) | ((header[5] >> 5) as usize);
		let protected = header[1] & 0x01 == 0;
		let header_len = if protected { 9 } else { 7 };
		anyhow::ensure!(length >= header_len, "ADTS frame length too short: {length}");

		let blocks = (header[6] & 0x03) as u32 + 1;

		Ok(Self {
			sample_rate,
			channels,
			length,
			samples: blocks * 1024,
		})
	}
}

/// Split an ADTS stream into frames, each including its header.
pub fn split(mut data: Bytes) -> anyhow::Result<(Header, Vec<Bytes>)> {
	let first = Header::decode(&mut data.clone())?;
	let mut frames = Vec::new();

	while data.has_remaining() {
		let header = Header::decode(&mut data.clone())?;
		anyhow::ensure!(data.remaining() >= header.length, "truncated ADTS frame");
		anyhow::ensure!(
			header.sample_rate == first.sample_rate && header.channels == first.channels,
			"ADTS format changed mid-stream"
		);

		frames.push(data.split_to(header.length));
	}

	Ok((first, frames))
}
