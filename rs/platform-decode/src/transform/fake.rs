//! A scripted in-memory transform for exercising the engine.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::*;
use crate::Size;

type DecodeFn = Arc<dyn Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync>;

/// How the fake platform and its transforms behave.
///
/// Fields may be changed through [FakePlatform::update] while a transform is running.
#[derive(Clone)]
pub struct Script {
	pub available: bool,
	pub fail_create: bool,
	pub reject_input_type: bool,

	/// Offered by [Transform::output_available_types], in order.
	pub output_types: Vec<MediaType>,
	pub requirements: BufferRequirements,

	/// Number of inputs held back until more input or a drain arrives.
	pub lookahead: usize,

	/// Maps one input payload to the output payloads it produces.
	pub decode: DecodeFn,

	pub fail_input: bool,
	pub fail_output: bool,
	pub fail_drain: bool,

	/// Report a stream change before producing output number `.0` and switch to the types in `.1`.
	pub stream_change: Option<(usize, Vec<MediaType>)>,

	/// Keep reporting the stream change instead of reporting it once.
	pub repeat_stream_change: bool,
}

impl Script {
	/// AAC in, 16-bit PCM out, `frames` frames per input.
	pub fn audio(sample_rate: u32, channels: u32, frames: usize) -> Self {
		Self {
			available: true,
			fail_create: false,
			reject_input_type: false,
			output_types: pcm_types(sample_rate, channels),
			requirements: BufferRequirements {
				input_alignment: 16,
				output_size: 0,
				output_alignment: 0,
				provides_samples: true,
			},
			lookahead: 0,
			decode: Arc::new(move |_| vec![vec![0u8; frames * channels as usize * 2]]),
			fail_input: false,
			fail_output: false,
			fail_drain: false,
			stream_change: None,
			repeat_stream_change: false,
		}
	}

	/// H.264 in, YV12 out, one `size` frame per input written into a caller provided sample.
	pub fn video(size: Size) -> Self {
		let stride = (size.width as usize + 15) & !15;
		let rows = (size.height as usize + 15) & !15;
		let len = rows * stride * 3 / 2;

		Self {
			available: true,
			fail_create: false,
			reject_input_type: false,
			output_types: vec![
				MediaType::Video(VideoType {
					frame_size: Some(size),
					..VideoType::new(VideoSubtype::I420)
				}),
				MediaType::Video(VideoType {
					frame_size: Some(size),
					..VideoType::new(VideoSubtype::Yv12)
				}),
			],
			requirements: BufferRequirements {
				input_alignment: 0,
				output_size: len,
				output_alignment: 16,
				provides_samples: false,
			},
			lookahead: 0,
			decode: Arc::new(move |_| vec![vec![0x80u8; len]]),
			fail_input: false,
			fail_output: false,
			fail_drain: false,
			stream_change: None,
			repeat_stream_change: false,
		}
	}
}

/// Float first, then integer PCM, the way a platform AAC decoder lists them.
pub fn pcm_types(sample_rate: u32, channels: u32) -> Vec<MediaType> {
	let float = AudioType {
		channels: Some(channels),
		sample_rate: Some(sample_rate),
		bits_per_sample: Some(32),
		..AudioType::new(AudioSubtype::Float)
	};
	let pcm = AudioType {
		channels: Some(channels),
		sample_rate: Some(sample_rate),
		bits_per_sample: Some(16),
		..AudioType::new(AudioSubtype::Pcm)
	};
	vec![MediaType::Audio(float), MediaType::Audio(pcm)]
}

/// Everything the engine asked of the fake.
#[derive(Debug, Default, Clone)]
pub struct Record {
	pub created: usize,
	pub input_types: Vec<MediaType>,
	pub output_types: Vec<MediaType>,
	/// Payload, sample time and whether the memory met the input alignment.
	pub inputs: Vec<(Vec<u8>, Option<i64>, bool)>,
	pub messages: Vec<Message>,
}

struct Shared {
	script: Script,
	record: Record,
}

#[derive(Clone)]
pub struct FakePlatform {
	shared: Arc<Mutex<Shared>>,
}

impl FakePlatform {
	pub fn new(script: Script) -> Self {
		Self {
			shared: Arc::new(Mutex::new(Shared {
				script,
				record: Record::default(),
			})),
		}
	}

	pub fn update(&self, f: impl FnOnce(&mut Script)) {
		f(&mut self.shared.lock().unwrap().script);
	}

	pub fn record(&self) -> Record {
		self.shared.lock().unwrap().record.clone()
	}
}

impl Platform for FakePlatform {
	fn is_available(&self, _codec: CodecId) -> bool {
		self.shared.lock().unwrap().script.available
	}

	fn create(&self, _codec: CodecId) -> Result<Box<dyn Transform>, TransformError> {
		let mut shared = self.shared.lock().unwrap();
		if shared.script.fail_create {
			return Err(TransformError::ModuleNotFound);
		}
		shared.record.created += 1;

		Ok(Box::new(FakeTransform {
			shared: self.shared.clone(),
			input_type: None,
			output_type: None,
			held: VecDeque::new(),
			ready: VecDeque::new(),
			produced: 0,
		}))
	}
}

struct FakeTransform {
	shared: Arc<Mutex<Shared>>,
	input_type: Option<MediaType>,
	output_type: Option<MediaType>,

	// Decoded payloads waiting on lookahead, and those ready to be returned.
	held: VecDeque<(Vec<u8>, Option<i64>)>,
	ready: VecDeque<(Vec<u8>, Option<i64>)>,
	produced: usize,
}

impl Transform for FakeTransform {
	fn set_input_type(&mut self, media_type: &MediaType) -> Result<(), TransformError> {
		let mut shared = self.shared.lock().unwrap();
		shared.record.input_types.push(media_type.clone());
		if shared.script.reject_input_type {
			return Err(TransformError::InvalidMediaType);
		}
		self.input_type = Some(media_type.clone());
		Ok(())
	}

	fn output_available_types(&mut self) -> Result<Vec<MediaType>, TransformError> {
		if self.input_type.is_none() {
			return Err(TransformError::TypeNotSet);
		}
		Ok(self.shared.lock().unwrap().script.output_types.clone())
	}

	fn set_output_type(&mut self, media_type: &MediaType) -> Result<(), TransformError> {
		let mut shared = self.shared.lock().unwrap();
		shared.record.output_types.push(media_type.clone());
		if !shared.script.output_types.contains(media_type) {
			return Err(TransformError::InvalidMediaType);
		}
		self.output_type = Some(media_type.clone());
		Ok(())
	}

	fn buffer_requirements(&self) -> Result<BufferRequirements, TransformError> {
		if self.output_type.is_none() {
			return Err(TransformError::TypeNotSet);
		}
		Ok(self.shared.lock().unwrap().script.requirements)
	}

	fn process_input(&mut self, sample: Sample) -> Result<(), TransformError> {
		let mut shared = self.shared.lock().unwrap();
		if shared.script.fail_input {
			return Err(TransformError::Platform(0x8000_4005u32 as i32));
		}

		let align = shared.script.requirements.input_alignment.max(1);
		let aligned = sample.buffer.as_ptr() as usize % align == 0;
		shared
			.record
			.inputs
			.push((sample.data().to_vec(), sample.time, aligned));

		for payload in (shared.script.decode)(sample.data()) {
			self.held.push_back((payload, sample.time));
		}
		while self.held.len() > shared.script.lookahead {
			if let Some(output) = self.held.pop_front() {
				self.ready.push_back(output);
			}
		}

		Ok(())
	}

	fn process_output(&mut self, output: &mut Option<Sample>) -> Result<OutputStatus, TransformError> {
		let mut shared = self.shared.lock().unwrap();
		if shared.script.fail_output {
			return Err(TransformError::Unexpected);
		}

		if self.ready.is_empty() {
			return Ok(OutputStatus::NeedMoreInput);
		}

		if matches!(shared.script.stream_change, Some((at, _)) if at == self.produced) {
			let change = match shared.script.repeat_stream_change {
				true => shared.script.stream_change.clone(),
				false => shared.script.stream_change.take(),
			};
			if let Some((_, types)) = change {
				shared.script.output_types = types;
			}
			self.output_type = None;
			return Ok(OutputStatus::StreamChange);
		}

		if self.output_type.is_none() {
			return Err(TransformError::TypeNotSet);
		}

		let Some((payload, time)) = self.ready.pop_front() else {
			return Ok(OutputStatus::NeedMoreInput);
		};

		if shared.script.requirements.provides_samples {
			*output = Some(Sample::copy_from(&payload, time));
		} else {
			let sample = output.as_mut().ok_or(TransformError::BufferTooSmall)?;
			if payload.len() > sample.buffer.max_len() {
				return Err(TransformError::BufferTooSmall);
			}
			sample.buffer.data_mut()[..payload.len()].copy_from_slice(&payload);
			sample.buffer.set_len(payload.len())?;
			sample.time = time;
		}

		self.produced += 1;
		Ok(OutputStatus::Produced)
	}

	fn process_message(&mut self, message: Message) -> Result<(), TransformError> {
		let mut shared = self.shared.lock().unwrap();
		shared.record.messages.push(message);

		match message {
			Message::Flush => {
				self.held.clear();
				self.ready.clear();
			}
			Message::Drain => {
				if shared.script.fail_drain {
					return Err(TransformError::Unexpected);
				}
				self.ready.extend(self.held.drain(..));
			}
		}

		Ok(())
	}
}
