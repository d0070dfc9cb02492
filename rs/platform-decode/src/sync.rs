//! A blocking facade over the asynchronous audio decoder.
//!
//! Used for one-shot decoding, where the caller has all of the input up front and wants PCM back.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::transform::Platform;
use crate::{AudioBuffer, AudioDecoder, AudioDecoderConfig, Error, InputUnit, OutputCallback, Result, Sequence, Timestamp};

/// Configuration for [SyncAudioDecoder].
#[derive(clap::Args, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct SyncConfig {
	/// How long a blocking call waits for the decoder before giving up.
	#[arg(
		id = "decode-timeout",
		long = "decode-timeout",
		default_value = "10s",
		value_parser = humantime::parse_duration,
		env = "PLATFORM_DECODE_TIMEOUT"
	)]
	#[serde(with = "humantime_serde")]
	pub timeout: Duration,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			timeout: Duration::from_secs(10),
		}
	}
}

// Outputs and completions, in the order the sequence ran them.
// A completion owns every output received since the previous completion.
enum Event {
	Output(AudioBuffer),
	Done(u64, Result<()>),
}

/// Runs an [AudioDecoder] on a dedicated thread and blocks the caller until each call completes.
pub struct SyncAudioDecoder {
	config: SyncConfig,
	seq: Sequence<AudioDecoder>,

	events: Option<(mpsc::Sender<Event>, mpsc::Receiver<Event>)>,
	// Bumped by every read, so a read abandoned on error can't leak into the next one.
	generation: u64,

	channels: u32,
	sample_rate: u32,
	frames: u64,

	shutdown: Option<oneshot::Sender<()>>,
	thread: Option<JoinHandle<()>>,
}

impl SyncAudioDecoder {
	pub fn new(platform: Arc<dyn Platform>, config: SyncConfig) -> std::io::Result<Self> {
		let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
		let seq = Sequence::spawn_on(runtime.handle(), move |runner| AudioDecoder::new(platform, runner));

		let (shutdown, closed) = oneshot::channel::<()>();
		let thread = std::thread::Builder::new()
			.name("platform-decode".into())
			.spawn(move || {
				let _ = runtime.block_on(closed);
			})?;

		Ok(Self {
			config,
			seq,
			events: None,
			generation: 0,
			channels: 0,
			sample_rate: 0,
			frames: 0,
			shutdown: Some(shutdown),
			thread: Some(thread),
		})
	}

	fn wait<T>(&self, rx: &mpsc::Receiver<T>, deadline: Instant) -> Result<T> {
		let remaining = deadline.saturating_duration_since(Instant::now());
		rx.recv_timeout(remaining).map_err(|err| match err {
			mpsc::RecvTimeoutError::Timeout => {
				tracing::warn!(timeout = ?self.config.timeout, "decoder timed out");
				Error::Timeout
			}
			mpsc::RecvTimeoutError::Disconnected => Error::Closed,
		})
	}

	pub fn initialize(&mut self, config: AudioDecoderConfig) -> Result<()> {
		let deadline = Instant::now() + self.config.timeout;

		let (tx, events) = mpsc::channel();
		let sender = tx.clone();
		let output: OutputCallback<AudioBuffer> = Arc::new(move |buffer| {
			let _ = sender.send(Event::Output(buffer));
		});

		let (done, result) = mpsc::channel();
		let posted = self.seq.post(move |decoder| {
			let result = decoder
				.initialize(config, Some(output))
				.map(|()| (decoder.channels(), decoder.sample_rate()));
			let _ = done.send(result);
		});
		if !posted {
			return Err(Error::Closed);
		}

		let (channels, sample_rate) = self.wait(&result, deadline)??;

		self.events = Some((tx, events));
		self.channels = channels;
		self.sample_rate = sample_rate;
		self.frames = 0;

		Ok(())
	}

	/// Decode every input followed by end of stream, returning the decoded buffers in order.
	pub fn read<I>(&mut self, inputs: I) -> Result<Vec<AudioBuffer>>
	where
		I: IntoIterator<Item = InputUnit>,
	{
		let deadline = Instant::now() + self.config.timeout;
		let (sender, events) = self.events.as_ref().ok_or(Error::InvalidState(crate::State::Uninitialized))?;

		self.generation += 1;
		let generation = self.generation;

		let mut submitted = 0;
		for unit in inputs.into_iter().chain(std::iter::once(InputUnit::end_of_stream())) {
			let done = sender.clone();
			let posted = self.seq.post(move |decoder| {
				decoder.decode(unit, move |result| {
					let _ = done.send(Event::Done(generation, result));
				})
			});
			if !posted {
				return Err(Error::Closed);
			}
			submitted += 1;
		}

		let mut buffers = Vec::new();
		let mut outputs = Vec::new();
		let mut completed = 0;

		while completed < submitted {
			match self.wait(events, deadline)? {
				Event::Output(buffer) => outputs.push(buffer),
				Event::Done(done, result) => {
					let owned = std::mem::take(&mut outputs);
					if done != generation {
						tracing::debug!(generation = done, dropped = owned.len(), "dropping stale outputs");
						continue;
					}

					result?;
					buffers.extend(owned);
					completed += 1;
				}
			}
		}

		self.frames += buffers.iter().map(|buffer| buffer.frames() as u64).sum::<u64>();

		Ok(buffers)
	}

	/// Like [Self::read], concatenated into one `f32` vector per channel.
	pub fn read_planar<I>(&mut self, inputs: I) -> Result<Vec<Vec<f32>>>
	where
		I: IntoIterator<Item = InputUnit>,
	{
		let mut planes = vec![Vec::new(); self.channels as usize];
		for buffer in self.read(inputs)? {
			for (plane, samples) in planes.iter_mut().zip(buffer.to_planar_f32()) {
				plane.extend(samples);
			}
		}
		Ok(planes)
	}

	pub fn channels(&self) -> u32 {
		self.channels
	}

	pub fn sample_rate(&self) -> u32 {
		self.sample_rate
	}

	/// Frames decoded since [Self::initialize].
	pub fn number_of_frames(&self) -> u64 {
		self.frames
	}

	pub fn duration(&self) -> Duration {
		Timestamp::from_frames(self.frames, self.sample_rate)
			.map(Duration::from)
			.unwrap_or_default()
	}
}

impl Drop for SyncAudioDecoder {
	fn drop(&mut self) {
		if let Some(shutdown) = self.shutdown.take() {
			let _ = shutdown.send(());
		}
		if let Some(thread) = self.thread.take() {
			if thread.join().is_err() {
				tracing::warn!("decoder thread panicked");
			}
		}
	}
}
