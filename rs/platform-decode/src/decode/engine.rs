use std::sync::Arc;

use super::{BufferLogger, Kind, OutputTypeMatch};
use crate::transform::{BufferRequirements, MediaType, Message, OutputStatus, Platform, Sample, Transform, TransformError};
use crate::{Error, InputUnit, Result, TaskRunner};

/// Receives every decoded output unit, always from a task posted to the engine's sequence.
pub type OutputCallback<T> = Arc<dyn Fn(T) + Send + Sync>;

// A misbehaving transform could report format changes forever.
pub(crate) const MAX_STREAM_CHANGES: usize = 8;

/// The lifecycle of an [Engine].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::Display)]
pub enum State {
	#[default]
	#[display("uninitialized")]
	Uninitialized,
	#[display("configuring")]
	Configuring,
	#[display("ready")]
	Ready,
	#[display("decoding")]
	Decoding,
	#[display("draining")]
	Draining,
	#[display("resetting")]
	Resetting,
	#[display("error")]
	Error,
}

/// Media types and buffers negotiated with the transform.
#[derive(Debug, Default)]
struct Negotiated {
	input_type: Option<MediaType>,
	output_type: Option<MediaType>,
	requirements: BufferRequirements,

	// Reused for every output when the transform does not provide its own samples.
	output_sample: Option<Sample>,
}

/// Feeds compressed input to a platform transform and delivers what it decodes.
///
/// Every method must be called from the sequence owning `runner`.
/// Both output and completion callbacks are posted to that sequence, never run inline.
pub struct Engine<K: Kind> {
	kind: K,
	platform: Arc<dyn Platform>,
	runner: TaskRunner,

	state: State,
	config: Option<K::Config>,
	transform: Option<Box<dyn Transform>>,
	negotiated: Negotiated,
	output: Option<OutputCallback<K::Output>>,

	logger: BufferLogger,
}

impl<K: Kind> Engine<K> {
	pub fn new(platform: Arc<dyn Platform>, runner: TaskRunner) -> Self {
		Self {
			kind: K::default(),
			platform,
			runner,
			state: State::Uninitialized,
			config: None,
			transform: None,
			negotiated: Negotiated::default(),
			output: None,
			logger: BufferLogger::new(K::NAME),
		}
	}

	pub fn state(&self) -> State {
		self.state
	}

	pub fn config(&self) -> Option<&K::Config> {
		self.config.as_ref()
	}

	pub fn output_type(&self) -> Option<&MediaType> {
		self.negotiated.output_type.as_ref()
	}

	pub fn buffer_requirements(&self) -> BufferRequirements {
		self.negotiated.requirements
	}

	pub(crate) fn kind(&self) -> &K {
		&self.kind
	}

	fn debug_assert_sequence(&self) {
		debug_assert!(
			self.runner.runs_tasks_in_current_sequence(),
			"decoder used outside of its sequence"
		);
	}

	/// Create and configure a transform for `config`.
	///
	/// Any previous transform is torn down first.
	/// Decoding without an output callback fails once the first output is produced.
	pub fn initialize(&mut self, config: K::Config, output: Option<OutputCallback<K::Output>>) -> Result<()> {
		self.debug_assert_sequence();

		self.state = State::Configuring;
		self.transform = None;
		self.negotiated = Negotiated::default();

		match self.configure(config, output) {
			Ok(()) => {
				tracing::debug!(kind = K::NAME, output = ?self.negotiated.output_type, "decoder ready");
				self.state = State::Ready;
				Ok(())
			}
			Err(err) => {
				tracing::warn!(kind = K::NAME, %err, "failed to initialize decoder");
				self.transform = None;
				self.state = State::Error;
				Err(err)
			}
		}
	}

	fn configure(&mut self, config: K::Config, output: Option<OutputCallback<K::Output>>) -> Result<()> {
		if !K::is_config_supported(&config, self.platform.as_ref()) {
			return Err(Error::UnsupportedConfiguration);
		}

		let codec = K::codec(&config);
		let mut transform = self.platform.create(codec).map_err(|err| {
			tracing::warn!(%err, %codec, "failed to create transform");
			Error::DecoderCreationFailed
		})?;

		let input_type = K::input_type(&config);
		transform.set_input_type(&input_type).map_err(|err| {
			tracing::warn!(%err, ?input_type, "failed to set input type");
			Error::FormatNegotiationFailed
		})?;

		self.negotiated.input_type = Some(input_type);
		self.transform = Some(transform);
		self.config = Some(config);

		self.negotiate_output()?;

		if let Some(config) = &self.config {
			self.kind.reset_timestamp_state(config);
		}
		self.output = output;

		Ok(())
	}

	/// Pick an output type, then size the output sample for it.
	///
	/// Runs at configuration and again whenever the transform reports a stream change.
	fn negotiate_output(&mut self) -> Result<()> {
		let (Some(transform), Some(config)) = (self.transform.as_deref_mut(), self.config.as_ref()) else {
			return Err(Error::InvalidState(self.state));
		};

		let candidates = transform.output_available_types().map_err(|err| {
			tracing::warn!(%err, "failed to list output types");
			Error::FormatNegotiationFailed
		})?;

		let mut accepted = None;
		for candidate in candidates {
			match self.kind.accept_output_type(config, &candidate, &mut *transform) {
				OutputTypeMatch::Accept => {
					accepted = Some(candidate);
					break;
				}
				OutputTypeMatch::KeepSearching => continue,
				OutputTypeMatch::Reject => {
					tracing::warn!(?candidate, "output type rejected");
					return Err(Error::FormatNegotiationFailed);
				}
			}
		}

		let Some(output_type) = accepted else {
			tracing::warn!(kind = K::NAME, "no acceptable output type");
			return Err(Error::FormatNegotiationFailed);
		};

		let requirements = transform.buffer_requirements().map_err(|err| {
			tracing::warn!(%err, "failed to get buffer requirements");
			Error::FormatNegotiationFailed
		})?;

		self.negotiated.output_sample = match requirements.provides_samples {
			true => None,
			false => {
				let (size, align) = K::output_buffer_size(&requirements);
				Some(Sample::allocate(size, align))
			}
		};
		self.negotiated.requirements = requirements;
		self.negotiated.output_type = Some(output_type);

		Ok(())
	}

	/// Submit one input unit, or drain at end of stream.
	///
	/// Outputs produced along the way are posted before `done`.
	pub fn decode<F>(&mut self, unit: InputUnit, done: F)
	where
		F: FnOnce(Result<()>) + Send + 'static,
	{
		self.debug_assert_sequence();

		let result = self.decode_unit(unit);
		self.runner.post_task(move || done(result));
	}

	fn decode_unit(&mut self, unit: InputUnit) -> Result<()> {
		if self.state != State::Ready {
			return Err(Error::InvalidState(self.state));
		}

		self.logger.log_input(&unit);

		if unit.end_of_stream {
			self.state = State::Draining;
			let result = self.drain();
			self.state = State::Ready;

			return result.map_err(|err| {
				tracing::warn!(%err, "drain did not succeed");
				Error::MalformedBitstream
			});
		}

		self.state = State::Decoding;

		if let Err(err) = self.submit(&unit) {
			self.state = State::Ready;
			return Err(err);
		}

		self.kind.record_input(&unit.timing);

		match self.process_output_loop() {
			Ok(()) => {
				self.state = State::Ready;
				Ok(())
			}
			Err(err) => {
				tracing::warn!(%err, timestamp = %unit.timestamp(), "processing buffer failed");
				self.state = State::Error;
				Err(Error::PlatformDecodeFailure)
			}
		}
	}

	fn submit(&mut self, unit: &InputUnit) -> Result<()> {
		let transform = self.transform.as_deref_mut().ok_or(Error::InvalidState(self.state))?;

		let sample = Sample::from_input(unit, self.negotiated.requirements.input_alignment).map_err(|err| {
			tracing::warn!(%err, "failed to create input sample");
			Error::SubmissionFailed
		})?;

		transform.process_input(sample).map_err(|err| {
			// Output is always drained after input, so the transform can't be holding any.
			debug_assert_ne!(err, TransformError::NotAccepting, "transform neither producing nor accepting");
			tracing::warn!(%err, "failed to submit input");
			Error::SubmissionFailed
		})
	}

	fn drain(&mut self) -> Result<()> {
		let transform = self.transform.as_deref_mut().ok_or(Error::InvalidState(self.state))?;
		transform.process_message(Message::Drain)?;

		self.process_output_loop()
	}

	/// Pull output until the transform needs more input.
	fn process_output_loop(&mut self) -> Result<()> {
		let mut stream_changes = 0;

		loop {
			let transform = self.transform.as_deref_mut().ok_or(Error::InvalidState(self.state))?;

			let mut sample = self.negotiated.output_sample.take();
			if let Some(sample) = &mut sample {
				// The whole buffer is available again.
				sample.buffer.set_len(0)?;
				sample.time = None;
			}

			let status = transform.process_output(&mut sample);

			match status {
				Ok(OutputStatus::Produced) => {
					stream_changes = 0;

					let Some(produced) = sample else {
						tracing::warn!("transform produced output without a sample");
						return Err(Error::PlatformDecodeFailure);
					};

					let result = self.process_sample(&produced);
					if !self.negotiated.requirements.provides_samples {
						self.negotiated.output_sample = Some(produced);
					}
					result?;
				}
				Ok(OutputStatus::NeedMoreInput) => {
					self.restore_sample(sample);
					return Ok(());
				}
				Ok(OutputStatus::StreamChange) => {
					tracing::debug!(kind = K::NAME, "stream change");

					stream_changes += 1;
					if stream_changes > MAX_STREAM_CHANGES {
						tracing::warn!(stream_changes, "too many stream changes without output");
						return Err(Error::PlatformDecodeFailure);
					}

					// Renegotiation allocates a fresh sample.
					self.negotiate_output()?;
				}
				Err(err) => {
					self.restore_sample(sample);
					tracing::warn!(%err, "failed to process output");
					return Err(Error::PlatformDecodeFailure);
				}
			}
		}
	}

	fn restore_sample(&mut self, sample: Option<Sample>) {
		if !self.negotiated.requirements.provides_samples {
			self.negotiated.output_sample = sample;
		}
	}

	fn process_sample(&mut self, sample: &Sample) -> Result<()> {
		let config = self.config.as_ref().ok_or(Error::InvalidState(self.state))?;

		let timestamp = sample.timestamp();
		self.logger.log_output(timestamp, sample.data());

		let Some(output) = self.kind.build_output(config, sample.data(), timestamp) else {
			tracing::warn!(kind = K::NAME, size = sample.data().len(), "failed to build output");
			return Err(Error::PlatformDecodeFailure);
		};

		let Some(output) = self.kind.finish_output(output) else {
			return Ok(());
		};

		let Some(callback) = self.output.clone() else {
			tracing::warn!(kind = K::NAME, "no output callback");
			return Err(Error::Closed);
		};

		self.runner.post_task(move || callback(output));
		Ok(())
	}

	/// Discard buffered input and output, and restart timestamp tracking.
	pub fn reset<F>(&mut self, done: F)
	where
		F: FnOnce() + Send + 'static,
	{
		self.debug_assert_sequence();

		let previous = self.state;
		if previous == State::Ready {
			self.state = State::Resetting;
		}

		if let Some(transform) = self.transform.as_deref_mut() {
			// Seeking may fail if the transform isn't flushed.
			if let Err(err) = transform.process_message(Message::Flush) {
				tracing::warn!(%err, "failed to flush transform");
			}
		}

		if let Some(config) = &self.config {
			self.kind.reset_timestamp_state(config);
		}

		self.state = previous;
		self.runner.post_task(done);
	}
}

impl<K: Kind> std::fmt::Debug for Engine<K> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Engine")
			.field("kind", &K::NAME)
			.field("state", &self.state)
			.field("negotiated", &self.negotiated)
			.finish()
	}
}
