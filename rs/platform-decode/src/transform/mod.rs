//! The seam between the decode engine and a platform codec.
//!
//! A [Transform] is a stateful, synchronous codec object with one input and one output port.
//! Both ports are configured with a [MediaType] before any data flows.
//! Input is pushed with [Transform::process_input] and output is polled with [Transform::process_output]
//! until the transform reports it needs more input.
//!
//! The engine never sees platform specifics: a [Platform] locates the codec module and instantiates transforms.

mod media_type;
mod sample;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

#[cfg(test)]
pub(crate) mod fake;

pub use media_type::*;
pub use sample::*;

/// Raw failures reported by a transform.
///
/// These never escape the engine; they are logged and mapped to a [crate::Error].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransformError {
	#[error("invalid media type")]
	InvalidMediaType,

	#[error("media type not set")]
	TypeNotSet,

	/// The transform holds output that must be drained before it takes more input.
	#[error("not accepting input")]
	NotAccepting,

	#[error("buffer too small")]
	BufferTooSmall,

	#[error("codec module not found")]
	ModuleNotFound,

	#[error("unexpected")]
	Unexpected,

	#[error("platform error code=0x{0:08x}")]
	Platform(i32),
}

/// The codec object a transform is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum CodecId {
	#[display("aac")]
	Aac,
	#[display("h264")]
	H264,
}

/// Buffer sizes and alignment reported by a transform once both types are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferRequirements {
	/// Required alignment of input sample memory, in bytes.
	pub input_alignment: usize,

	/// Minimum size of an output sample, in bytes, when the caller allocates it.
	pub output_size: usize,

	/// Required alignment of output sample memory, in bytes.
	pub output_alignment: usize,

	/// The transform allocates its own output samples.
	pub provides_samples: bool,
}

/// The result of a successful [Transform::process_output] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStatus {
	/// One sample of output was written.
	Produced,
	/// No output is available until more input is provided.
	NeedMoreInput,
	/// The output format changed and the output type must be set again.
	StreamChange,
}

/// Commands sent to a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
	/// Discard all buffered input and output.
	Flush,
	/// Produce output for everything buffered; no more input follows.
	Drain,
}

/// A stateful platform codec.
pub trait Transform: Send {
	fn set_input_type(&mut self, media_type: &MediaType) -> Result<(), TransformError>;

	/// The output types the transform can produce for the current input type, in preference order.
	fn output_available_types(&mut self) -> Result<Vec<MediaType>, TransformError>;

	fn set_output_type(&mut self, media_type: &MediaType) -> Result<(), TransformError>;

	fn buffer_requirements(&self) -> Result<BufferRequirements, TransformError>;

	fn process_input(&mut self, sample: Sample) -> Result<(), TransformError>;

	/// Produce at most one output sample.
	///
	/// When the caller allocated the output, `output` holds a sample to be overwritten.
	/// Otherwise `output` is `None` and the transform fills it on [OutputStatus::Produced].
	fn process_output(&mut self, output: &mut Option<Sample>) -> Result<OutputStatus, TransformError>;

	fn process_message(&mut self, message: Message) -> Result<(), TransformError>;
}

/// Locates codec modules and instantiates transforms.
pub trait Platform: Send + Sync {
	/// Whether the module implementing `codec` could be loaded.
	fn is_available(&self, codec: CodecId) -> bool;

	fn create(&self, codec: CodecId) -> Result<Box<dyn Transform>, TransformError>;
}
