//! Drives a platform [Transform](crate::transform::Transform) to decode one stream.
//!
//! [Engine] holds the state machine shared by every media kind.
//! The kind specific policy lives behind [Kind], with [Audio] and [Video] implementations.

mod audio;
mod discard;
mod engine;
mod logger;
mod video;

pub use audio::*;
pub use discard::*;
pub use engine::*;
pub use logger::*;
pub use video::*;

use crate::transform::{BufferRequirements, CodecId, MediaType, Platform, Transform};
use crate::{TimeInfo, Timestamp};

/// The verdict on one output type offered by the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTypeMatch {
	/// The type was set on the transform; stop searching.
	Accept,
	/// Not a type this kind can use; try the next one.
	KeepSearching,
	/// The type looked usable but could not be applied; negotiation fails.
	Reject,
}

/// Media kind specific policy plugged into the [Engine].
pub trait Kind: Default + Send + 'static {
	type Config: Clone + Send + 'static;
	type Output: Send + 'static;

	/// Used when logging.
	const NAME: &'static str;

	fn codec(config: &Self::Config) -> CodecId;

	/// Whether `config` can be decoded at all, including whether the platform module is loadable.
	fn is_config_supported(config: &Self::Config, platform: &dyn Platform) -> bool;

	fn input_type(config: &Self::Config) -> MediaType;

	/// Inspect one candidate output type, setting it on `transform` when usable.
	fn accept_output_type(
		&mut self,
		config: &Self::Config,
		candidate: &MediaType,
		transform: &mut dyn Transform,
	) -> OutputTypeMatch;

	/// The size and alignment of a caller allocated output sample.
	fn output_buffer_size(requirements: &BufferRequirements) -> (usize, usize) {
		(requirements.output_size, requirements.output_alignment)
	}

	/// Turn the bytes of one output sample into an output unit.
	fn build_output(&mut self, config: &Self::Config, data: &[u8], timestamp: Timestamp) -> Option<Self::Output>;

	/// Called after every accepted input.
	fn record_input(&mut self, _timing: &TimeInfo) {}

	/// Last chance to adjust or drop an output before it is delivered.
	fn finish_output(&mut self, output: Self::Output) -> Option<Self::Output> {
		Some(output)
	}

	fn reset_timestamp_state(&mut self, config: &Self::Config);
}
