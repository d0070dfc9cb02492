use crate::transform::TransformError;

/// A list of possible errors reported by a decoder.
///
/// Raw [TransformError]s are mapped to exactly one of these before reaching the caller.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
	/// The config is not supported by this decoder or by the platform.
	#[error("unsupported configuration")]
	UnsupportedConfiguration,

	/// The platform module could not be loaded or the transform could not be instantiated.
	#[error("failed to create decoder")]
	DecoderCreationFailed,

	/// No acceptable input or output media type could be negotiated.
	#[error("format negotiation failed")]
	FormatNegotiationFailed,

	/// The transform refused an input sample.
	#[error("submission failed")]
	SubmissionFailed,

	/// Draining at end-of-stream failed.
	#[error("malformed bitstream")]
	MalformedBitstream,

	/// The transform failed while producing output.
	#[error("platform decode failure")]
	PlatformDecodeFailure,

	/// The decoder is not in a state that accepts this call.
	#[error("invalid state: {0}")]
	InvalidState(crate::State),

	/// A blocking call did not complete in time.
	#[error("timeout")]
	Timeout,

	/// The sequence running the decoder has gone away.
	#[error("closed")]
	Closed,
}

impl Error {
	/// The status code reported to a media pipeline.
	pub fn status(&self) -> Status {
		match self {
			Self::UnsupportedConfiguration => Status::UnsupportedConfig,
			Self::DecoderCreationFailed | Self::FormatNegotiationFailed => Status::FailedToCreateDecoder,
			Self::MalformedBitstream => Status::MalformedBitstream,
			Self::SubmissionFailed | Self::PlatformDecodeFailure | Self::InvalidState(_) => {
				Status::PlatformDecodeFailure
			}
			Self::Timeout | Self::Closed => Status::Aborted,
		}
	}
}

/// Decoder status codes, mirroring what a media pipeline expects from a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Status {
	#[display("ok")]
	Ok,
	#[display("unsupported config")]
	UnsupportedConfig,
	#[display("failed to create decoder")]
	FailedToCreateDecoder,
	#[display("malformed bitstream")]
	MalformedBitstream,
	#[display("platform decode failure")]
	PlatformDecodeFailure,
	#[display("aborted")]
	Aborted,
}

impl<T> From<&Result<T>> for Status {
	fn from(result: &Result<T>) -> Self {
		match result {
			Ok(_) => Status::Ok,
			Err(err) => err.status(),
		}
	}
}

impl From<TransformError> for Error {
	fn from(err: TransformError) -> Self {
		tracing::warn!(%err, "transform error");
		Error::PlatformDecodeFailure
	}
}

pub type Result<T> = std::result::Result<T, Error>;
