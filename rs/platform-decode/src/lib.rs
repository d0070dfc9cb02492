//! # platform-decode: media decoding through platform codec transforms
//!
//! `platform-decode` feeds compressed audio and video into a stateful, synchronous codec
//! object provided by the platform, and delivers what it decodes with accurate timing.
//!
//! ## Overview
//!
//! - **Transform**: the seam to the platform codec, see [transform::Transform].
//! - **Engine**: the decode state machine, generic over a media [Kind]: [AudioDecoder] and [VideoDecoder].
//! - **Sequence**: the single ordered execution context every decoder runs on.
//! - **Sync**: a blocking facade for one-shot audio decoding.
//!
//! Audio output timestamps are rebuilt from the input timing, with codec priming and padding trimmed.
//! Video timestamps come straight from the transform.
//!
mod error;
mod log;
mod sequence;
mod sync;

pub mod decode;
pub mod model;
pub mod transform;

pub use decode::*;
pub use error::*;
pub use log::*;
pub use model::*;
pub use sequence::*;
pub use sync::*;
