mod audio;
mod config;
mod input;
mod timestamp;
mod video;

pub use audio::*;
pub use config::*;
pub use input::*;
pub use timestamp::*;
pub use video::*;
