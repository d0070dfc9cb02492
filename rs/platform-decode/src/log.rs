use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Logging configuration, flattened into command line configs.
#[derive(clap::Args, Clone, Debug)]
pub struct Log {
	/// The default log level; `RUST_LOG` overrides it per target.
	#[arg(id = "log-level", long = "log-level", default_value = "info", env = "PLATFORM_DECODE_LOG_LEVEL")]
	pub level: tracing::Level,
}

impl Default for Log {
	fn default() -> Self {
		Self {
			level: tracing::Level::INFO,
		}
	}
}

impl Log {
	pub fn new(level: tracing::Level) -> Self {
		Self { level }
	}

	/// Install a global subscriber writing to stderr.
	///
	/// Does nothing if a subscriber is already installed.
	pub fn init(&self) {
		let filter = EnvFilter::builder()
			.with_default_directive(LevelFilter::from_level(self.level).into())
			.from_env_lossy();

		let fmt = tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.with_target(true);

		if tracing_subscriber::registry().with(filter).with(fmt).try_init().is_err() {
			tracing::debug!("subscriber already installed");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::Parser;

	#[derive(Parser)]
	struct Cli {
		#[command(flatten)]
		log: Log,
	}

	#[test]
	fn test_parse_level() {
		let cli = Cli::try_parse_from(["test", "--log-level", "trace"]).unwrap();
		assert_eq!(cli.log.level, tracing::Level::TRACE);

		assert!(Cli::try_parse_from(["test", "--log-level", "loud"]).is_err());
	}
}
