mod adts;
mod audio;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Clone)]
pub struct Cli {
	#[command(flatten)]
	log: platform_decode::Log,

	#[command(flatten)]
	sync: platform_decode::SyncConfig,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Clone)]
pub enum Command {
	/// Decode an ADTS AAC stream to interleaved 16-bit PCM.
	Audio {
		/// The ADTS file to decode.
		#[arg(long)]
		input: PathBuf,

		/// Where to write the raw PCM.
		#[arg(long)]
		output: PathBuf,

		/// Priming frames to discard from the start of the stream.
		#[arg(long, default_value_t = 0)]
		codec_delay: u32,
	},
}

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	cli.log.init();

	match cli.command {
		Command::Audio {
			input,
			output,
			codec_delay,
		} => audio::run(cli.sync, &input, &output, codec_delay),
	}
}
