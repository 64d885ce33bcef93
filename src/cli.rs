use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "quasar", about = "A distributed, partitioned, replicated graph database")]
pub struct Cli {
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Start a combined meta, graph and storage process
	Start {
		/// Path to the JSON configuration file
		#[arg(short, long, env = "QUASAR_CONFIG")]
		config: Option<PathBuf>,
		/// The address the admin HTTP surface binds to
		#[arg(short, long, default_value = "127.0.0.1:11000")]
		bind: String,
		/// Where partition data and checkpoints live
		#[arg(short, long, default_value = "data")]
		data_dir: PathBuf,
	},
	/// Print the server version
	Version,
}
