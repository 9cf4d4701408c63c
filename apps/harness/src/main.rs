#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::dbg_macro,
	deprecated
)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

use harness_process_supervisor::ProcessManager;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::runtime::Builder;
use tracing::{error, info, warn};

mod commands;
mod config;
mod logging;
mod shell;
mod table;

use config::{ConfigSource, HarnessConfig};

#[derive(Parser, Debug)]
#[command(name = "harness", about = "Process manager shell for local node test networks")]
struct Cli {
	/// Path to the harness configuration file
	#[arg(long, default_value = "harness.toml")]
	config: PathBuf,

	/// Tracing filter, overrides the one in the configuration file
	#[arg(long)]
	log_filter: Option<String>,

	/// Also write logs to this file, overrides the one in the configuration file
	#[arg(long)]
	log_file: Option<PathBuf>,

	/// Run the commands in this file instead of reading them from stdin
	#[arg(long)]
	script: Option<PathBuf>,
}

fn main() -> ExitCode {
	let cli = Cli::parse();

	let runtime = match Builder::new_multi_thread().enable_all().build() {
		Ok(runtime) => runtime,
		Err(e) => {
			eprintln!("Failed to start the async runtime: {e}");
			return ExitCode::FAILURE;
		}
	};

	let res = runtime.block_on(run(cli));

	// The stdin reader may still be parked on a blocking read
	runtime.shutdown_background();

	match res {
		Ok(true) => ExitCode::SUCCESS,
		Ok(false) => ExitCode::FAILURE,
		Err(e) => {
			if tracing::dispatcher::has_been_set() {
				error!(?e, "Harness failed;");
			} else {
				eprintln!("Error: {e:?}");
			}
			ExitCode::FAILURE
		}
	}
}

async fn run(cli: Cli) -> Result<bool> {
	let (mut config, source) = HarnessConfig::load(&cli.config)?;

	if let Some(filter) = cli.log_filter {
		config.log_filter = filter;
	}
	if let Some(log_file) = cli.log_file {
		config.log_file = Some(log_file);
	}

	logging::init(&config.log_filter, config.log_file.as_deref())
		.context("Failed to set up logging")?;

	match source {
		ConfigSource::File => info!(path = %cli.config.display(), "Loaded configuration"),
		ConfigSource::Default => warn!(
			path = %cli.config.display(),
			"No configuration file found, starting with an empty registry"
		),
	}

	let manager = Arc::new(ProcessManager::new());
	config.register(&manager).await?;

	let clean = if let Some(script) = cli.script {
		shell::script(manager, &script).await?
	} else {
		shell::interactive(manager).await?
	};

	info!(clean, "Harness exiting");

	Ok(clean)
}
