use std::{
	fs::{self, OpenOptions},
	path::Path,
	sync::Mutex,
};

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Console logging on stderr, plus a plain-text file layer when `log_file` is set.
///
/// `RUST_LOG` wins over `filter` when present.
pub fn init(filter: &str, log_file: Option<&Path>) -> Result<()> {
	let filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(filter))
		.with_context(|| format!("Invalid log filter '{filter}'"))?;

	let file_layer = log_file
		.map(|path| -> Result<_> {
			if let Some(parent) = path.parent() {
				fs::create_dir_all(parent)?;
			}

			let file = OpenOptions::new()
				.create(true)
				.append(true)
				.open(path)
				.with_context(|| format!("Failed to open log file {}", path.display()))?;

			Ok(fmt::layer()
				.with_writer(Mutex::new(file))
				.with_ansi(false)
				.with_target(true)
				.with_line_number(true))
		})
		.transpose()?;

	let console_layer = fmt::layer()
		.with_writer(std::io::stderr)
		.with_target(false);

	tracing_subscriber::registry()
		.with(filter)
		.with(console_layer)
		.with(file_layer)
		.try_init()?;

	Ok(())
}
