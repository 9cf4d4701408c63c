//! Harness configuration file

use harness_process_supervisor::{ProcessManager, ProcessSpec};

use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Where a loaded [`HarnessConfig`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
	File,
	Default,
}

/// Main harness configuration, read from a TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
	/// Tracing filter directives, e.g. `info,harness_process_supervisor=debug`
	pub log_filter: String,

	/// Also write logs to this file (without colors)
	pub log_file: Option<PathBuf>,

	/// Processes registered at startup
	#[serde(rename = "process")]
	pub processes: Vec<ProcessConfig>,
}

/// One `[[process]]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessConfig {
	pub name: String,
	pub command: String,
	#[serde(default)]
	pub args: Vec<String>,
	#[serde(default)]
	pub category: String,
	/// Opaque, usually JSON, handed back verbatim by `procmanager metadata`
	#[serde(default)]
	pub metadata: String,
	/// Start right after registration
	#[serde(default)]
	pub autostart: bool,
}

impl Default for HarnessConfig {
	fn default() -> Self {
		Self {
			log_filter: "info".to_string(),
			log_file: None,
			processes: Vec::new(),
		}
	}
}

impl From<&ProcessConfig> for ProcessSpec {
	fn from(config: &ProcessConfig) -> Self {
		Self::new(&config.name, &config.command)
			.with_args(&config.args)
			.with_category(&config.category)
			.with_metadata(&config.metadata)
	}
}

impl HarnessConfig {
	/// Load the configuration at `path`, falling back to defaults if there is no such file.
	///
	/// Runs before logging is set up, so the caller reports the [`ConfigSource`].
	pub fn load(path: &Path) -> Result<(Self, ConfigSource)> {
		if !path.exists() {
			return Ok((Self::default(), ConfigSource::Default));
		}

		let contents = fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file {}", path.display()))?;

		let config = Self::parse(&contents)
			.with_context(|| format!("Failed to parse config file {}", path.display()))?;

		Ok((config, ConfigSource::File))
	}

	pub fn parse(contents: &str) -> Result<Self> {
		Ok(toml::from_str(contents)?)
	}

	/// Register every configured process, then start the ones marked `autostart`.
	///
	/// Registration errors (blank or duplicate names) are fatal, start failures are only logged.
	pub async fn register(&self, manager: &ProcessManager) -> Result<()> {
		for process in &self.processes {
			manager
				.add_process(process.into())
				.await
				.with_context(|| format!("Failed to register process '{}'", process.name))?;
		}

		info!(count = self.processes.len(), "Registered configured processes");

		for process in self.processes.iter().filter(|process| process.autostart) {
			if let Err(e) = manager.start_process(&process.name).await {
				warn!(%e, name = %process.name, "Failed to autostart process;");
			}
		}

		Ok(())
	}
}
