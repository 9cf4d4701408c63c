use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("process name cannot be empty")]
	EmptyName,
	#[error("process <name='{0}'> already exists")]
	AlreadyExists(String),
	#[error("process <name='{0}'> does not exist")]
	NotFound(String),

	#[error("process <name='{0}'> is already running")]
	AlreadyRunning(String),
	#[error("process <name='{0}'> is already being started")]
	StartInProgress(String),
	#[error("process <name='{0}'> is not running")]
	NotRunning(String),

	#[error("failed to spawn process <name='{name}'>: {source}")]
	Spawn {
		name: String,
		#[source]
		source: io::Error,
	},
	#[error("failed to deliver {signal} to process <name='{name}'>: {source}")]
	Signal {
		name: String,
		signal: &'static str,
		#[source]
		source: io::Error,
	},
	#[error("process <name='{name}'> exited without being asked to: {status}")]
	OrganicExit { name: String, status: String },

	#[error("control loop of process <name='{0}'> ended without answering")]
	ControlLoopGone(String),
}

/// Coarse classification of [`Error`], for callers that only care about the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Name,
	State,
	Spawn,
	Signal,
	OrganicExit,
	Internal,
}

impl Error {
	#[must_use]
	pub const fn kind(&self) -> ErrorKind {
		match self {
			Self::EmptyName | Self::AlreadyExists(_) | Self::NotFound(_) => ErrorKind::Name,
			Self::AlreadyRunning(_) | Self::StartInProgress(_) | Self::NotRunning(_) => {
				ErrorKind::State
			}
			Self::Spawn { .. } => ErrorKind::Spawn,
			Self::Signal { .. } => ErrorKind::Signal,
			Self::OrganicExit { .. } => ErrorKind::OrganicExit,
			Self::ControlLoopGone(_) => ErrorKind::Internal,
		}
	}
}
