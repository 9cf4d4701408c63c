use std::fmt;

/// Status label shown to humans for a registered process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessStatus {
	Running,
	Stopped,
	/// Ended or failed to start without an explicit stop or kill.
	Defunct,
}

impl ProcessStatus {
	#[must_use]
	pub const fn from_flags(running: bool, failed: bool) -> Self {
		if running {
			Self::Running
		} else if failed {
			Self::Defunct
		} else {
			Self::Stopped
		}
	}

	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Running => "running",
			Self::Stopped => "stopped",
			Self::Defunct => "defunct",
		}
	}
}

impl fmt::Display for ProcessStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One row of [`ProcessManager::process_summary`](crate::ProcessManager::process_summary).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
	pub name: String,
	pub status: ProcessStatus,
	pub metadata: String,
	pub command: String,
}

impl ProcessSummary {
	/// Column titles matching [`ProcessSummary::to_row`].
	pub const HEADER: [&'static str; 4] = ["Name", "Status", "Metadata", "Command"];

	#[must_use]
	pub fn to_row(&self) -> [String; 4] {
		[
			self.name.clone(),
			self.status.to_string(),
			self.metadata.clone(),
			self.command.clone(),
		]
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn label_from_flags() {
		assert_eq!(ProcessStatus::from_flags(true, false), ProcessStatus::Running);
		assert_eq!(ProcessStatus::from_flags(false, true), ProcessStatus::Defunct);
		assert_eq!(ProcessStatus::from_flags(false, false), ProcessStatus::Stopped);
		assert_eq!(ProcessStatus::Defunct.to_string(), "defunct");
	}
}
