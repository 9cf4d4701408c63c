use std::fmt;

use tokio::sync::watch;

use super::{error::Error, summary::ProcessStatus};

/// Everything needed to register a process, as handed over by whoever translated node
/// flags into an argument vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSpec {
	pub name: String,
	pub command: String,
	pub args: Vec<String>,
	pub category: String,
	pub metadata: String,
}

impl ProcessSpec {
	pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			command: command.into(),
			..Default::default()
		}
	}

	#[must_use]
	pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.args = args.into_iter().map(Into::into).collect();
		self
	}

	#[must_use]
	pub fn with_category(mut self, category: impl Into<String>) -> Self {
		self.category = category.into();
		self
	}

	#[must_use]
	pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
		self.metadata = metadata.into();
		self
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
	#[default]
	Idle,
	Starting,
	Running,
	Stopping,
	Killing,
	Stopped,
	Failed,
}

impl Lifecycle {
	#[must_use]
	pub const fn can_start(self) -> bool {
		matches!(self, Self::Idle | Self::Stopped | Self::Failed)
	}
}

impl fmt::Display for Lifecycle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::Idle => "idle",
			Self::Starting => "starting",
			Self::Running => "running",
			Self::Stopping => "stopping",
			Self::Killing => "killing",
			Self::Stopped => "stopped",
			Self::Failed => "failed",
		};
		f.write_str(s)
	}
}

/// Consistent snapshot of the mutable part of a [`ProcessRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordStatus {
	pub lifecycle: Lifecycle,
	/// OS process id of the current run, cleared once the run is stopped or failed.
	pub pid: Option<u32>,
	/// Why the last run failed, if it did.
	pub failure: Option<String>,
}

impl RecordStatus {
	/// Alive and owned by its controller, including while a stop or kill is being delivered.
	#[must_use]
	pub const fn running(&self) -> bool {
		matches!(
			self.lifecycle,
			Lifecycle::Running | Lifecycle::Stopping | Lifecycle::Killing
		)
	}

	#[must_use]
	pub const fn failed(&self) -> bool {
		matches!(self.lifecycle, Lifecycle::Failed)
	}

	#[must_use]
	pub const fn label(&self) -> ProcessStatus {
		ProcessStatus::from_flags(self.running(), self.failed())
	}
}

/// Identity of a managed process plus its live status.
///
/// Identity fields never change after registration. The status lives in a watch channel:
/// writers update it as a whole and readers always get a full snapshot.
#[derive(Debug)]
pub struct ProcessRecord {
	spec: ProcessSpec,
	status: watch::Sender<RecordStatus>,
}

impl ProcessRecord {
	pub(crate) fn new(spec: ProcessSpec) -> Self {
		let (status, _) = watch::channel(RecordStatus::default());
		Self { spec, status }
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.spec.name
	}

	#[must_use]
	pub fn command(&self) -> &str {
		&self.spec.command
	}

	#[must_use]
	pub fn args(&self) -> &[String] {
		&self.spec.args
	}

	#[must_use]
	pub fn category(&self) -> &str {
		&self.spec.category
	}

	#[must_use]
	pub fn metadata(&self) -> &str {
		&self.spec.metadata
	}

	/// The command followed by its arguments, separated by single spaces.
	#[must_use]
	pub fn command_line(&self) -> String {
		std::iter::once(self.spec.command.as_str())
			.chain(self.spec.args.iter().map(String::as_str))
			.collect::<Vec<_>>()
			.join(" ")
	}

	#[must_use]
	pub fn status(&self) -> RecordStatus {
		self.status.borrow().clone()
	}

	#[must_use]
	pub fn subscribe(&self) -> watch::Receiver<RecordStatus> {
		self.status.subscribe()
	}

	/// Moves the record into `Starting`, rejecting the call unless it is startable.
	pub(crate) fn begin_start(&self) -> Result<(), Error> {
		let mut current = Lifecycle::Idle;

		let started = self.status.send_if_modified(|status| {
			current = status.lifecycle;
			if current.can_start() {
				*status = RecordStatus {
					lifecycle: Lifecycle::Starting,
					pid: None,
					failure: None,
				};
				true
			} else {
				false
			}
		});

		if started {
			Ok(())
		} else if current == Lifecycle::Starting {
			Err(Error::StartInProgress(self.spec.name.clone()))
		} else {
			Err(Error::AlreadyRunning(self.spec.name.clone()))
		}
	}

	pub(crate) fn mark_running(&self, pid: u32) {
		self.status.send_modify(|status| {
			status.lifecycle = Lifecycle::Running;
			status.pid = Some(pid);
		});
	}

	pub(crate) fn mark_terminating(&self, lifecycle: Lifecycle) {
		self.status.send_modify(|status| status.lifecycle = lifecycle);
	}

	pub(crate) fn mark_stopped(&self) {
		self.status.send_modify(|status| {
			status.lifecycle = Lifecycle::Stopped;
			status.pid = None;
		});
	}

	pub(crate) fn mark_failed(&self, reason: String) {
		self.status.send_modify(|status| {
			status.lifecycle = Lifecycle::Failed;
			status.pid = None;
			status.failure = Some(reason);
		});
	}
}
