use std::{
	collections::{btree_map::Entry, BTreeMap},
	fmt,
	sync::Arc,
};

use futures_concurrency::future::Join;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, instrument, warn};

use super::{
	controller::ProcessController,
	error::Error,
	record::{ProcessSpec, RecordStatus},
	summary::ProcessSummary,
};

/// Outcome of a batch operation: how many processes were attempted and which of them failed.
#[derive(Debug, Default)]
pub struct BatchReport {
	pub attempted: usize,
	pub failures: Vec<(String, Error)>,
}

impl BatchReport {
	#[must_use]
	pub fn is_success(&self) -> bool {
		self.failures.is_empty()
	}

	#[must_use]
	pub fn succeeded(&self) -> usize {
		self.attempted - self.failures.len()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchOp {
	Start,
	Stop,
	Kill,
	Remove,
}

impl BatchOp {
	const fn is_eligible(self, status: &RecordStatus) -> bool {
		match self {
			Self::Start => status.lifecycle.can_start(),
			Self::Stop | Self::Kill => status.running(),
			Self::Remove => true,
		}
	}
}

impl fmt::Display for BatchOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Start => "start",
			Self::Stop => "stop",
			Self::Kill => "kill",
			Self::Remove => "remove",
		})
	}
}

/// Name-keyed registry of [`ProcessController`]s, the single entry point for callers.
///
/// The map lock is only held to look controllers up or to insert/remove them, never across a
/// controller operation, so a slow stop on one process doesn't hold up the others.
#[derive(Debug, Default)]
pub struct ProcessManager {
	processes: RwLock<BTreeMap<String, Arc<ProcessController>>>,
}

impl ProcessManager {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a new process without starting it. The name is trimmed first.
	#[instrument(skip_all, fields(name = %spec.name.trim()), err)]
	pub async fn add_process(&self, mut spec: ProcessSpec) -> Result<(), Error> {
		let name = spec.name.trim().to_string();
		if name.is_empty() {
			return Err(Error::EmptyName);
		}

		match self.processes.write().await.entry(name.clone()) {
			Entry::Occupied(_) => Err(Error::AlreadyExists(name)),
			Entry::Vacant(entry) => {
				spec.name = name;
				entry.insert(Arc::new(ProcessController::new(spec)));
				info!("Process registered");
				Ok(())
			}
		}
	}

	/// Looks a controller up by name, trimmed like at registration.
	pub async fn controller(&self, name: &str) -> Result<Arc<ProcessController>, Error> {
		let name = name.trim();

		self.processes
			.read()
			.await
			.get(name)
			.cloned()
			.ok_or_else(|| Error::NotFound(name.to_string()))
	}

	pub async fn start_process(&self, name: &str) -> Result<u32, Error> {
		self.controller(name).await?.start().await
	}

	pub async fn stop_process(&self, name: &str) -> Result<(), Error> {
		self.controller(name).await?.stop().await
	}

	pub async fn kill_process(&self, name: &str) -> Result<(), Error> {
		self.controller(name).await?.kill().await
	}

	/// Stops the process if it is running, then forgets about it.
	///
	/// A failed stop is only logged: the entry is removed regardless.
	#[instrument(skip(self), err)]
	pub async fn remove_process(&self, name: &str) -> Result<(), Error> {
		let name = name.trim();
		let controller = self.controller(name).await?;

		if controller.status().running() {
			if let Err(e) = controller.stop().await {
				warn!(%e, "Failed to stop process before removal, removing it anyway;");
			}
		}

		let mut processes = self.processes.write().await;
		match processes.get(name) {
			Some(current) if Arc::ptr_eq(current, &controller) => {
				processes.remove(name);
			}
			// Someone else removed it (and maybe registered a new one) while we were stopping
			_ => return Err(Error::NotFound(name.to_string())),
		}

		info!("Process removed");

		Ok(())
	}

	/// Starts every process that isn't running.
	#[instrument(skip(self))]
	pub async fn start_all_processes(&self) -> BatchReport {
		self.batch(BatchOp::Start).await
	}

	/// Stops every running process.
	#[instrument(skip(self))]
	pub async fn stop_all_processes(&self) -> BatchReport {
		self.batch(BatchOp::Stop).await
	}

	/// Kills every running process.
	#[instrument(skip(self))]
	pub async fn kill_all_processes(&self) -> BatchReport {
		self.batch(BatchOp::Kill).await
	}

	/// Removes every process, stopping the running ones first.
	#[instrument(skip(self))]
	pub async fn remove_all_processes(&self) -> BatchReport {
		self.batch(BatchOp::Remove).await
	}

	pub async fn metadata(&self, name: &str) -> Result<String, Error> {
		if name.trim().is_empty() {
			return Err(Error::EmptyName);
		}

		Ok(self.controller(name).await?.record().metadata().to_string())
	}

	pub async fn status(&self, name: &str) -> Result<RecordStatus, Error> {
		Ok(self.controller(name).await?.status())
	}

	pub async fn subscribe(&self, name: &str) -> Result<watch::Receiver<RecordStatus>, Error> {
		Ok(self.controller(name).await?.subscribe())
	}

	/// One row per registered process, ordered by name.
	pub async fn process_summary(&self) -> Vec<ProcessSummary> {
		self.processes
			.read()
			.await
			.values()
			.map(|controller| {
				let record = controller.record();
				ProcessSummary {
					name: record.name().to_string(),
					status: record.status().label(),
					metadata: record.metadata().to_string(),
					command: record.command_line(),
				}
			})
			.collect()
	}

	pub async fn has_running(&self) -> bool {
		self.processes
			.read()
			.await
			.values()
			.any(|controller| controller.status().running())
	}

	pub async fn contains(&self, name: &str) -> bool {
		self.processes.read().await.contains_key(name.trim())
	}

	pub async fn len(&self) -> usize {
		self.processes.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.processes.read().await.is_empty()
	}

	async fn apply(&self, op: BatchOp, name: String) -> (String, Result<(), Error>) {
		let res = match op {
			BatchOp::Start => self.start_process(&name).await.map(|_pid| ()),
			BatchOp::Stop => self.stop_process(&name).await,
			BatchOp::Kill => self.kill_process(&name).await,
			BatchOp::Remove => self.remove_process(&name).await,
		};

		(name, res)
	}

	async fn batch(&self, op: BatchOp) -> BatchReport {
		let names = self
			.processes
			.read()
			.await
			.iter()
			.filter(|(_, controller)| op.is_eligible(&controller.status()))
			.map(|(name, _)| name.clone())
			.collect::<Vec<_>>();

		let attempted = names.len();

		let failures = names
			.into_iter()
			.map(|name| self.apply(op, name))
			.collect::<Vec<_>>()
			.join()
			.await
			.into_iter()
			.filter_map(|(name, res)| {
				res.err().map(|e| {
					error!(%name, %e, "Failed to {op} process during batch;");
					(name, e)
				})
			})
			.collect::<Vec<_>>();

		info!(attempted, failed = failures.len(), "Batch {op} finished");

		BatchReport {
			attempted,
			failures,
		}
	}
}

#[cfg(all(test, unix))]
mod tests {
	use nix::{
		sys::signal::{kill, Signal},
		unistd::Pid,
	};
	use tracing_test::traced_test;

	use crate::controller::undeliverable;

	use super::*;

	#[tokio::test]
	#[traced_test]
	async fn remove_all_empties_the_registry_even_if_a_stop_fails() {
		let manager = ProcessManager::new();
		for name in ["n1", "n2", "n3"] {
			manager
				.add_process(ProcessSpec::new(name, "sleep").with_args(["10"]))
				.await
				.unwrap();
		}

		let stubborn = manager.start_process("n1").await.unwrap();
		manager.start_process("n2").await.unwrap();

		undeliverable::insert(stubborn);
		let report = manager.remove_all_processes().await;
		undeliverable::remove(stubborn);

		assert_eq!(report.attempted, 3);
		assert!(report.is_success());
		assert!(manager.is_empty().await);
		assert!(logs_contain("Failed to stop process before removal"));

		kill(Pid::from_raw(i32::try_from(stubborn).unwrap()), Signal::SIGKILL).unwrap();
	}
}
