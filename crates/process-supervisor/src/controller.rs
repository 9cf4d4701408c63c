use std::sync::Arc;

use async_channel as chan;
use tokio::{
	spawn,
	sync::{oneshot, watch, Mutex},
	task::JoinHandle,
};
use tracing::{error, info, instrument, Instrument};

use super::{
	error::Error,
	record::{Lifecycle, ProcessRecord, ProcessSpec, RecordStatus},
};

mod run;
mod signal;

#[cfg(all(test, unix))]
pub(crate) use signal::undeliverable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TerminationMode {
	/// SIGINT, escalating to SIGKILL if the interrupt can't be delivered.
	Graceful,
	/// SIGKILL straight away.
	Forced,
}

impl TerminationMode {
	const fn lifecycle(self) -> Lifecycle {
		match self {
			Self::Graceful => Lifecycle::Stopping,
			Self::Forced => Lifecycle::Killing,
		}
	}

	const fn signal_name(self) -> &'static str {
		match self {
			Self::Graceful => "SIGINT",
			Self::Forced => "SIGKILL",
		}
	}
}

#[derive(Debug)]
pub(crate) enum ControlMessage {
	Terminate {
		mode: TerminationMode,
		ack: oneshot::Sender<Result<(), Error>>,
	},
}

#[derive(Debug)]
struct RunHandle {
	msgs_tx: chan::Sender<ControlMessage>,
	handle: JoinHandle<()>,
}

/// Owns the lifecycle of exactly one OS process.
///
/// Each successful [`start`](ProcessController::start) spawns a control loop task for that run,
/// which in turn spawns the exit watcher. [`stop`](ProcessController::stop) and
/// [`kill`](ProcessController::kill) talk to the control loop through its mailbox and wait for
/// the acknowledgement, so only one transition is ever in flight for a process.
#[derive(Debug)]
pub struct ProcessController {
	record: Arc<ProcessRecord>,
	run: Arc<Mutex<Option<RunHandle>>>,
}

impl ProcessController {
	pub(crate) fn new(spec: ProcessSpec) -> Self {
		Self {
			record: Arc::new(ProcessRecord::new(spec)),
			run: Arc::new(Mutex::new(None)),
		}
	}

	#[must_use]
	pub fn record(&self) -> &ProcessRecord {
		&self.record
	}

	#[must_use]
	pub fn name(&self) -> &str {
		self.record.name()
	}

	#[must_use]
	pub fn status(&self) -> RecordStatus {
		self.record.status()
	}

	/// Pid of the current run, if the process is running.
	#[must_use]
	pub fn pid(&self) -> Option<u32> {
		self.record.status().pid
	}

	#[must_use]
	pub fn subscribe(&self) -> watch::Receiver<RecordStatus> {
		self.record.subscribe()
	}

	/// Spawns the process and waits until we know whether it launched.
	///
	/// Returns the pid of the new process. On spawn failure the record is left `Failed`.
	///
	/// The launch runs on its own task: dropping this future doesn't abandon a half started
	/// run, the process still ends up `Running` (and stoppable) or `Failed`.
	#[instrument(skip(self), fields(name = %self.record.name()), err)]
	pub async fn start(&self) -> Result<u32, Error> {
		self.record.begin_start()?;

		let launch_task = spawn(
			launch(Arc::clone(&self.record), Arc::clone(&self.run)).in_current_span(),
		);

		match launch_task.await {
			Ok(res) => res,
			Err(join_error) => {
				error!(?join_error, "Launch task failed to join;");
				let e = Error::ControlLoopGone(self.record.name().to_string());
				self.record.mark_failed(e.to_string());
				Err(e)
			}
		}
	}

	/// Interrupts the process, returning once the signal was delivered (not once it exited).
	#[instrument(skip(self), fields(name = %self.record.name()), err)]
	pub async fn stop(&self) -> Result<(), Error> {
		self.terminate(TerminationMode::Graceful).await
	}

	/// Kills the process, returning once the signal was delivered (not once it exited).
	#[instrument(skip(self), fields(name = %self.record.name()), err)]
	pub async fn kill(&self) -> Result<(), Error> {
		self.terminate(TerminationMode::Forced).await
	}

	async fn terminate(&self, mode: TerminationMode) -> Result<(), Error> {
		let not_running = || Error::NotRunning(self.record.name().to_string());

		if !self.record.status().running() {
			return Err(not_running());
		}

		let mut run = self.run.lock().await;

		let Some(RunHandle { msgs_tx, .. }) = run.as_ref() else {
			return Err(not_running());
		};

		let (ack_tx, ack_rx) = oneshot::channel();

		if msgs_tx
			.send(ControlMessage::Terminate { mode, ack: ack_tx })
			.await
			.is_err()
		{
			return Err(not_running());
		}

		let res = ack_rx.await.unwrap_or_else(|_| Err(not_running()));

		// Both a delivered signal and a failed delivery end the control loop
		if !matches!(res, Err(Error::NotRunning(_))) {
			if let Some(RunHandle { handle, .. }) = run.take() {
				if let Err(e) = handle.await {
					error!(?e, "Control loop failed to join after termination;");
				}
			}
		}

		res
	}
}

/// Spawns the control loop of a new run and keeps its handle once the process is up.
///
/// Holds the run lock for the whole handshake, so a stop racing with the start waits for the
/// handle instead of finding nothing to talk to.
async fn launch(
	record: Arc<ProcessRecord>,
	run: Arc<Mutex<Option<RunHandle>>>,
) -> Result<u32, Error> {
	let mut run = run.lock().await;

	if let Some(RunHandle { handle, .. }) = run.take() {
		if let Err(e) = handle.await {
			error!(?e, "Control loop of the previous run failed to join;");
		}
	}

	info!(command = %record.command_line(), "Starting process");

	let (ready_tx, ready_rx) = oneshot::channel();
	let (msgs_tx, msgs_rx) = chan::bounded(1);

	let handle = spawn(run::run(Arc::clone(&record), msgs_rx, ready_tx).in_current_span());

	match ready_rx.await {
		Ok(Ok(pid)) => {
			*run = Some(RunHandle { msgs_tx, handle });
			Ok(pid)
		}
		Ok(Err(e)) => {
			if let Err(join_error) = handle.await {
				error!(?join_error, "Control loop failed to join after spawn failure;");
			}
			Err(e)
		}
		Err(_) => {
			let e = Error::ControlLoopGone(record.name().to_string());
			record.mark_failed(e.to_string());
			Err(e)
		}
	}
}
