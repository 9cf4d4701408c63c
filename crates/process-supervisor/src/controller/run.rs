use std::{io, pin::pin, process::Stdio, sync::Arc};

use async_channel as chan;
use futures::{FutureExt, StreamExt};
use futures_concurrency::stream::Merge;
use tokio::{
	process::{Child, Command},
	spawn,
	sync::oneshot,
};
use tracing::{debug, error, info, trace, warn, Instrument};

use super::{
	super::{
		error::Error,
		record::ProcessRecord,
		termination::{ExitObservation, TerminationGuard},
	},
	signal::end_process,
	ControlMessage, TerminationMode,
};

pub(super) async fn run(
	record: Arc<ProcessRecord>,
	msgs_rx: chan::Receiver<ControlMessage>,
	ready_tx: oneshot::Sender<Result<u32, Error>>,
) {
	let (child, pid) = match spawn_child(&record) {
		Ok(spawned) => spawned,
		Err(e) => {
			error!(%e, "Process failed to start;");
			record.mark_failed(e.to_string());
			if ready_tx.send(Err(e)).is_err() {
				warn!("Start caller went away before the spawn failure was reported");
			}
			return;
		}
	};

	let guard = Arc::new(TerminationGuard::new());
	let kill_on_drop = KillOnDrop {
		pid,
		guard: Arc::clone(&guard),
		armed: true,
	};

	record.mark_running(pid);
	info!(pid, "Process started");

	if ready_tx.send(Ok(pid)).is_err() {
		warn!("Start caller went away before the spawn outcome was reported");
	}

	let (exit_tx, exit_rx) = oneshot::channel();

	spawn(
		watch_exit(Arc::clone(&record), child, kill_on_drop, exit_tx).in_current_span(),
	);

	enum StreamMessage {
		Commands(ControlMessage),
		Exited,
	}

	let mut msg_stream = pin!((
		msgs_rx.map(StreamMessage::Commands),
		exit_rx.into_stream().map(|_| StreamMessage::Exited),
	)
		.merge());

	while let Some(msg) = msg_stream.next().await {
		match msg {
			StreamMessage::Commands(ControlMessage::Terminate { mode, ack }) => {
				let res = terminate(&record, &guard, pid, mode);

				// A lost claim leaves the run to the exit watcher, which reports the exit itself
				let lost_claim = matches!(res, Err(Error::NotRunning(_)));

				if ack.send(res).is_err() {
					warn!("Terminate caller went away before being answered");
				}

				if !lost_claim {
					return;
				}
			}

			StreamMessage::Exited => {
				trace!("Exit watcher finished, control loop ending");
				return;
			}
		}
	}
}

/// Claims the termination of the current run and delivers the signal for `mode`.
///
/// Returns `NotRunning` without touching the record if the exit watcher saw the process die
/// first, its failure report stands.
fn terminate(
	record: &ProcessRecord,
	guard: &TerminationGuard,
	pid: u32,
	mode: TerminationMode,
) -> Result<(), Error> {
	if !guard.claim() {
		return Err(Error::NotRunning(record.name().to_string()));
	}

	record.mark_terminating(mode.lifecycle());
	debug!(signal = mode.signal_name(), "Terminating process");

	match end_process(pid, mode) {
		Ok(delivered) => {
			record.mark_stopped();
			info!(signal = delivered, "Process terminated");
			Ok(())
		}
		Err(e) => {
			let e = Error::Signal {
				name: record.name().to_string(),
				signal: mode.signal_name(),
				source: e,
			};
			error!(%e, "Process could not be terminated;");
			record.mark_failed(e.to_string());
			Err(e)
		}
	}
}

fn spawn_child(record: &ProcessRecord) -> Result<(Child, u32), Error> {
	let spawn_error = |source| Error::Spawn {
		name: record.name().to_string(),
		source,
	};

	// Dropping the child is handled by `KillOnDrop`, which spares runs we already terminated
	let child = Command::new(record.command())
		.args(record.args())
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.kill_on_drop(false)
		.spawn()
		.map_err(spawn_error)?;

	let pid = child
		.id()
		.ok_or_else(|| spawn_error(io::Error::other("process exited before its pid was read")))?;

	Ok((child, pid))
}

/// SIGKILLs the process if the exit watcher is dropped (e.g. at runtime shutdown) before the
/// process exited and before anyone claimed its termination.
///
/// A stopped process is left alone so it can finish its own shutdown.
struct KillOnDrop {
	pid: u32,
	guard: Arc<TerminationGuard>,
	armed: bool,
}

impl Drop for KillOnDrop {
	fn drop(&mut self) {
		if !self.armed || !self.guard.claim() {
			return;
		}

		if let Err(e) = end_process(self.pid, TerminationMode::Forced) {
			warn!(%e, pid = self.pid, "Failed to kill abandoned process;");
		}
	}
}

async fn watch_exit(
	record: Arc<ProcessRecord>,
	mut child: Child,
	mut kill_on_drop: KillOnDrop,
	exit_tx: oneshot::Sender<()>,
) {
	let res = child.wait().await;
	kill_on_drop.armed = false;

	match kill_on_drop.guard.observe_exit() {
		ExitObservation::Organic => {
			let status = match res {
				Ok(status) => status.to_string(),
				Err(e) => format!("failed to wait on process: {e}"),
			};

			let e = Error::OrganicExit {
				name: record.name().to_string(),
				status,
			};

			error!(%e, "Process failed, inspect its logs for fatal output;");
			record.mark_failed(e.to_string());
		}

		ExitObservation::Requested => {
			debug!(?res, "Process exited after requested termination");
		}

		ExitObservation::AlreadyObserved => {}
	}

	if exit_tx.send(()).is_err() {
		trace!("Control loop already ended before the exit was reported");
	}
}

#[cfg(all(test, unix))]
mod tests {
	use crate::record::{Lifecycle, ProcessSpec};

	use super::*;

	fn running_record() -> ProcessRecord {
		let record = ProcessRecord::new(ProcessSpec::new("n1", "sleep"));
		record.begin_start().unwrap();
		record.mark_running(u32::MAX);
		record
	}

	#[test]
	fn lost_claim_keeps_the_exit_report() {
		let record = running_record();
		let guard = TerminationGuard::new();

		// The exit watcher got there first
		assert_eq!(guard.observe_exit(), ExitObservation::Organic);
		record.mark_failed("exit status: 1".to_string());
		let reported = record.status();

		for mode in [TerminationMode::Graceful, TerminationMode::Forced] {
			assert!(matches!(
				terminate(&record, &guard, u32::MAX, mode),
				Err(Error::NotRunning(ref name)) if name == "n1"
			));
			assert_eq!(record.status(), reported);
		}
	}

	#[test]
	fn second_terminate_on_a_claimed_run_is_rejected() {
		let record = running_record();
		let guard = TerminationGuard::new();
		assert!(guard.claim());

		assert!(matches!(
			terminate(&record, &guard, u32::MAX, TerminationMode::Forced),
			Err(Error::NotRunning(_))
		));
		assert_eq!(record.status().lifecycle, Lifecycle::Running);
	}
}
