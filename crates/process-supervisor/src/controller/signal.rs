use std::io;

use super::TerminationMode;

/// Delivers the termination signal for `mode`, returning the name of the signal that got through.
#[cfg(unix)]
pub(super) fn end_process(pid: u32, mode: TerminationMode) -> Result<&'static str, io::Error> {
	use nix::{sys::signal::Signal, unistd::Pid};
	use tracing::warn;

	let pid = Pid::from_raw(
		i32::try_from(pid).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?,
	);

	let force = |pid| {
		send(pid, Signal::SIGKILL)
			.map(|()| "SIGKILL")
			.map_err(io::Error::from)
	};

	match mode {
		TerminationMode::Forced => force(pid),
		TerminationMode::Graceful => match send(pid, Signal::SIGINT) {
			Ok(()) => Ok("SIGINT"),
			Err(e) => {
				warn!(%e, "SIGINT could not be delivered, escalating to SIGKILL;");
				force(pid)
			}
		},
	}
}

#[cfg(unix)]
fn send(pid: nix::unistd::Pid, signal: nix::sys::signal::Signal) -> nix::Result<()> {
	#[cfg(test)]
	if undeliverable::contains(pid.as_raw()) {
		return Err(nix::errno::Errno::EPERM);
	}

	nix::sys::signal::kill(pid, signal)
}

#[cfg(not(unix))]
pub(super) fn end_process(_pid: u32, _mode: TerminationMode) -> Result<&'static str, io::Error> {
	Err(io::Error::new(
		io::ErrorKind::Unsupported,
		"termination signals are only supported on unix",
	))
}

/// Pids that every signal fails to reach, as if they belonged to another user.
#[cfg(all(test, unix))]
pub(crate) mod undeliverable {
	use std::{collections::BTreeSet, sync::Mutex};

	static PIDS: Mutex<BTreeSet<i32>> = Mutex::new(BTreeSet::new());

	pub(crate) fn insert(pid: u32) {
		PIDS.lock()
			.unwrap()
			.insert(i32::try_from(pid).unwrap());
	}

	pub(crate) fn remove(pid: u32) {
		PIDS.lock()
			.unwrap()
			.remove(&i32::try_from(pid).unwrap());
	}

	pub(super) fn contains(pid: i32) -> bool {
		PIDS.lock().unwrap().contains(&pid)
	}
}
