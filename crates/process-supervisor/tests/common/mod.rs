#![allow(dead_code)]

use harness_process_supervisor::{ProcessSpec, RecordStatus};

use std::time::Duration;

use nix::{
	sys::signal::{kill, Signal},
	unistd::Pid,
};
use tokio::{sync::watch, time::timeout};

const FIVE_SECONDS: Duration = Duration::from_secs(5);

pub const MISSING_BINARY: &str = "/nonexistent/harness-fake-node";

/// A cooperative long running process, dies on SIGINT.
pub fn sleeper(name: &str) -> ProcessSpec {
	ProcessSpec::new(name, "sleep")
		.with_args(["10"])
		.with_category("node")
}

pub fn broken(name: &str) -> ProcessSpec {
	ProcessSpec::new(name, MISSING_BINARY).with_category("node")
}

pub fn shell(name: &str, script: &str) -> ProcessSpec {
	ProcessSpec::new(name, "sh").with_args(["-c", script])
}

pub async fn wait_for(
	rx: &mut watch::Receiver<RecordStatus>,
	predicate: impl FnMut(&RecordStatus) -> bool,
) -> RecordStatus {
	timeout(FIVE_SECONDS, rx.wait_for(predicate))
		.await
		.expect("timed out waiting for status change")
		.expect("status sender dropped")
		.clone()
}

/// Kills a process behind the supervisor's back, like a crash would.
pub fn crash(pid: u32) {
	kill(
		Pid::from_raw(i32::try_from(pid).expect("pid fits in i32")),
		Signal::SIGKILL,
	)
	.expect("failed to kill process out of band");
}
