#![cfg(unix)]

use harness_process_supervisor::{ProcessManager, ProcessSpec};

use std::{
	path::Path,
	thread,
	time::{Duration, Instant},
};

use tempfile::tempdir;
use tokio::{runtime::Builder, time::sleep};

/// Runs `spec` on a runtime of its own, optionally stops it, then tears the runtime down
/// without waiting for any task, like the harness binary does on exit.
fn run_then_shut_down(spec: ProcessSpec, stop: bool) {
	let runtime = Builder::new_multi_thread().enable_all().build().unwrap();

	runtime.block_on(async move {
		let manager = ProcessManager::new();
		let name = spec.name.clone();

		manager.add_process(spec).await.unwrap();
		manager.start_process(&name).await.unwrap();

		if stop {
			// Let the shell install its trap first
			sleep(Duration::from_millis(200)).await;
			assert!(manager.stop_all_processes().await.is_success());
		}
	});

	runtime.shutdown_background();
}

fn appears_within(path: &Path, limit: Duration) -> bool {
	let deadline = Instant::now() + limit;

	while Instant::now() < deadline {
		if path.exists() {
			return true;
		}
		thread::sleep(Duration::from_millis(50));
	}

	path.exists()
}

#[test]
fn stopped_process_finishes_its_shutdown_after_the_runtime_is_gone() {
	let dir = tempdir().unwrap();
	let marker = dir.path().join("graceful");

	run_then_shut_down(
		ProcessSpec::new("n1", "sh").with_args([
			"-c".to_string(),
			format!(
				"trap 'sleep 0.3; touch {}; exit 0' INT; while :; do sleep 0.1; done",
				marker.display()
			),
		]),
		true,
	);

	assert!(appears_within(&marker, Duration::from_secs(3)));
}

#[test]
fn running_process_is_killed_with_the_runtime() {
	let dir = tempdir().unwrap();
	let marker = dir.path().join("survived");

	run_then_shut_down(
		ProcessSpec::new("n1", "sh").with_args([
			"-c".to_string(),
			format!("sleep 0.5; touch {}", marker.display()),
		]),
		false,
	);

	assert!(!appears_within(&marker, Duration::from_millis(1500)));
}
