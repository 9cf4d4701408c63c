use harness_process_supervisor::ProcessManager;

use std::{
	io::{self, Write},
	path::Path,
	sync::Arc,
};

use anyhow::{Context, Result};
use tokio::{
	fs::File,
	io::{stdin, AsyncBufRead, AsyncBufReadExt, BufReader},
	select,
	signal::ctrl_c,
};
use tracing::{debug, info, warn};

use crate::commands::{self, Flow};

const PROMPT: &str = "harness> ";

/// Reads commands from stdin until `exit`, EOF or Ctrl-C.
///
/// Returns whether every process could be stopped on the way out.
pub async fn interactive(manager: Arc<ProcessManager>) -> Result<bool> {
	info!("Interactive shell ready, type `help` for the list of commands");

	drive(
		&manager,
		BufReader::new(stdin()),
		&mut io::stdout(),
		Mode::Interactive,
	)
	.await
}

/// Runs every command in the file at `path`, then exits as if `exit` was the last line.
pub async fn script(manager: Arc<ProcessManager>, path: &Path) -> Result<bool> {
	let file = File::open(path)
		.await
		.with_context(|| format!("Failed to open script {}", path.display()))?;

	info!(path = %path.display(), "Running script");

	drive(&manager, BufReader::new(file), &mut io::stdout(), Mode::Script).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
	Interactive,
	Script,
}

async fn drive(
	manager: &Arc<ProcessManager>,
	reader: impl AsyncBufRead + Unpin,
	out: &mut impl Write,
	mode: Mode,
) -> Result<bool> {
	let mut lines = reader.lines();
	let mut line_number = 0_usize;

	loop {
		let line = if mode == Mode::Interactive {
			write!(out, "{PROMPT}")?;
			out.flush()?;

			select! {
				line = lines.next_line() => line?,
				res = ctrl_c() => {
					res?;
					writeln!(out)?;
					debug!("Received Ctrl-C, leaving the shell");
					None
				}
			}
		} else {
			lines.next_line().await?
		};

		let Some(line) = line else {
			break;
		};
		line_number += 1;

		match commands::parse(&line) {
			Ok(None) => {}

			Ok(Some(command)) => {
				if let Flow::Exit { clean } = commands::execute(manager, command, out).await? {
					return Ok(clean);
				}
			}

			Err(e) => {
				if mode == Mode::Script {
					warn!(line_number, %line, "Skipping unparsable script line;");
				}
				write!(out, "{}", e.render())?;
			}
		}
	}

	match commands::exit(manager, out).await? {
		Flow::Exit { clean } => Ok(clean),
		Flow::Continue => Ok(true),
	}
}

#[cfg(test)]
mod tests {
	use harness_process_supervisor::ProcessStatus;
	use tracing_test::traced_test;

	use super::*;

	async fn run(manager: &Arc<ProcessManager>, script: &str) -> (bool, String) {
		let mut out = Vec::new();
		let clean = drive(manager, script.as_bytes(), &mut out, Mode::Script)
			.await
			.unwrap();

		(clean, String::from_utf8(out).unwrap())
	}

	#[cfg(unix)]
	#[tokio::test]
	#[traced_test]
	async fn end_of_script_stops_everything() {
		let manager = Arc::new(ProcessManager::new());

		let (clean, printed) = run(
			&manager,
			"# bring up one node\n\
			 \n\
			 procmanager add n1 node sleep 10\n\
			 procmanager start n1\n\
			 procmanager list\n",
		)
		.await;

		assert!(clean);
		assert!(printed.contains("n1"), "{printed}");
		assert!(printed.contains("running"), "{printed}");
		assert_eq!(
			manager.status("n1").await.unwrap().label(),
			ProcessStatus::Stopped
		);
	}

	#[tokio::test]
	#[traced_test]
	async fn bad_lines_are_reported_and_skipped() {
		let manager = Arc::new(ProcessManager::new());

		let (clean, printed) = run(
			&manager,
			"procmanager frobnicate n1\n\
			 procmanager add n1 node sleep 10\n",
		)
		.await;

		assert!(clean);
		assert!(printed.contains("frobnicate"), "{printed}");
		assert!(manager.contains("n1").await);
		assert!(logs_contain("Skipping unparsable script line"));
	}

	#[tokio::test]
	async fn exit_stops_reading() {
		let manager = Arc::new(ProcessManager::new());

		let (clean, _) = run(
			&manager,
			"exit\n\
			 procmanager add n1 node sleep 10\n",
		)
		.await;

		assert!(clean);
		assert!(manager.is_empty().await);
	}
}
