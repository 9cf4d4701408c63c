use harness_process_supervisor::{BatchReport, Error, ProcessManager, ProcessSpec};

use std::{fmt, io::Write, sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tokio::{spawn, time::sleep};
use tracing::{error, info};

use crate::table;

/// One line typed into the shell
#[derive(Parser, Debug)]
#[command(name = "harness", no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
	#[command(subcommand)]
	pub command: ShellCommand,
}

#[derive(Subcommand, Debug)]
pub enum ShellCommand {
	/// Access the process manager
	#[command(subcommand)]
	Procmanager(ProcmanagerCommand),
	/// Exit the shell, gracefully stopping all processes first
	Exit,
}

#[derive(Subcommand, Debug)]
pub enum ProcmanagerCommand {
	/// List the registered processes in tabular format
	List,
	/// Print the metadata associated with a process
	Metadata { name: String },
	/// Register a process without starting it
	Add {
		name: String,
		category: String,
		command: String,
		#[arg(trailing_var_arg = true, allow_hyphen_values = true)]
		args: Vec<String>,
	},
	/// Start the named process if it isn't running
	Start(NamedArgs),
	/// Stop the named process with SIGINT
	Stop(NamedArgs),
	/// Kill the named process with SIGKILL
	Kill(NamedArgs),
	/// Stop the named process if needed and forget about it
	Remove(NamedArgs),
	/// Start every process that isn't running
	Startall(DelayArgs),
	/// Stop every running process
	Stopall(DelayArgs),
	/// Kill every running process
	Killall(DelayArgs),
	/// Remove every process
	Removeall(DelayArgs),
}

#[derive(Args, Debug)]
pub struct NamedArgs {
	pub name: String,
	#[command(flatten)]
	pub delay: DelayArgs,
}

#[derive(Args, Debug, Default)]
pub struct DelayArgs {
	/// Run the operation in the background after this many seconds
	pub delay: Option<u64>,
}

impl DelayArgs {
	fn duration(&self) -> Option<Duration> {
		self.delay
			.filter(|secs| *secs > 0)
			.map(Duration::from_secs)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
	Continue,
	/// Leave the shell; `clean` is false when some process could not be stopped
	Exit { clean: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
	Start,
	Stop,
	Kill,
	Remove,
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Start => "start",
			Self::Stop => "stop",
			Self::Kill => "kill",
			Self::Remove => "remove",
		})
	}
}

impl Action {
	async fn on(self, manager: &ProcessManager, name: &str) -> Result<(), Error> {
		match self {
			Self::Start => manager.start_process(name).await.map(|_pid| ()),
			Self::Stop => manager.stop_process(name).await,
			Self::Kill => manager.kill_process(name).await,
			Self::Remove => manager.remove_process(name).await,
		}
	}

	async fn on_all(self, manager: &ProcessManager) -> BatchReport {
		match self {
			Self::Start => manager.start_all_processes().await,
			Self::Stop => manager.stop_all_processes().await,
			Self::Kill => manager.kill_all_processes().await,
			Self::Remove => manager.remove_all_processes().await,
		}
	}
}

/// Parses one shell line, `Ok(None)` for blank lines and `#` comments.
pub fn parse(line: &str) -> Result<Option<ShellCommand>, clap::Error> {
	let line = line.trim();
	if line.is_empty() || line.starts_with('#') {
		return Ok(None);
	}

	ShellLine::try_parse_from(line.split_whitespace()).map(|parsed| Some(parsed.command))
}

pub async fn execute(
	manager: &Arc<ProcessManager>,
	command: ShellCommand,
	out: &mut impl Write,
) -> Result<Flow> {
	use ProcmanagerCommand as Pm;

	let command = match command {
		ShellCommand::Procmanager(command) => command,
		ShellCommand::Exit => return exit(manager, out).await,
	};

	match command {
		Pm::List => {
			writeln!(out, "{}", table::render(&manager.process_summary().await))?;
		}

		Pm::Metadata { name } => match manager.metadata(&name).await {
			Ok(metadata) => writeln!(out, "{metadata}")?,
			Err(e) => writeln!(out, "error: {e}")?,
		},

		Pm::Add {
			name,
			category,
			command,
			args,
		} => {
			let spec = ProcessSpec::new(name, command)
				.with_args(args)
				.with_category(category);

			if let Err(e) = manager.add_process(spec).await {
				writeln!(out, "error: {e}")?;
			}
		}

		Pm::Start(args) => single(manager, Action::Start, args, out).await?,
		Pm::Stop(args) => single(manager, Action::Stop, args, out).await?,
		Pm::Kill(args) => single(manager, Action::Kill, args, out).await?,
		Pm::Remove(args) => single(manager, Action::Remove, args, out).await?,

		Pm::Startall(delay) => batch(manager, Action::Start, &delay, out).await?,
		Pm::Stopall(delay) => batch(manager, Action::Stop, &delay, out).await?,
		Pm::Killall(delay) => batch(manager, Action::Kill, &delay, out).await?,
		Pm::Removeall(delay) => batch(manager, Action::Remove, &delay, out).await?,
	}

	Ok(Flow::Continue)
}

/// Stops everything that is still running before leaving.
pub async fn exit(manager: &ProcessManager, out: &mut impl Write) -> Result<Flow> {
	if !manager.has_running().await {
		return Ok(Flow::Exit { clean: true });
	}

	let report = manager.stop_all_processes().await;
	write_failures(&report, out)?;

	Ok(Flow::Exit {
		clean: report.is_success(),
	})
}

async fn single(
	manager: &Arc<ProcessManager>,
	action: Action,
	NamedArgs { name, delay }: NamedArgs,
	out: &mut impl Write,
) -> Result<()> {
	if let Some(delay) = delay.duration() {
		writeln!(out, "process will {action} in {}s: {name}", delay.as_secs())?;

		let manager = Arc::clone(manager);
		spawn(async move {
			sleep(delay).await;
			if let Err(e) = action.on(&manager, &name).await {
				error!(%e, %name, "Delayed {action} failed;");
			}
		});

		return Ok(());
	}

	if let Err(e) = action.on(manager, &name).await {
		writeln!(out, "error: {e}")?;
	}

	Ok(())
}

async fn batch(
	manager: &Arc<ProcessManager>,
	action: Action,
	delay: &DelayArgs,
	out: &mut impl Write,
) -> Result<()> {
	if let Some(delay) = delay.duration() {
		writeln!(out, "all processes will {action} in {}s", delay.as_secs())?;

		let manager = Arc::clone(manager);
		spawn(async move {
			sleep(delay).await;
			let report = action.on_all(&manager).await;
			info!(
				attempted = report.attempted,
				failed = report.failures.len(),
				"Delayed {action}all finished"
			);
		});

		return Ok(());
	}

	write_failures(&action.on_all(manager).await, out)
}

fn write_failures(report: &BatchReport, out: &mut impl Write) -> Result<()> {
	for (name, e) in &report.failures {
		writeln!(out, "error: {name}: {e}")?;
	}

	Ok(())
}
