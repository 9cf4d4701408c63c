//!
//! # Process Supervisor
//!
//! Owns the lifecycle of local OS processes (typically blockchain nodes spun up for
//! integration testing) behind a name-keyed registry.
//!
//! Every registered process gets its own controller. While a process runs, the controller
//! keeps two background tasks alive: a control loop that serializes stop and kill requests,
//! and an exit watcher that awaits the OS process and tells apart a termination we asked for
//! from a process that died on its own. The latter leaves the process listed as `defunct`
//! until it is removed or restarted.
//!
//! ## Basic example
//!
//! ```no_run
//! use harness_process_supervisor::{ProcessManager, ProcessSpec, ProcessStatus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), harness_process_supervisor::Error> {
//!     let manager = ProcessManager::new();
//!
//!     manager
//!         .add_process(
//!             ProcessSpec::new("node1", "sleep")
//!                 .with_args(["10"])
//!                 .with_category("node")
//!                 .with_metadata(r#"{"http-port":9650}"#),
//!         )
//!         .await?;
//!
//!     manager.start_process("node1").await?;
//!     assert_eq!(manager.status("node1").await?.label(), ProcessStatus::Running);
//!
//!     manager.stop_process("node1").await?;
//!     assert_eq!(manager.status("node1").await?.label(), ProcessStatus::Stopped);
//!
//!     Ok(())
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod controller;
mod error;
mod manager;
mod record;
mod summary;
mod termination;

pub use controller::ProcessController;
pub use error::{Error, ErrorKind};
pub use manager::{BatchReport, ProcessManager};
pub use record::{Lifecycle, ProcessRecord, ProcessSpec, RecordStatus};
pub use summary::{ProcessStatus, ProcessSummary};
pub use termination::{ExitObservation, TerminationGuard, TerminationState};
