use std::sync::atomic::{AtomicU8, Ordering};

/// Who is allowed to report the end of a single process run.
///
/// The control loop and the exit watcher of a run share one guard. The control loop must
/// [`claim`](TerminationGuard::claim) the termination before it sends any signal, and the exit
/// watcher [`observes`](TerminationGuard::observe_exit) the exit once the OS reaped the process.
/// Whichever gets there first decides how the run ended, so a requested stop is never
/// reported as a crash and a crash is never swallowed by a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TerminationState {
	Running = 0,
	SelfTerminating = 1,
	Terminated = 2,
}

impl From<u8> for TerminationState {
	fn from(value: u8) -> Self {
		match value {
			0 => Self::Running,
			1 => Self::SelfTerminating,
			_ => Self::Terminated,
		}
	}
}

/// How the exit watcher should treat the exit it just observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitObservation {
	/// Nobody asked the process to end, report it as failed.
	Organic,
	/// The supervisor claimed this termination, its caller already got the outcome.
	Requested,
	/// The exit was observed before, nothing left to report.
	AlreadyObserved,
}

#[derive(Debug)]
pub struct TerminationGuard(AtomicU8);

impl TerminationGuard {
	#[must_use]
	pub const fn new() -> Self {
		Self(AtomicU8::new(TerminationState::Running as u8))
	}

	#[must_use]
	pub fn state(&self) -> TerminationState {
		self.0.load(Ordering::Acquire).into()
	}

	/// Marks the termination as self-initiated.
	///
	/// Returns `false` if the process was already seen exiting (or another claim won), in which
	/// case no signal must be sent.
	pub fn claim(&self) -> bool {
		self.0
			.compare_exchange(
				TerminationState::Running as u8,
				TerminationState::SelfTerminating as u8,
				Ordering::AcqRel,
				Ordering::Acquire,
			)
			.is_ok()
	}

	pub fn observe_exit(&self) -> ExitObservation {
		match self
			.0
			.swap(TerminationState::Terminated as u8, Ordering::AcqRel)
			.into()
		{
			TerminationState::Running => ExitObservation::Organic,
			TerminationState::SelfTerminating => ExitObservation::Requested,
			TerminationState::Terminated => ExitObservation::AlreadyObserved,
		}
	}
}

impl Default for TerminationGuard {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;

	#[test]
	fn exit_without_claim_is_organic() {
		let guard = TerminationGuard::new();

		assert_eq!(guard.observe_exit(), ExitObservation::Organic);
		assert_eq!(guard.state(), TerminationState::Terminated);
		assert!(!guard.claim());
	}

	#[test]
	fn claimed_exit_is_requested() {
		let guard = TerminationGuard::new();

		assert!(guard.claim());
		assert_eq!(guard.state(), TerminationState::SelfTerminating);
		assert!(!guard.claim(), "a second claim must lose");
		assert_eq!(guard.observe_exit(), ExitObservation::Requested);
		assert_eq!(guard.observe_exit(), ExitObservation::AlreadyObserved);
	}

	#[test]
	fn racing_claim_and_exit_agree() {
		for _ in 0..1_000 {
			let guard = Arc::new(TerminationGuard::new());

			let claimer = std::thread::spawn({
				let guard = Arc::clone(&guard);
				move || guard.claim()
			});
			let observed = guard.observe_exit();
			let claimed = claimer.join().expect("claimer thread panicked");

			match observed {
				ExitObservation::Organic => assert!(!claimed),
				ExitObservation::Requested => assert!(claimed),
				ExitObservation::AlreadyObserved => unreachable!("single observer"),
			}
		}
	}
}
