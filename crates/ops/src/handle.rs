//! Progress and error accounting around a batch of operations.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::op::{Op, OpData, OpsResult};
use crate::perform::perform_operation;

/// Callback polled before each item to support cancellation.
pub type CancelFn = Box<dyn Fn() -> bool>;

/// Accounting handle for one user-visible batch of operations.
///
/// All work of the batch goes through [`OpsHandle::perform`], which
/// polls cancellation, performs the operation and records progress and
/// failures.  Accumulated error messages are surfaced once via
/// [`OpsHandle::error_summary`] when the batch finishes.
pub struct OpsHandle {
	descr: String,
	base_dir: PathBuf,
	enqueued: usize,
	current: usize,
	succeeded: usize,
	errors: Vec<String>,
	cancel: Option<CancelFn>,
}

impl OpsHandle {
	pub fn new(descr: &str, base_dir: &Path) -> Self {
		Self {
			descr: descr.to_string(),
			base_dir: base_dir.to_path_buf(),
			enqueued: 0,
			current: 0,
			succeeded: 0,
			errors: Vec::new(),
			cancel: None,
		}
	}

	/// Installs a cancellation probe polled before each item.
	pub fn on_cancel(mut self, cancel: CancelFn) -> Self {
		self.cancel = Some(cancel);
		self
	}

	/// Short description of the whole batch ("Putting", "Moving", …).
	pub fn descr(&self) -> &str {
		&self.descr
	}

	pub fn base_dir(&self) -> &Path {
		&self.base_dir
	}

	/// Announces an upcoming item, for progress estimation.
	pub fn enqueue(&mut self, _src: &Path, _dst: &Path) {
		self.enqueued += 1;
	}

	/// Whether the batch was cancelled.
	pub fn cancelled(&self) -> bool {
		self.cancel.as_ref().is_some_and(|cancel| cancel())
	}

	/// Performs one operation of the batch, recording the result.
	pub fn perform(
		&mut self,
		op: Op,
		data: &OpData,
		src: Option<&Path>,
		dst: Option<&Path>,
	) -> OpsResult {
		if self.cancelled() {
			return OpsResult::Skipped;
		}

		let result = perform_operation(op, data, src, dst);
		self.advance(result);
		if result == OpsResult::Failed {
			let path = src.or(dst).map(Path::display);
			self.errors.push(match path {
				Some(path) => format!("{:?} failed for {path}", op),
				None => format!("{:?} failed", op),
			});
		}
		result
	}

	/// Records the outcome of an item performed elsewhere.
	pub fn advance(&mut self, result: OpsResult) {
		self.current += 1;
		if result == OpsResult::Succeeded {
			self.succeeded += 1;
		}
		debug!(
			descr = %self.descr,
			current = self.current,
			enqueued = self.enqueued,
			"operation batch progress"
		);
	}

	/// Number of items processed so far.
	pub fn done(&self) -> usize {
		self.current
	}

	/// Number of items that succeeded so far.
	pub fn succeeded(&self) -> usize {
		self.succeeded
	}

	/// Joined error messages of the batch, if any failed.
	pub fn error_summary(&self) -> Option<String> {
		if self.errors.is_empty() {
			None
		} else {
			Some(self.errors.join("\n"))
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn progress_is_accounted() {
		let mut handle = OpsHandle::new("testing", Path::new("/tmp"));
		handle.enqueue(Path::new("/a"), Path::new("/b"));
		handle.enqueue(Path::new("/c"), Path::new("/d"));

		handle.advance(OpsResult::Succeeded);
		handle.advance(OpsResult::Failed);

		assert_eq!(handle.done(), 2);
		assert_eq!(handle.succeeded(), 1);
		assert_eq!(handle.error_summary(), None);
	}

	#[test]
	fn cancellation_skips_work() {
		let mut handle =
			OpsHandle::new("testing", Path::new("/tmp")).on_cancel(Box::new(|| true));

		let result = handle.perform(Op::Mkdir, &OpData::None, Some(Path::new("/nope")), None);
		assert_eq!(result, OpsResult::Skipped);
		assert_eq!(handle.done(), 0);
	}

	#[test]
	fn failures_are_collected() {
		let mut handle = OpsHandle::new("testing", Path::new("/tmp"));

		// Removing the parent of a missing path still succeeds;
		// creating a directory under a missing parent does not.
		let result = handle.perform(
			Op::Mkdir,
			&OpData::None,
			Some(Path::new("/no/such/dir/here")),
			None,
		);
		assert_eq!(result, OpsResult::Failed);
		assert!(handle.error_summary().unwrap().contains("Mkdir"));
	}
}
