//! Callback types and results of the undo log.

use std::path::{Path, PathBuf};

use skiff_ops::{Op, OpData, OpsResult};

/// Performs an operation on behalf of the log.
pub type ExecFn = Box<dyn FnMut(Op, &OpData, Option<&Path>, Option<&Path>) -> OpsResult>;

/// Vetoes or approves an operation for the current host.
///
/// `Some(true)` marks the operation possible without further checks,
/// `Some(false)` impossible; `None` defers to the log's own
/// precondition checks.
pub type OpAvailFn = Box<dyn Fn(Op) -> Option<bool>>;

/// Polled between entries during undo/redo to support cancellation.
pub type CancelFn = Box<dyn Fn() -> bool>;

/// Result of undoing or redoing one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoResult {
	Success,
	/// One or more operations failed; the group is marked broken.
	Fail,
	/// Nothing on this side of the cursor.
	None,
	/// The group lost entries to eviction or failed its precondition
	/// checks and cannot be replayed.
	Broken,
	/// The group is not in the state this direction expects.
	Balance,
	/// At least one operation of the group has no inverse.
	NoUndo,
	/// The executor skipped an operation.
	Skipped,
	/// Cancelled between entries.
	Cancelled,
	/// A previous failure in this group prevents replay.
	Errors,
}

/// Trash integration seam.
///
/// The log itself knows nothing about trash directories; the file
/// operation layer implements this trait to let occupied destinations
/// inside a trash be renamed out of the way and to keep registers in
/// sync with such renames.
pub trait TrashMediator {
	/// Whether the path is inside some trash directory.
	fn is_trash_path(&self, path: &Path) -> bool;

	/// Whether the path is inside the given trash directory, or inside
	/// any of them when `trash_dir` is `None`.
	fn trash_contains(&self, trash_dir: Option<&Path>, path: &Path) -> bool;

	/// Produces an unused name in the same trash directory for the
	/// file the path refers to.
	fn rewrite_trash_name(&self, path: &Path) -> Option<PathBuf>;

	/// Invoked after the log renamed a trashed file.
	fn path_renamed(&self, old: &Path, new: &Path);
}
