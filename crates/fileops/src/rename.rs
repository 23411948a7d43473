//! Batch renaming with temporary staging.
//!
//! A rename list may contain swap cycles (`a` to `b` and `b` to `a`).
//! Files whose new name collides with another file of the batch are
//! first moved to unique temporary names, then everything is renamed
//! to its final name in a second stage.

use std::path::{Path, PathBuf};

use skiff_ops::{Op, OpData, OpsResult};
use skiff_undo::UndoLog;
use thiserror::Error;
use tracing::info;

use crate::common::make_name_unique;

#[derive(Debug, Error)]
pub enum RenameError {
	#[error("name lists differ in length")]
	LengthMismatch,
	#[error("name {0:?} is used more than once")]
	DuplicateName(String),
	#[error("failed to rename {0:?}")]
	RenameFailed(PathBuf),
}

/// Renames `files` (basenames within `dir`) to `dst` names.  An empty
/// destination name keeps the file untouched.  Returns the number of
/// files renamed.
pub fn batch_rename(
	dir: &Path,
	files: &[String],
	dst: &[String],
	undo: &mut UndoLog,
) -> Result<usize, RenameError> {
	if files.len() != dst.len() {
		return Err(RenameError::LengthMismatch);
	}
	for (i, name) in dst.iter().enumerate() {
		if !name.is_empty() && dst[..i].contains(name) {
			return Err(RenameError::DuplicateName(name.clone()));
		}
	}

	let is_dup: Vec<bool> = dst
		.iter()
		.zip(files)
		.map(|(new, old)| !new.is_empty() && new != old && files.contains(new))
		.collect();

	let mut msg = format!("rename in {}: ", dir.display());
	for (old, new) in files.iter().zip(dst) {
		if new.is_empty() || new == old {
			continue;
		}
		if !msg.ends_with(": ") {
			msg.push_str(", ");
		}
		msg.push_str(&format!("{old} to {new}"));
	}
	undo.group_open(&msg);

	// Stage 1: move files that appear on both sides out of the way.
	let mut current: Vec<String> = files.to_vec();
	for i in 0..files.len() {
		if dst[i].is_empty() || dst[i] == files[i] || !is_dup[i] {
			continue;
		}

		let unique = make_name_unique(&dir.join(&current[i]));
		let unique_name = unique
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_default();
		if !mv_file(undo, Op::MoveTmp2, dir, &current[i], &unique_name) {
			undo.group_close();
			if !undo.last_group_empty() {
				undo.undo_group();
			}
			return Err(RenameError::RenameFailed(dir.join(&current[i])));
		}
		current[i] = unique_name;
	}

	// Stage 2: give every file its final name.
	let mut renamed = 0;
	for i in 0..files.len() {
		if dst[i].is_empty() || dst[i] == current[i] || dst[i] == files[i] {
			continue;
		}

		let op = if is_dup[i] { Op::MoveTmp1 } else { Op::Move };
		if mv_file(undo, op, dir, &current[i], &dst[i]) {
			renamed += 1;
		}
	}

	undo.group_close();
	info!(renamed, "batch rename finished");
	Ok(renamed)
}

/// Performs one rename inside `dir` and records it.
fn mv_file(undo: &mut UndoLog, op: Op, dir: &Path, from: &str, to: &str) -> bool {
	let src = dir.join(from);
	let dst = dir.join(to);

	if skiff_ops::perform_operation(op, &OpData::None, Some(&src), Some(&dst))
		!= OpsResult::Succeeded
	{
		return false;
	}
	undo.add_op(op, OpData::None, OpData::None, &src, &dst);
	true
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;
	use std::fs;
	use std::rc::Rc;

	use pretty_assertions::assert_eq;
	use skiff_undo::UndoResult;
	use tempfile::TempDir;

	use super::*;

	fn undo_log() -> UndoLog {
		UndoLog::new(
			Box::new(skiff_ops::perform_operation),
			None,
			None,
			Rc::new(Cell::new(100)),
		)
	}

	#[test]
	fn swapping_two_files_goes_through_a_temporary_name() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join("a"), "was-a").unwrap();
		fs::write(dir.path().join("b"), "was-b").unwrap();

		let mut undo = undo_log();
		let renamed = batch_rename(
			dir.path(),
			&["a".into(), "b".into()],
			&["b".into(), "a".into()],
			&mut undo,
		)
		.unwrap();

		assert_eq!(renamed, 2);
		assert_eq!(fs::read_to_string(dir.path().join("a")).unwrap(), "was-b");
		assert_eq!(fs::read_to_string(dir.path().join("b")).unwrap(), "was-a");

		// The whole swap reverts as one group.
		assert_eq!(undo.undo_group(), UndoResult::Success);
		assert_eq!(fs::read_to_string(dir.path().join("a")).unwrap(), "was-a");
		assert_eq!(fs::read_to_string(dir.path().join("b")).unwrap(), "was-b");
	}

	#[test]
	fn plain_renames_do_not_stage() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join("x"), "1").unwrap();

		let mut undo = undo_log();
		let renamed =
			batch_rename(dir.path(), &["x".into()], &["y".into()], &mut undo).unwrap();

		assert_eq!(renamed, 1);
		assert!(dir.path().join("y").exists());
		assert!(!dir.path().join("x").exists());
	}

	#[test]
	fn duplicate_target_names_are_rejected() {
		let dir = TempDir::new().unwrap();
		let mut undo = undo_log();

		let err = batch_rename(
			dir.path(),
			&["a".into(), "b".into()],
			&["same".into(), "same".into()],
			&mut undo,
		)
		.unwrap_err();
		assert!(matches!(err, RenameError::DuplicateName(_)));
	}

	#[test]
	fn empty_names_leave_files_alone() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join("keep"), "1").unwrap();

		let mut undo = undo_log();
		let renamed =
			batch_rename(dir.path(), &["keep".into()], &["".into()], &mut undo).unwrap();

		assert_eq!(renamed, 0);
		assert!(dir.path().join("keep").exists());
	}
}
