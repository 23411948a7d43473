//! Foreground copying and moving between panes.

use std::fs;
use std::path::{Path, PathBuf};

use skiff_ops::{Op, OpData, OpsResult};
use skiff_undo::UndoLog;
use thiserror::Error;
use tracing::info;

use crate::common::{make_rel_path, paths_equal};
use crate::put::PutKind;
use crate::view::View;

#[derive(Debug, Error)]
pub enum CpmvError {
	#[error("forcing overwrite when destination and source is same directory will lead to losing data")]
	SameDirForce,
	#[error("number of names does not match the number of marked files")]
	LengthMismatch,
	#[error("file {0:?} already exists")]
	DestinationExists(PathBuf),
}

/// Copies, moves or links the marked files of `view` into `dst_dir`.
///
/// `names` optionally renames the files at the destination.  A single
/// name denoting an existing directory pastes *into* that directory
/// instead; this takes precedence over renaming.  Returns the number
/// of files processed.
pub fn cpmv(
	view: &View,
	dst_dir: &Path,
	names: &[String],
	kind: PutKind,
	force: bool,
	undo: &mut UndoLog,
) -> Result<usize, CpmvError> {
	let marked = view.marked_paths();

	let mut dst_dir = dst_dir.to_path_buf();
	let mut names: Vec<String> = names.to_vec();
	if names.len() == 1 && fs::metadata(dst_dir.join(&names[0])).is_ok_and(|m| m.is_dir()) {
		dst_dir = dst_dir.join(&names[0]);
		names.clear();
	}

	// Overwriting a file with itself loses the data with nothing to
	// recover it from.
	if paths_equal(&view.dir, &dst_dir) && force {
		return Err(CpmvError::SameDirForce);
	}

	if names.is_empty() {
		names = marked
			.iter()
			.map(|p| {
				p.file_name()
					.map(|n| n.to_string_lossy().into_owned())
					.unwrap_or_default()
			})
			.collect();
	}
	if names.len() != marked.len() {
		return Err(CpmvError::LengthMismatch);
	}

	if !force {
		for name in &names {
			let dst = dst_dir.join(name);
			if fs::symlink_metadata(&dst).is_ok() {
				return Err(CpmvError::DestinationExists(dst));
			}
		}
	}

	let verb = match kind {
		PutKind::Copy => "copy",
		PutKind::Move => "move",
		PutKind::LinkAbs | PutKind::LinkRel => "link",
	};
	let mut msg = format!("{verb} in {}: ", dst_dir.display());
	for name in &names {
		if !msg.ends_with(": ") {
			msg.push_str(", ");
		}
		msg.push_str(name);
	}
	undo.group_open(&msg);

	let mut done = 0;
	for (src, name) in marked.iter().zip(&names) {
		let dst = dst_dir.join(name);
		let overwrite = force && fs::symlink_metadata(&dst).is_ok();

		let (op, src_arg) = match kind {
			PutKind::Copy if overwrite => (Op::CopyF, src.clone()),
			PutKind::Copy => (Op::Copy, src.clone()),
			PutKind::Move if overwrite => (Op::MoveF, src.clone()),
			PutKind::Move => (Op::Move, src.clone()),
			PutKind::LinkAbs => (Op::Symlink, src.clone()),
			PutKind::LinkRel => (Op::Symlink, make_rel_path(src, &dst_dir)),
		};

		if skiff_ops::perform_operation(op, &OpData::None, Some(&src_arg), Some(&dst))
			== OpsResult::Succeeded
		{
			undo.add_op(op, OpData::None, OpData::None, &src_arg, &dst);
			done += 1;
		}
	}

	undo.group_close();
	info!(done, ?kind, "cpmv finished");
	Ok(done)
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;
	use std::rc::Rc;

	use pretty_assertions::assert_eq;
	use skiff_undo::UndoResult;
	use tempfile::TempDir;

	use super::*;
	use crate::view::ViewEntry;

	fn undo_log() -> UndoLog {
		UndoLog::new(
			Box::new(skiff_ops::perform_operation),
			None,
			None,
			Rc::new(Cell::new(100)),
		)
	}

	fn view_with(dir: &Path, names: &[&str]) -> View {
		let mut view = View::new(dir);
		view.entries = names
			.iter()
			.map(|name| ViewEntry::new(name).selected())
			.collect();
		view
	}

	#[test]
	fn copies_marked_files() {
		let src_dir = TempDir::new().unwrap();
		let dst_dir = TempDir::new().unwrap();
		fs::write(src_dir.path().join("a"), "1").unwrap();
		fs::write(src_dir.path().join("b"), "2").unwrap();

		let view = view_with(src_dir.path(), &["a", "b"]);
		let mut undo = undo_log();

		let done = cpmv(
			&view,
			dst_dir.path(),
			&[],
			PutKind::Copy,
			false,
			&mut undo,
		)
		.unwrap();

		assert_eq!(done, 2);
		assert!(dst_dir.path().join("a").exists());
		assert!(src_dir.path().join("a").exists());

		assert_eq!(undo.undo_group(), UndoResult::Success);
		assert!(!dst_dir.path().join("a").exists());
	}

	#[test]
	fn moving_renames_at_the_destination() {
		let src_dir = TempDir::new().unwrap();
		let dst_dir = TempDir::new().unwrap();
		fs::write(src_dir.path().join("a"), "1").unwrap();

		let view = view_with(src_dir.path(), &["a"]);
		let mut undo = undo_log();

		let done = cpmv(
			&view,
			dst_dir.path(),
			&["renamed".to_string()],
			PutKind::Move,
			false,
			&mut undo,
		)
		.unwrap();

		assert_eq!(done, 1);
		assert!(!src_dir.path().join("a").exists());
		assert!(dst_dir.path().join("renamed").exists());
	}

	#[test]
	fn single_directory_name_means_paste_into_it() {
		let src_dir = TempDir::new().unwrap();
		let dst_dir = TempDir::new().unwrap();
		fs::write(src_dir.path().join("a"), "1").unwrap();
		fs::create_dir(dst_dir.path().join("sub")).unwrap();

		let view = view_with(src_dir.path(), &["a"]);
		let mut undo = undo_log();

		let done = cpmv(
			&view,
			dst_dir.path(),
			&["sub".to_string()],
			PutKind::Copy,
			false,
			&mut undo,
		)
		.unwrap();

		assert_eq!(done, 1);
		assert!(dst_dir.path().join("sub/a").exists());
	}

	#[test]
	fn force_into_the_source_directory_is_refused() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join("a"), "1").unwrap();

		let view = view_with(dir.path(), &["a"]);
		let mut undo = undo_log();

		let err = cpmv(&view, dir.path(), &[], PutKind::Copy, true, &mut undo).unwrap_err();
		assert!(matches!(err, CpmvError::SameDirForce));

		// Pasting into a subdirectory named by a one-element list must
		// also refuse when that subdirectory is the source itself.
		let err = cpmv(
			&view,
			dir.path().parent().unwrap(),
			&[dir
				.path()
				.file_name()
				.unwrap()
				.to_string_lossy()
				.into_owned()],
			PutKind::Copy,
			true,
			&mut undo,
		)
		.unwrap_err();
		assert!(matches!(err, CpmvError::SameDirForce));
	}

	#[test]
	fn existing_destinations_require_force() {
		let src_dir = TempDir::new().unwrap();
		let dst_dir = TempDir::new().unwrap();
		fs::write(src_dir.path().join("a"), "new").unwrap();
		fs::write(dst_dir.path().join("a"), "old").unwrap();

		let view = view_with(src_dir.path(), &["a"]);
		let mut undo = undo_log();

		let err = cpmv(&view, dst_dir.path(), &[], PutKind::Copy, false, &mut undo).unwrap_err();
		assert!(matches!(err, CpmvError::DestinationExists(_)));

		let done = cpmv(&view, dst_dir.path(), &[], PutKind::Copy, true, &mut undo).unwrap();
		assert_eq!(done, 1);
		assert_eq!(
			fs::read_to_string(dst_dir.path().join("a")).unwrap(),
			"new"
		);
	}

	#[test]
	fn relative_links_point_through_the_destination() {
		let base = TempDir::new().unwrap();
		let src_dir = base.path().join("src");
		let dst_dir = base.path().join("dst");
		fs::create_dir_all(&src_dir).unwrap();
		fs::create_dir_all(&dst_dir).unwrap();
		fs::write(src_dir.join("a"), "1").unwrap();

		let view = view_with(&src_dir, &["a"]);
		let mut undo = undo_log();

		let done = cpmv(&view, &dst_dir, &[], PutKind::LinkRel, false, &mut undo).unwrap();
		assert_eq!(done, 1);

		let target = fs::read_link(dst_dir.join("a")).unwrap();
		assert_eq!(target, PathBuf::from("../src/a"));
	}
}
