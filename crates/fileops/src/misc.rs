//! Deletion and yanking.

use std::path::PathBuf;

use skiff_ops::{Op, OpData, OpsResult};
use skiff_undo::UndoLog;
use tracing::info;

use crate::registers::Registers;
use crate::trash::Trash;

/// Deletes files, either into the trash (undoable) or permanently.
/// Returns the number of files handled.
pub fn delete(
	paths: &[PathBuf],
	use_trash: bool,
	trash: &mut Trash,
	undo: &mut UndoLog,
) -> usize {
	let mut msg = String::from("delete: ");
	for path in paths {
		if !msg.ends_with(": ") {
			msg.push_str(", ");
		}
		msg.push_str(&path.file_name().unwrap_or_default().to_string_lossy());
	}
	undo.group_open(&msg);

	let mut done = 0;
	for path in paths {
		// Files already in the trash are purged, not trashed again.
		if use_trash && !trash.has_path(path) {
			let name = path
				.file_name()
				.map(|n| n.to_string_lossy().into_owned())
				.unwrap_or_default();
			let Some(dst) = Trash::gen_name(trash.dir(), &name) else {
				continue;
			};
			if skiff_ops::perform_operation(Op::Move, &OpData::None, Some(path), Some(&dst))
				== OpsResult::Succeeded
			{
				undo.add_op(Op::Move, OpData::None, OpData::None, path, &dst);
				let trash_name = dst
					.file_name()
					.map(|n| n.to_string_lossy().into_owned())
					.unwrap_or_default();
				trash.add(path, &trash_name);
				done += 1;
			}
		} else if skiff_ops::perform_operation(Op::Remove, &OpData::None, Some(path), None)
			== OpsResult::Succeeded
		{
			undo.add_op(Op::Remove, OpData::None, OpData::None, path, std::path::Path::new(""));
			if let Some(name) = path.file_name() {
				trash.remove(&name.to_string_lossy());
			}
			done += 1;
		}
	}

	undo.group_close();
	info!(done, use_trash, "delete finished");
	done
}

/// Fills a register with paths.  Returns the number of files yanked.
pub fn yank(paths: &[PathBuf], reg: char, registers: &mut Registers) -> usize {
	let reg = reg.to_ascii_lowercase();
	registers.clear(reg);
	for path in paths {
		registers.append(reg, path);
	}
	registers.update_unnamed(reg);
	paths.len()
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;
	use std::fs;
	use std::path::Path;
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
	fn deleting_into_the_trash_is_undoable() {
		let dir = TempDir::new().unwrap();
		let trash_dir = dir.path().join("trash");
		fs::create_dir(&trash_dir).unwrap();
		let file = dir.path().join("doc");
		fs::write(&file, "content").unwrap();

		let mut trash = Trash::new(&trash_dir);
		let mut undo = undo_log();

		assert_eq!(delete(&[file.clone()], true, &mut trash, &mut undo), 1);
		assert!(!file.exists());
		assert!(trash_dir.join("000_doc").exists());
		assert!(trash.contains("000_doc"));

		assert_eq!(undo.undo_group(), UndoResult::Success);
		assert!(file.exists());
	}

	#[test]
	fn purging_cannot_be_undone() {
		let dir = TempDir::new().unwrap();
		let trash_dir = dir.path().join("trash");
		fs::create_dir(&trash_dir).unwrap();
		let file = dir.path().join("doc");
		fs::write(&file, "content").unwrap();

		let mut trash = Trash::new(&trash_dir);
		let mut undo = undo_log();

		assert_eq!(delete(&[file.clone()], false, &mut trash, &mut undo), 1);
		assert!(!file.exists());
		assert_eq!(undo.undo_group(), UndoResult::NoUndo);
	}

	#[test]
	fn trash_name_collisions_pick_the_next_prefix() {
		let dir = TempDir::new().unwrap();
		let trash_dir = dir.path().join("trash");
		fs::create_dir(&trash_dir).unwrap();
		fs::write(trash_dir.join("000_doc"), "old").unwrap();
		let file = dir.path().join("doc");
		fs::write(&file, "new").unwrap();

		let mut trash = Trash::new(&trash_dir);
		let mut undo = undo_log();

		assert_eq!(delete(&[file], true, &mut trash, &mut undo), 1);
		assert!(trash_dir.join("001_doc").exists());
	}

	#[test]
	fn yank_replaces_register_content() {
		let mut regs = Registers::new();
		regs.append('a', Path::new("/stale"));

		assert_eq!(yank(&[PathBuf::from("/x"), PathBuf::from("/y")], 'a', &mut regs), 2);
		assert_eq!(regs.files('a'), vec![PathBuf::from("/x"), PathBuf::from("/y")]);
		assert_eq!(regs.files('"'), vec![PathBuf::from("/x"), PathBuf::from("/y")]);
	}
}
