//! Trash directory bookkeeping.
//!
//! Files in the trash carry a mangled name: a numeric prefix
//! (`000_`, `001_`, …) followed by the original basename.  Demangling
//! strips the prefix; generating a name picks the lowest unused
//! prefix.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use skiff_ops::{perform_operation, Op, OpData, OpsResult};
use skiff_undo::{TrashMediator, UndoLog};
use thiserror::Error;
use tracing::info;

use crate::registers::Registers;

#[derive(Debug, Error)]
pub enum TrashError {
	#[error("no such trash entry")]
	UnknownEntry,
	#[error("failed to move the file out of the trash")]
	RestoreFailed,
}

/// One trashed file.
#[derive(Debug, Clone)]
pub struct TrashEntry {
	/// Where the file came from.
	pub path: PathBuf,
	/// Its mangled name inside the trash directory.
	pub trash_name: String,
}

/// The trash directory and its entry list.
pub struct Trash {
	dir: PathBuf,
	entries: Vec<TrashEntry>,
}

impl Trash {
	pub fn new(dir: &Path) -> Self {
		Self {
			dir: dir.to_path_buf(),
			entries: Vec::new(),
		}
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Whether the path lies inside the trash directory.
	pub fn has_path(&self, path: &Path) -> bool {
		path.starts_with(&self.dir)
	}

	/// Strips the numeric mangling prefix from a trash basename.
	pub fn demangle(name: &str) -> &str {
		name.split_once('_')
			.filter(|(prefix, tail)| {
				!prefix.is_empty() && !tail.is_empty() && prefix.chars().all(|c| c.is_ascii_digit())
			})
			.map_or(name, |(_, tail)| tail)
	}

	/// Picks an unused mangled path in `base_dir` for `name`.
	pub fn gen_name(base_dir: &Path, name: &str) -> Option<PathBuf> {
		let tail = Self::demangle(name);
		(0..10_000)
			.map(|i| base_dir.join(format!("{i:03}_{tail}")))
			.find(|candidate| fs::symlink_metadata(candidate).is_err())
	}

	/// Records a file moved into the trash.
	pub fn add(&mut self, path: &Path, trash_name: &str) {
		self.entries.push(TrashEntry {
			path: path.to_path_buf(),
			trash_name: trash_name.to_string(),
		});
	}

	/// Whether an entry with this mangled name is recorded.
	pub fn contains(&self, trash_name: &str) -> bool {
		self.entries.iter().any(|e| e.trash_name == trash_name)
	}

	/// Forgets an entry.  Returns whether it was present.
	pub fn remove(&mut self, trash_name: &str) -> bool {
		let before = self.entries.len();
		self.entries.retain(|e| e.trash_name != trash_name);
		self.entries.len() != before
	}

	pub fn entries(&self) -> &[TrashEntry] {
		&self.entries
	}

	/// Moves a trashed file back to where it came from, reopening the
	/// last undo group to extend its message.
	pub fn restore(&mut self, trash_name: &str, undo: &mut UndoLog) -> Result<(), TrashError> {
		let entry = self
			.entries
			.iter()
			.find(|e| e.trash_name == trash_name)
			.cloned()
			.ok_or(TrashError::UnknownEntry)?;

		let full = self.dir.join(&entry.trash_name);
		if perform_operation(Op::Move, &OpData::None, Some(&full), Some(&entry.path))
			!= OpsResult::Succeeded
		{
			return Err(TrashError::RestoreFailed);
		}

		undo.group_continue();
		let msg = undo.replace_group_msg(None).unwrap_or_default();
		let msg = if msg.ends_with(": ") {
			format!("{msg}{}", Self::demangle(trash_name))
		} else {
			format!("{msg}, {}", Self::demangle(trash_name))
		};
		undo.replace_group_msg(Some(&msg));
		undo.add_op(Op::Move, OpData::None, OpData::None, &full, &entry.path);
		undo.group_close();

		self.remove(trash_name);
		info!(name = trash_name, "restored from trash");
		Ok(())
	}

	/// Deletes everything in the trash and reconciles the register
	/// store and the undo log with the loss.
	pub fn empty(&mut self, registers: &mut Registers, undo: &mut UndoLog) {
		if let Ok(dir) = fs::read_dir(&self.dir) {
			for entry in dir.flatten() {
				let _ = perform_operation(
					Op::RemoveSl,
					&OpData::None,
					Some(&entry.path()),
					None,
				);
			}
		}

		registers.clear_with_trash(&self.dir);
		undo.clear_cmds_with_trash(Some(&self.dir));
		self.entries.clear();
		info!(dir = ?self.dir, "trash emptied");
	}
}

/// Trash seam implementation handed to the undo log: knows the trash
/// layout and keeps registers in sync with in-trash renames.
pub struct AppTrashMediator {
	pub trash: Rc<RefCell<Trash>>,
	pub registers: Rc<RefCell<Registers>>,
}

impl TrashMediator for AppTrashMediator {
	fn is_trash_path(&self, path: &Path) -> bool {
		self.trash.borrow().has_path(path)
	}

	fn trash_contains(&self, trash_dir: Option<&Path>, path: &Path) -> bool {
		match trash_dir {
			Some(dir) => path.starts_with(dir),
			None => self.is_trash_path(path),
		}
	}

	fn rewrite_trash_name(&self, path: &Path) -> Option<PathBuf> {
		let name = path.file_name()?.to_string_lossy().into_owned();
		let base_dir = path.parent()?;
		Trash::gen_name(base_dir, &name)
	}

	fn path_renamed(&self, old: &Path, new: &Path) {
		self.registers.borrow_mut().rename_contents(old, new);
	}
}
