//! The grouped undo log.
//!
//! Entries live in an arena ordered by creation time; a cursor
//! separates the done part from the undone part.  Groups are runs of
//! entries sharing one user-visible message.  Storage is a ring: the
//! oldest entries are evicted when the level limit is exceeded, and a
//! group that loses members this way becomes incomplete and is never
//! replayed again.

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use skiff_ops::{describe, Arg, Op, OpData, OpsResult, SideSpec};
use tracing::{debug, trace};

use crate::types::{CancelFn, ExecFn, OpAvailFn, TrashMediator, UndoResult};

/// One direction of an entry.
struct OpRef {
	op: Op,
	data: OpData,
	spec: SideSpec,
}

/// One reversible step.
struct Entry {
	buf1: PathBuf,
	buf2: PathBuf,
	fwd: OpRef,
	inv: OpRef,
	group: u64,
}

impl Entry {
	fn arg(&self, arg: Option<Arg>) -> Option<&Path> {
		arg.map(|arg| match arg {
			Arg::Buf1 => self.buf1.as_path(),
			Arg::Buf2 => self.buf2.as_path(),
		})
	}
}

/// Bookkeeping of one group.
struct Group {
	msg: String,
	error: bool,
	/// Net undo/redo count: 0 means "as created".
	balance: i32,
	can_undo: bool,
	incomplete: bool,
}

/// The undo log.  See the module documentation.
pub struct UndoLog {
	exec: ExecFn,
	op_avail: Option<OpAvailFn>,
	cancel: Option<CancelFn>,
	trash: Option<Box<dyn TrashMediator>>,
	levels: Rc<Cell<i32>>,
	entries: VecDeque<Entry>,
	groups: HashMap<u64, Group>,
	/// Number of entries on the done side.
	cursor: usize,
	open: bool,
	pending_msg: Option<String>,
	/// Group that received the most recent operation, if it is still
	/// alive.
	last_group: Option<u64>,
	next_group_id: u64,
}

impl UndoLog {
	/// Creates a log.  `levels` is shared so the limit can change at
	/// runtime.
	pub fn new(
		exec: ExecFn,
		op_avail: Option<OpAvailFn>,
		cancel: Option<CancelFn>,
		levels: Rc<Cell<i32>>,
	) -> Self {
		Self {
			exec,
			op_avail,
			cancel,
			trash: None,
			levels,
			entries: VecDeque::new(),
			groups: HashMap::new(),
			cursor: 0,
			open: false,
			pending_msg: None,
			last_group: None,
			next_group_id: 1,
		}
	}

	/// Installs the trash integration seam.
	pub fn set_trash_mediator(&mut self, trash: Box<dyn TrashMediator>) {
		self.trash = Some(trash);
	}

	/// Drops all recorded state.
	pub fn reset(&mut self) {
		debug_assert!(!self.open);
		self.entries.clear();
		self.groups.clear();
		self.cursor = 0;
		self.last_group = None;
		self.pending_msg = None;
	}

	/* ===== GROUPING ===== */

	/// Opens a new group with the given user-visible message.
	pub fn group_open(&mut self, msg: &str) {
		debug_assert!(!self.open);
		self.open = true;
		self.pending_msg = Some(msg.to_string());
		self.last_group = None;
	}

	/// Reopens the most recent group.
	pub fn group_continue(&mut self) {
		debug_assert!(!self.open);
		self.open = true;
	}

	/// Closes the current group.  Incomplete groups at the old end of
	/// the log are dropped entirely.
	pub fn group_close(&mut self) {
		debug_assert!(self.open);
		self.open = false;

		while let Some(front) = self.entries.front() {
			if self
				.groups
				.get(&front.group)
				.is_none_or(|group| group.incomplete)
			{
				self.remove_at(0);
			} else {
				break;
			}
		}
	}

	/// Replaces the pending group message, returning the previous one.
	pub fn replace_group_msg(&mut self, msg: Option<&str>) -> Option<String> {
		let old = std::mem::replace(&mut self.pending_msg, msg.map(String::from));
		if let (Some(gid), Some(new)) = (self.last_group, &self.pending_msg)
			&& let Some(group) = self.groups.get_mut(&gid)
		{
			group.msg = new.clone();
		}
		old
	}

	/// Whether the last opened group committed no operations.
	pub fn last_group_empty(&self) -> bool {
		self.last_group.is_none()
	}

	/// Registers one reversible step in the open group.
	///
	/// Entries after the cursor are discarded first: once new work is
	/// recorded, the old future cannot be redone.
	pub fn add_op(&mut self, op: Op, do_data: OpData, undo_data: OpData, buf1: &Path, buf2: &Path) {
		debug_assert!(self.open);

		while self.entries.len() > self.cursor {
			self.remove_at(self.entries.len() - 1);
		}

		let levels = self.levels.get();
		while !self.entries.is_empty() && self.entries.len() >= levels.max(0) as usize {
			self.remove_at(0);
		}
		if levels <= 0 {
			return;
		}

		let gid = match self.last_group {
			Some(gid) => gid,
			None => {
				let gid = self.next_group_id;
				self.next_group_id += 1;
				self.groups.insert(
					gid,
					Group {
						msg: self.pending_msg.clone().unwrap_or_default(),
						error: false,
						balance: 0,
						can_undo: true,
						incomplete: false,
					},
				);
				gid
			}
		};
		self.last_group = Some(gid);

		if !op.has_inverse()
			&& let Some(group) = self.groups.get_mut(&gid)
		{
			group.can_undo = false;
		}

		let (fwd_spec, inv_spec) = op.sides();
		trace!(?op, ?buf1, ?buf2, "recording operation");
		self.entries.push_back(Entry {
			buf1: buf1.to_path_buf(),
			buf2: buf2.to_path_buf(),
			fwd: OpRef {
				op,
				data: do_data,
				spec: fwd_spec,
			},
			inv: OpRef {
				op: op.inverse(),
				data: undo_data,
				spec: inv_spec,
			},
			group: gid,
		});
		self.cursor = self.entries.len();
	}

	/* ===== UNDO / REDO ===== */

	/// Undoes the most recent group before the cursor.
	pub fn undo_group(&mut self) -> UndoResult {
		debug_assert!(!self.open);

		if self.cursor == 0 {
			return UndoResult::None;
		}

		let gid = self.entries[self.cursor - 1].group;
		let start = self.group_start(self.cursor);
		let (errors, disbalance, cant_undo) = {
			let group = &self.groups[&gid];
			(group.error, group.balance != 0, !group.can_undo)
		};

		if errors || disbalance || cant_undo || !self.replay_possible(start, self.cursor, false) {
			self.cursor = start;
			return if errors {
				UndoResult::Errors
			} else if disbalance {
				UndoResult::Balance
			} else if cant_undo {
				UndoResult::NoUndo
			} else {
				UndoResult::Broken
			};
		}

		if let Some(group) = self.groups.get_mut(&gid) {
			group.balance -= 1;
		}

		let mut skip = false;
		let mut failed = false;
		for idx in (start..self.cursor).rev() {
			if !skip {
				let entry = &self.entries[idx];
				let src = entry.arg(entry.inv.spec.src);
				let dst = entry.arg(entry.inv.spec.dst);
				match (self.exec)(entry.inv.op, &entry.inv.data, src, dst) {
					OpsResult::Skipped => {
						skip = true;
						if let Some(group) = self.groups.get_mut(&gid) {
							group.balance += 1;
						}
					}
					OpsResult::Failed => {
						failed = true;
						if let Some(group) = self.groups.get_mut(&gid) {
							group.error = true;
						}
					}
					OpsResult::Succeeded => {}
				}
			}

			self.cursor = idx;

			if idx > start && self.cancel.as_ref().is_some_and(|cancel| cancel()) {
				// Leave the group as it was, but poisoned: a partial
				// replay is not a state either direction can build on.
				if let Some(group) = self.groups.get_mut(&gid) {
					group.balance += 1;
					group.error = true;
				}
				debug!(group = gid, "undo cancelled");
				return UndoResult::Cancelled;
			}
		}

		if skip {
			UndoResult::Skipped
		} else if failed {
			UndoResult::Fail
		} else {
			UndoResult::Success
		}
	}

	/// Redoes the group at the cursor.
	pub fn redo_group(&mut self) -> UndoResult {
		debug_assert!(!self.open);

		if self.cursor == self.entries.len() {
			return UndoResult::None;
		}

		let gid = self.entries[self.cursor].group;
		let end = self.group_end(self.cursor);
		let (errors, disbalance) = {
			let group = &self.groups[&gid];
			(group.error, group.balance == 0)
		};

		if errors || disbalance || !self.replay_possible(self.cursor, end, true) {
			self.cursor = end;
			return if errors {
				UndoResult::Errors
			} else if disbalance {
				UndoResult::Balance
			} else {
				UndoResult::Broken
			};
		}

		if let Some(group) = self.groups.get_mut(&gid) {
			group.balance += 1;
		}

		let mut skip = false;
		let mut failed = false;
		let start = self.cursor;
		for idx in start..end {
			if !skip {
				let entry = &self.entries[idx];
				let src = entry.arg(entry.fwd.spec.src);
				let dst = entry.arg(entry.fwd.spec.dst);
				match (self.exec)(entry.fwd.op, &entry.fwd.data, src, dst) {
					OpsResult::Skipped => {
						skip = true;
						if let Some(group) = self.groups.get_mut(&gid) {
							group.balance -= 1;
						}
					}
					OpsResult::Failed => {
						failed = true;
						if let Some(group) = self.groups.get_mut(&gid) {
							group.error = true;
						}
					}
					OpsResult::Succeeded => {}
				}
			}

			self.cursor = idx + 1;

			if idx + 1 < end && self.cancel.as_ref().is_some_and(|cancel| cancel()) {
				if let Some(group) = self.groups.get_mut(&gid) {
					group.balance -= 1;
					group.error = true;
				}
				debug!(group = gid, "redo cancelled");
				return UndoResult::Cancelled;
			}
		}

		if skip {
			UndoResult::Skipped
		} else if failed {
			UndoResult::Fail
		} else {
			UndoResult::Success
		}
	}

	/* ===== LISTING ===== */

	/// The group messages, newest first.  With `detail`, each group is
	/// followed by per-operation `do`/`undo` lines.
	pub fn list(&self, detail: bool) -> Vec<String> {
		debug_assert!(!self.open);

		let mut out = Vec::new();
		let mut left = self.levels.get().max(0) as usize;
		let mut idx = self.entries.len();

		while idx > 0 && left > 0 {
			let gid = self.entries[idx - 1].group;
			out.push(self.groups[&gid].msg.clone());

			while idx > 0 && self.entries[idx - 1].group == gid {
				if detail {
					if left == 0 {
						break;
					}
					let entry = &self.entries[idx - 1];
					out.push(format!(
						"  do: {}",
						describe(
							entry.fwd.op,
							&entry.fwd.data,
							entry.arg(entry.fwd.spec.src),
							entry.arg(entry.fwd.spec.dst),
						)
					));
					out.push(format!(
						"  undo: {}",
						describe(
							entry.inv.op,
							&entry.inv.data,
							entry.arg(entry.inv.spec.src),
							entry.arg(entry.inv.spec.dst),
						)
					));
					left -= 1;
				}
				idx -= 1;
			}

			if !detail {
				left -= 1;
			}
		}

		out
	}

	/// Index of the cursor within the [`UndoLog::list`] output.
	pub fn position(&self, detail: bool) -> usize {
		debug_assert!(!self.open);

		let mut groups = 0;
		let mut prev: Option<u64> = None;
		for entry in self.entries.iter().skip(self.cursor) {
			if prev != Some(entry.group) {
				groups += 1;
				prev = Some(entry.group);
			}
		}

		if detail {
			groups + 2 * (self.entries.len() - self.cursor)
		} else {
			groups
		}
	}

	/// Number of recorded entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/* ===== TRASH CORRELATION ===== */

	/// Drops entries whose relevant side is inside the given trash
	/// directory (any known trash when `None`).  This is how emptying
	/// a trash reconciles with the log.
	pub fn clear_cmds_with_trash(&mut self, trash_dir: Option<&Path>) {
		debug_assert!(!self.open);

		let Some(trash) = &self.trash else {
			return;
		};

		let mut to_remove = Vec::new();
		let mut idx = self.entries.len();
		while idx > 0 {
			idx -= 1;
			let entry = &self.entries[idx];
			let undone = self.groups[&entry.group].balance < 0;
			let side = if undone {
				entry.arg(entry.fwd.spec.exists)
			} else {
				entry.arg(entry.inv.spec.exists)
			};
			if side.is_some_and(|path| trash.trash_contains(trash_dir, path)) {
				to_remove.push(idx);
			}
		}

		for idx in to_remove {
			self.remove_at(idx);
		}
	}

	/* ===== INTERNALS ===== */

	fn group_start(&self, end: usize) -> usize {
		let gid = self.entries[end - 1].group;
		let mut start = end;
		while start > 0 && self.entries[start - 1].group == gid {
			start -= 1;
		}
		start
	}

	fn group_end(&self, start: usize) -> usize {
		let gid = self.entries[start].group;
		let mut end = start;
		while end < self.entries.len() && self.entries[end].group == gid {
			end += 1;
		}
		end
	}

	/// Checks whether every step of the range can run, renaming
	/// occupied in-trash destinations out of the way.
	fn replay_possible(&mut self, start: usize, end: usize, forward: bool) -> bool {
		for idx in start..end {
			let entry = &self.entries[idx];
			let opref = if forward { &entry.fwd } else { &entry.inv };

			if let Some(avail) = self.op_avail.as_ref().and_then(|avail| avail(opref.op)) {
				if avail {
					continue;
				}
				return false;
			}

			if let Some(path) = entry.arg(opref.spec.exists)
				&& !path_exists(path)
			{
				return false;
			}

			if let Some(path) = entry.arg(opref.spec.absent)
				&& path_exists(path)
			{
				let in_trash = entry
					.arg(opref.spec.dst)
					.zip(self.trash.as_deref())
					.is_some_and(|(dst, trash)| trash.is_trash_path(dst));
				if !in_trash {
					return false;
				}
				if !self.rename_in_trash(idx) {
					return false;
				}
			}
		}
		true
	}

	/// Renames the second path buffer of an entry to an unused in-trash
	/// name.  Registers are notified through the mediator.
	fn rename_in_trash(&mut self, idx: usize) -> bool {
		let Some(trash) = self.trash.as_deref() else {
			return false;
		};

		let old = self.entries[idx].buf2.clone();
		let Some(new) = trash.rewrite_trash_name(&old) else {
			return false;
		};

		debug!(?old, ?new, "renaming trashed file in the undo log");
		trash.path_renamed(&old, &new);
		self.entries[idx].buf2 = new;
		true
	}

	/// Removes the entry at `idx`, keeping cursor and group records
	/// consistent.  A group that keeps other members becomes
	/// incomplete.
	fn remove_at(&mut self, idx: usize) {
		let Some(entry) = self.entries.remove(idx) else {
			return;
		};

		if idx < self.cursor {
			self.cursor -= 1;
		}

		let survives = self.entries.iter().any(|e| e.group == entry.group);
		if survives {
			if let Some(group) = self.groups.get_mut(&entry.group) {
				group.incomplete = true;
			}
		} else {
			self.groups.remove(&entry.group);
			if self.last_group == Some(entry.group) {
				self.last_group = None;
			}
		}
	}
}

fn path_exists(path: &Path) -> bool {
	fs::symlink_metadata(path).is_ok()
}
