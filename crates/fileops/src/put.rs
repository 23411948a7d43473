//! Pasting files from a register with interactive conflict resolution.
//!
//! A [`PutSession`] is an owned state machine held by the active modal
//! controller.  Its main loop walks the register in a safe order and
//! stops whenever user input is required: instead of blocking it
//! *returns* a prompt, and the prompt-completion callback re-enters
//! the loop through [`PutSession::resolve_conflict`] or
//! [`PutSession::resolve_data_loss`].

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use skiff_ops::{Op, OpData, OpsHandle, OpsResult};
use skiff_undo::UndoLog;
use thiserror::Error;
use tracing::{debug, info};

use crate::bg::{self, BgTask};
use crate::common::{
	dst_name, is_in_subtree, make_name_unique, make_rel_path, paths_equal, real_path_depth,
};
use crate::registers::Registers;
use crate::trash::Trash;
use crate::view::View;

/// What a put-style operation does with its sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutKind {
	Copy,
	Move,
	LinkAbs,
	LinkRel,
}

#[derive(Debug, Error)]
pub enum PutError {
	#[error("no such register")]
	NoRegister,
	#[error("register is empty")]
	EmptyRegister,
	#[error("two destination files have name {0:?}")]
	DuplicateName(String),
	#[error("file {0:?} already exists")]
	DestinationExists(PathBuf),
	#[error("no prompt of this kind is pending")]
	NoPendingPrompt,
}

/// Summary of a finished (or aborted) put.
#[derive(Debug, Clone)]
pub struct PutStats {
	pub inserted: usize,
	pub aborted: bool,
	/// Where the view cursor should go: the last conflict if any,
	/// otherwise the first committed destination.
	pub cursor: Option<PathBuf>,
	pub errors: Option<String>,
	pub warnings: Vec<String>,
}

/// Choice offered for one name conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOption {
	Rename,
	Compare,
	Skip,
	SkipAll,
	Overwrite,
	OverwriteAll,
	Append,
	Merge,
	MergeAll,
	Abort,
}

/// A pending name conflict.
#[derive(Debug, Clone)]
pub struct ConflictInfo {
	pub dst_name: String,
	pub caused_by: PathBuf,
	/// Source and destination are the same file.
	pub same_file: bool,
	pub options: Vec<ConflictOption>,
}

/// Answer to a name conflict.
#[derive(Debug, Clone)]
pub enum ConflictResponse {
	/// Retry under a different destination name.
	Rename(String),
	/// Show the metadata difference and ask again.
	Compare,
	Skip,
	SkipAll,
	Overwrite,
	OverwriteAll,
	Append,
	Merge,
	MergeAll,
	Abort,
}

/// Overwriting a directory would destroy sources that are still
/// queued.
#[derive(Debug, Clone)]
pub struct DataLossInfo {
	pub dst: PathBuf,
	pub src: PathBuf,
	pub lost: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub enum DataLossResponse {
	Yes,
	No,
	Abort,
}

/// What one step of the session produced.
pub enum PutOutcome {
	Done(PutStats),
	Conflict(ConflictInfo),
	DataLoss(DataLossInfo),
}

enum Pending {
	Conflict {
		dst_name: String,
		caused_by: PathBuf,
	},
	DataLoss {
		dst: PathBuf,
		src: PathBuf,
		lost: Vec<usize>,
		excluded: Vec<usize>,
	},
}

enum StepResult {
	Ok,
	Prompt(Pending),
	Fatal,
}

enum Clash {
	Clean,
	Prompt(Pending),
}

/// The put state machine.  Valid from creation until the outcome
/// [`PutOutcome::Done`] is returned; two sessions never run at once
/// because the controller owns at most one.
pub struct PutSession {
	registers: Rc<RefCell<Registers>>,
	trash: Rc<RefCell<Trash>>,
	undo: Rc<RefCell<UndoLog>>,
	reg_name: char,
	kind: PutKind,
	dst_dir: PathBuf,
	/// Custom processing order of register slots.
	order: Vec<usize>,
	index: usize,
	processed: usize,
	skip_all: bool,
	overwrite_all: bool,
	merge: bool,
	merge_all: bool,
	append: bool,
	allow_merge: bool,
	allow_merge_all: bool,
	override_dst_name: Option<String>,
	ops: OpsHandle,
	committed: Vec<PathBuf>,
	last_conflict: Option<PathBuf>,
	warnings: Vec<String>,
	pending: Option<Pending>,
}

impl std::fmt::Debug for PutSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PutSession")
			.field("reg_name", &self.reg_name)
			.field("kind", &self.kind)
			.field("dst_dir", &self.dst_dir)
			.field("index", &self.index)
			.field("processed", &self.processed)
			.finish_non_exhaustive()
	}
}

impl PutSession {
	/// Prepares a put of register content into the view (copy or
	/// move).
	pub fn put(
		view: &View,
		at: Option<usize>,
		reg_name: char,
		mv: bool,
		registers: Rc<RefCell<Registers>>,
		trash: Rc<RefCell<Trash>>,
		undo: Rc<RefCell<UndoLog>>,
	) -> Result<Self, PutError> {
		let kind = if mv { PutKind::Move } else { PutKind::Copy };
		Self::new(view, at, reg_name, kind, registers, trash, undo)
	}

	/// Prepares symlinking of register content into the view.
	pub fn put_links(
		view: &View,
		reg_name: char,
		relative: bool,
		registers: Rc<RefCell<Registers>>,
		trash: Rc<RefCell<Trash>>,
		undo: Rc<RefCell<UndoLog>>,
	) -> Result<Self, PutError> {
		let kind = if relative {
			PutKind::LinkRel
		} else {
			PutKind::LinkAbs
		};
		Self::new(view, None, reg_name, kind, registers, trash, undo)
	}

	fn new(
		view: &View,
		at: Option<usize>,
		reg_name: char,
		kind: PutKind,
		registers: Rc<RefCell<Registers>>,
		trash: Rc<RefCell<Trash>>,
		undo: Rc<RefCell<UndoLog>>,
	) -> Result<Self, PutError> {
		let reg_name = reg_name.to_ascii_lowercase();
		if !crate::registers::is_valid_name(reg_name) {
			return Err(PutError::NoRegister);
		}

		let dst_dir = view.dst_dir(at);
		let (mut order, files) = {
			let regs = registers.borrow();
			if !regs.has_files(reg_name) {
				return Err(PutError::EmptyRegister);
			}
			let count = regs.slot_count(reg_name);
			let files: Vec<Option<PathBuf>> =
				(0..count).map(|i| regs.slot(reg_name, i)).collect();
			((0..count).collect::<Vec<usize>>(), files)
		};

		// When clashes are harmful, process deeper sources first and
		// push those that would shadow a parent of another pending
		// source to the very end, in reverse order among themselves.
		if matches!(kind, PutKind::Copy | PutKind::Move) {
			order.sort_by_key(|&i| {
				std::cmp::Reverse(files[i].as_deref().map_or(0, real_path_depth))
			});

			let mut nclashes = 0;
			let mut i = 0;
			while i < order.len() - nclashes {
				let id = order[i];
				let clashes = files[id]
					.as_deref()
					.is_some_and(|src| is_dir_clash(src, &dst_dir, &trash.borrow()));
				if clashes {
					order.remove(i);
					order.insert(order.len() - nclashes, id);
					nclashes += 1;
				} else {
					i += 1;
				}
			}
		}

		let descr = match kind {
			PutKind::Move => "Putting",
			PutKind::Copy => "putting",
			PutKind::LinkAbs | PutKind::LinkRel => "Symlinking",
		};
		let mut ops = OpsHandle::new(descr, &dst_dir);
		for file in files.iter().flatten() {
			ops.enqueue(file, &dst_dir);
		}

		Ok(Self {
			registers,
			trash,
			undo,
			reg_name,
			kind,
			dst_dir,
			order,
			index: 0,
			processed: 0,
			skip_all: false,
			overwrite_all: false,
			merge: false,
			merge_all: false,
			append: false,
			allow_merge: false,
			allow_merge_all: false,
			override_dst_name: None,
			ops,
			committed: Vec::new(),
			last_conflict: None,
			warnings: Vec::new(),
			pending: None,
		})
	}

	/// Starts the main loop.
	pub fn run(&mut self) -> PutOutcome {
		let from_trash = self
			.slot_path(0)
			.is_some_and(|path| self.trash.borrow().has_path(&path));
		let descr = match self.kind {
			PutKind::LinkAbs => "put absolute links",
			PutKind::LinkRel => "put relative links",
			PutKind::Move => "Put",
			PutKind::Copy if from_trash => "Put",
			PutKind::Copy => "put",
		};
		let msg = format!("{descr} in {}: ", self.dst_dir.display());

		{
			let mut undo = self.undo.borrow_mut();
			undo.group_open(&msg);
			undo.group_close();
		}

		self.main_loop(false)
	}

	/// Answers a pending name conflict and continues the loop.
	pub fn resolve_conflict(&mut self, response: ConflictResponse) -> Result<PutOutcome, PutError> {
		let Some(Pending::Conflict { dst_name, caused_by }) = self.pending.take() else {
			return Err(PutError::NoPendingPrompt);
		};

		// The conflicting destination is remembered so the cursor can
		// land on it afterwards.
		let dst_path = self.dst_dir.join(&dst_name);
		self.last_conflict = Some(dst_path);

		debug!(name = %dst_name, ?response, "conflict resolved");

		let outcome = match response {
			ConflictResponse::Rename(new_name) => {
				if new_name.is_empty() {
					// Nothing entered; the conflict stays pending.
					let info = self.conflict_info(&dst_name, &caused_by);
					self.pending = Some(Pending::Conflict { dst_name, caused_by });
					return Ok(PutOutcome::Conflict(info));
				}
				self.last_conflict = Some(self.dst_dir.join(&new_name));
				self.override_dst_name = Some(new_name);
				self.step_then_loop(false)
			}
			ConflictResponse::Compare => {
				let info = self.conflict_info(&dst_name, &caused_by);
				self.pending = Some(Pending::Conflict { dst_name, caused_by });
				PutOutcome::Conflict(info)
			}
			ConflictResponse::Skip => {
				self.index += 1;
				self.main_loop(false)
			}
			ConflictResponse::SkipAll => {
				self.skip_all = true;
				self.index += 1;
				self.main_loop(false)
			}
			ConflictResponse::Overwrite => self.step_then_loop(true),
			ConflictResponse::OverwriteAll => {
				self.overwrite_all = true;
				self.step_then_loop(true)
			}
			ConflictResponse::Append => {
				self.append = true;
				self.step_then_loop(false)
			}
			ConflictResponse::Merge if self.allow_merge => {
				self.merge = true;
				self.step_then_loop(true)
			}
			ConflictResponse::MergeAll if self.allow_merge_all => {
				self.merge_all = true;
				self.step_then_loop(true)
			}
			ConflictResponse::Merge | ConflictResponse::MergeAll => {
				// Not offered for this conflict; ask again.
				let info = self.conflict_info(&dst_name, &caused_by);
				self.pending = Some(Pending::Conflict { dst_name, caused_by });
				PutOutcome::Conflict(info)
			}
			ConflictResponse::Abort => self.finish(true),
		};
		Ok(outcome)
	}

	/// Answers a pending data-loss confirmation and continues.
	pub fn resolve_data_loss(
		&mut self,
		response: DataLossResponse,
	) -> Result<PutOutcome, PutError> {
		let Some(Pending::DataLoss {
			dst,
			src,
			lost,
			excluded,
		}) = self.pending.take()
		else {
			return Err(PutError::NoPendingPrompt);
		};

		let outcome = match response {
			DataLossResponse::Yes => {
				{
					let mut regs = self.registers.borrow_mut();
					for &i in &lost {
						regs.take_slot(self.reg_name, self.order[i]);
					}
				}
				self.apply_exclusions(&excluded);
				self.step_then_loop(true)
			}
			DataLossResponse::No => {
				let dst_name = dst
					.file_name()
					.map(|n| n.to_string_lossy().into_owned())
					.unwrap_or_default();
				self.prepare_merge_flags(&src, &dst);
				let info = self.conflict_info(&dst_name, &src);
				self.pending = Some(Pending::Conflict {
					dst_name,
					caused_by: src,
				});
				PutOutcome::Conflict(info)
			}
			DataLossResponse::Abort => self.finish(true),
		};
		Ok(outcome)
	}

	/// Metadata difference of the pending conflict, for the `compare`
	/// option.
	pub fn describe_difference(&self) -> Option<String> {
		let Some(Pending::Conflict { dst_name, caused_by }) = &self.pending else {
			return None;
		};
		let dst_path = self.dst_dir.join(dst_name);
		let dst = fs::metadata(&dst_path).ok()?;
		let src = fs::metadata(caused_by).ok()?;

		let mut text = format!(
			"Target file: {}\nSource file: {}\n",
			dst_path.display(),
			caused_by.display()
		);

		let secs = |meta: &fs::Metadata| {
			meta.modified()
				.ok()
				.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
				.map_or(0, |d| d.as_secs())
		};
		if secs(&dst) == secs(&src) {
			text.push_str(&format!("\nSame modification date: {}\n", secs(&dst)));
		} else {
			text.push_str(&format!(
				"\nModification dates:\n{}\n{}\n",
				secs(&dst),
				secs(&src)
			));
		}

		if dst.len() == src.len() {
			text.push_str(&format!("\nSame size: {}\n", dst.len()));
		} else {
			text.push_str(&format!("\nSizes:\n{}\n{}\n", dst.len(), src.len()));
		}

		Some(text)
	}

	/* ===== MAIN LOOP ===== */

	fn main_loop(&mut self, mut force: bool) -> PutOutcome {
		while self.index < self.order.len() {
			match self.put_one(force) {
				StepResult::Ok => self.index += 1,
				StepResult::Prompt(pending) => {
					let outcome = self.outcome_of(&pending);
					self.pending = Some(pending);
					return outcome;
				}
				StepResult::Fatal => break,
			}
			force = false;
		}
		self.finish(false)
	}

	fn step_then_loop(&mut self, force: bool) -> PutOutcome {
		match self.put_one(force) {
			StepResult::Ok => {
				self.index += 1;
				self.main_loop(false)
			}
			StepResult::Prompt(pending) => {
				let outcome = self.outcome_of(&pending);
				self.pending = Some(pending);
				outcome
			}
			StepResult::Fatal => self.finish(false),
		}
	}

	fn outcome_of(&self, pending: &Pending) -> PutOutcome {
		match pending {
			Pending::Conflict { dst_name, caused_by } => {
				PutOutcome::Conflict(self.conflict_info(dst_name, caused_by))
			}
			Pending::DataLoss { dst, src, lost, .. } => {
				let regs = self.registers.borrow();
				PutOutcome::DataLoss(DataLossInfo {
					dst: dst.clone(),
					src: src.clone(),
					lost: lost
						.iter()
						.filter_map(|&i| regs.slot(self.reg_name, self.order[i]))
						.collect(),
				})
			}
		}
	}

	fn finish(&mut self, aborted: bool) -> PutOutcome {
		self.registers.borrow_mut().pack(self.reg_name);

		let cursor = self
			.last_conflict
			.clone()
			.or_else(|| self.committed.first().cloned());

		info!(
			inserted = self.processed,
			aborted, "put session finished"
		);

		PutOutcome::Done(PutStats {
			inserted: self.processed,
			aborted,
			cursor,
			errors: self.ops.error_summary(),
			warnings: std::mem::take(&mut self.warnings),
		})
	}

	/* ===== ONE FILE ===== */

	fn put_one(&mut self, force_in: bool) -> StepResult {
		if self.ops.cancelled() {
			return StepResult::Fatal;
		}

		let force = force_in || self.overwrite_all || self.merge_all;
		let merge = self.merge || self.merge_all;

		let Some(filename) = self.slot_path(self.index) else {
			// Consumed by a move or excluded from processing.
			return StepResult::Ok;
		};
		let Ok(src_meta) = fs::symlink_metadata(&filename) else {
			// The source is gone; not an error.
			return StepResult::Ok;
		};

		let from_trash = self.trash.borrow().has_path(&filename);
		let mv = from_trash || self.kind == PutKind::Move;

		let mut src_buf = filename.clone();
		let name = self
			.override_dst_name
			.take()
			.unwrap_or_else(|| dst_name(&filename, from_trash));
		let dst_path = self.dst_dir.join(&name);

		let mut safe_operation = false;

		if !self.append && path_exists(&dst_path) {
			if force {
				if paths_equal(&src_buf, &dst_path) {
					return StepResult::Ok;
				}

				let dst_meta = fs::symlink_metadata(&dst_path);
				if let Ok(dst_meta) = dst_meta
					&& (!merge || dst_meta.is_dir() != src_meta.is_dir())
				{
					if dst_meta.is_dir() {
						match self.handle_clashing(&src_buf, &dst_path) {
							Clash::Prompt(pending) => return StepResult::Prompt(pending),
							Clash::Clean => {}
						}

						if is_in_subtree(&src_buf, &dst_path) {
							// The destination is an ancestor of the
							// source and must not be deleted first.
							safe_operation = true;
						}
					}

					if !safe_operation {
						if self
							.ops
							.perform(Op::RemoveSl, &OpData::None, Some(&dst_path), None)
							!= OpsResult::Succeeded
						{
							self.warnings
								.push(format!("Failed to remove {}", dst_path.display()));
							return StepResult::Ok;
						}
						// Recorded as a plain removal: the overwritten
						// file is gone for good, which also marks the
						// group as not undoable.
						let mut undo = self.undo.borrow_mut();
						undo.group_continue();
						undo.add_op(
							Op::Remove,
							OpData::None,
							OpData::None,
							&dst_path,
							Path::new(""),
						);
						undo.group_close();
					}
				}
			} else if self.skip_all {
				return StepResult::Ok;
			} else {
				self.prepare_merge_flags(&src_buf, &dst_path);
				return StepResult::Prompt(Pending::Conflict {
					dst_name: name,
					caused_by: src_buf,
				});
			}
		}

		let mut op = match self.kind {
			PutKind::LinkAbs => Op::Symlink,
			PutKind::LinkRel => {
				src_buf = make_rel_path(&filename, &self.dst_dir);
				Op::Symlink
			}
			_ if self.append => {
				self.append = false;
				if mv { Op::MoveA } else { Op::CopyA }
			}
			_ if mv => {
				if merge {
					Op::MoveF
				} else {
					Op::Move
				}
			}
			_ => {
				if merge {
					Op::CopyF
				} else {
					Op::Copy
				}
			}
		};

		let success;
		if mv && merge && src_meta.is_dir() {
			// Merging a directory on move cannot be expressed as one
			// operation; every step lands in the undo group.
			self.undo.borrow_mut().group_continue();
			success = self.merge_dirs(&src_buf, &dst_path).is_ok();
			self.undo.borrow_mut().group_close();
		} else if safe_operation {
			// Shuffle `src` to a unique name, drop the old destination,
			// then rename into place.  The original is about to be
			// removed anyway, so a copy is promoted to a move.
			if op == Op::Copy {
				op = Op::Move;
			}
			let unique = make_name_unique(&dst_path);
			success = self
				.ops
				.perform(op, &OpData::None, Some(&src_buf), Some(&unique))
				== OpsResult::Succeeded
				&& self
					.ops
					.perform(Op::RemoveSl, &OpData::None, Some(&dst_path), None)
					== OpsResult::Succeeded
				&& self
					.ops
					.perform(Op::Move, &OpData::None, Some(&unique), Some(&dst_path))
					== OpsResult::Succeeded;
		} else {
			success = self
				.ops
				.perform(op, &OpData::None, Some(&src_buf), Some(&dst_path))
				== OpsResult::Succeeded;
		}

		if success {
			if !path_exists(&dst_path) {
				// The executor lied about a cancelled transfer.
				return StepResult::Fatal;
			}

			{
				let mut undo = self.undo.borrow_mut();
				undo.group_continue();
				let msg = undo.replace_group_msg(None).unwrap_or_default();
				let msg = if msg.ends_with(": ") {
					format!("{msg}{name}")
				} else {
					format!("{msg}, {name}")
				};
				undo.replace_group_msg(Some(&msg));
				if !(mv && merge && src_meta.is_dir()) {
					undo.add_op(op, OpData::None, OpData::None, &src_buf, &dst_path);
				}
				undo.group_close();
			}

			self.processed += 1;
			if mv {
				self.registers
					.borrow_mut()
					.take_slot(self.reg_name, self.order[self.index]);
			}
			self.committed.push(dst_path);
		}

		StepResult::Ok
	}

	/// Recursively merges `src` into `dst`, registering every step.
	fn merge_dirs(&mut self, src: &Path, dst: &Path) -> Result<(), ()> {
		let src_meta = fs::metadata(src).map_err(|_| ())?;

		// The target may or may not exist yet.
		let _ = skiff_ops::perform_operation(Op::Mkdir, &OpData::Recursive, Some(dst), None);

		let dir = fs::read_dir(src).map_err(|_| ())?;
		for entry in dir {
			let entry = entry.map_err(|_| ())?;
			let src_path = entry.path();
			let dst_path = dst.join(entry.file_name());

			if fs::metadata(&dst_path).is_ok_and(|m| m.is_dir()) {
				self.merge_dirs(&src_path, &dst_path)?;
			} else {
				if self
					.ops
					.perform(Op::MoveF, &OpData::None, Some(&src_path), Some(&dst_path))
					!= OpsResult::Succeeded
				{
					return Err(());
				}
				self.undo.borrow_mut().add_op(
					Op::MoveF,
					OpData::None,
					OpData::None,
					&src_path,
					&dst_path,
				);
			}
		}

		let removed = self.ops.perform(Op::Rmdir, &OpData::None, Some(src), None);
		if removed == OpsResult::Succeeded {
			self.undo
				.borrow_mut()
				.add_op(Op::Rmdir, OpData::None, OpData::None, src, Path::new(""));
		}

		// Cloning properties comes last: modifying the directory
		// would touch its timestamps again.
		let _ = fs::set_permissions(dst, src_meta.permissions());

		if removed == OpsResult::Succeeded {
			Ok(())
		} else {
			Err(())
		}
	}

	/// Scans the rest of the register before a directory is
	/// overwritten: queued sources inside `dst` would be lost (user
	/// must confirm), queued sources inside `src` become redundant and
	/// are excluded with a warning.
	fn handle_clashing(&mut self, src: &Path, dst: &Path) -> Clash {
		let mut lost = Vec::new();
		let mut excluded = Vec::new();
		{
			let regs = self.registers.borrow();
			for i in self.index + 1..self.order.len() {
				let Some(another) = regs.slot(self.reg_name, self.order[i]) else {
					continue;
				};
				let sub_path = is_in_subtree(&another, src);
				if is_in_subtree(&another, dst) && !sub_path {
					lost.push(i);
				}
				if sub_path {
					excluded.push(i);
				}
			}
		}

		if !lost.is_empty() {
			return Clash::Prompt(Pending::DataLoss {
				dst: dst.to_path_buf(),
				src: src.to_path_buf(),
				lost,
				excluded,
			});
		}

		if !excluded.is_empty() {
			self.apply_exclusions(&excluded);
		}
		Clash::Clean
	}

	fn apply_exclusions(&mut self, excluded: &[usize]) {
		let mut regs = self.registers.borrow_mut();
		for &i in excluded {
			if let Some(path) = regs.slot(self.reg_name, self.order[i]) {
				self.warnings.push(format!(
					"excluded from further processing: {}",
					path.display()
				));
				regs.take_slot(self.reg_name, self.order[i]);
			}
		}
	}

	/// Computes which merge options the next conflict prompt offers.
	fn prepare_merge_flags(&mut self, src: &Path, dst: &Path) {
		if matches!(self.kind, PutKind::Copy | PutKind::Move) {
			let src_is_dir = fs::symlink_metadata(src).is_ok_and(|m| m.is_dir());
			let dst_is_dir = fs::symlink_metadata(dst).is_ok_and(|m| m.is_dir());
			self.allow_merge = src_is_dir && dst_is_dir;
			self.allow_merge_all = self.unprocessed_dirs_present();
		} else {
			self.allow_merge = false;
			self.allow_merge_all = false;
		}
	}

	fn unprocessed_dirs_present(&self) -> bool {
		let regs = self.registers.borrow();
		(self.index..self.order.len()).any(|i| {
			regs.slot(self.reg_name, self.order[i])
				.is_some_and(|path| fs::symlink_metadata(path).is_ok_and(|m| m.is_dir()))
		})
	}

	fn conflict_info(&self, dst_name: &str, caused_by: &Path) -> ConflictInfo {
		let dst_path = self.dst_dir.join(dst_name);
		let same_file = paths_equal(&dst_path, caused_by);

		let mut options = Vec::new();
		if !same_file {
			options.push(ConflictOption::Compare);
		}
		options.push(ConflictOption::Rename);
		options.push(ConflictOption::Skip);
		options.push(ConflictOption::SkipAll);
		if !same_file {
			let regular = |p: &Path| fs::symlink_metadata(p).is_ok_and(|m| m.is_file());
			if regular(&dst_path) && regular(caused_by) {
				options.push(ConflictOption::Append);
			}
			options.push(ConflictOption::Overwrite);
			options.push(ConflictOption::OverwriteAll);
			if self.allow_merge {
				options.push(ConflictOption::Merge);
			}
			if self.allow_merge_all {
				options.push(ConflictOption::MergeAll);
			}
		}
		options.push(ConflictOption::Abort);

		ConflictInfo {
			dst_name: dst_name.to_string(),
			caused_by: caused_by.to_path_buf(),
			same_file,
			options,
		}
	}

	fn slot_path(&self, index: usize) -> Option<PathBuf> {
		let slot = *self.order.get(index)?;
		self.registers.borrow().slot(self.reg_name, slot)
	}
}

/// Whether putting `src` into `dst_dir` would overwrite a directory.
fn is_dir_clash(src: &Path, dst_dir: &Path, trash: &Trash) -> bool {
	let name = dst_name(src, trash.has_path(src));
	fs::metadata(dst_dir.join(name)).is_ok_and(|m| m.is_dir())
}

fn path_exists(path: &Path) -> bool {
	fs::symlink_metadata(path).is_ok()
}

/* ===== BACKGROUND VARIANT ===== */

/// Validates and enqueues a background put.
///
/// Unlike the interactive session this never prompts: the register
/// must exist, no two sources may map to the same destination name and
/// no destination may exist beforehand (unless source and destination
/// are the same file).
pub fn put_bg(
	view: &View,
	at: Option<usize>,
	reg_name: char,
	mv: bool,
	registers: &Registers,
	trash: &Trash,
) -> Result<BgTask, PutError> {
	let reg_name = reg_name.to_ascii_lowercase();
	if !crate::registers::is_valid_name(reg_name) {
		return Err(PutError::NoRegister);
	}
	if !registers.has_files(reg_name) {
		return Err(PutError::EmptyRegister);
	}

	let dst_dir = view.dst_dir(at);
	let mut pairs: Vec<(PathBuf, PathBuf)> = Vec::new();

	for src in registers.files(reg_name) {
		if fs::symlink_metadata(&src).is_err() {
			// Skip sources that vanished.
			continue;
		}

		let name = dst_name(&src, trash.has_path(&src));
		let dst = dst_dir.join(&name);

		if pairs.iter().any(|(_, d)| {
			d.file_name()
				.is_some_and(|existing| existing.to_string_lossy() == name)
		}) {
			return Err(PutError::DuplicateName(name));
		}

		if !paths_equal(&src, &dst) && path_exists(&dst) {
			return Err(PutError::DestinationExists(dst));
		}

		pairs.push((src, dst));
	}

	Ok(bg::cpmv_bg(pairs, mv))
}
