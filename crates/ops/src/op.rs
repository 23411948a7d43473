//! The operation model: kinds, inverses and argument sides.

use std::path::Path;

/// A concrete reversible file operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
	/// No operation; also the inverse of irreversible operations.
	None,
	/// An opaque user-level action described by its data payload.
	Usr,
	/// Recursive removal.
	Remove,
	/// Symlink-safe removal (never follows the link).
	RemoveSl,
	Copy,
	/// Copy replacing an existing destination.
	CopyF,
	/// Append the source's content to the destination.
	CopyA,
	Move,
	/// Move replacing an existing destination.
	MoveF,
	/// Append then remove the source.
	MoveA,
	/// Intermediate renames used by multi-file rename staging.
	MoveTmp1,
	MoveTmp2,
	MoveTmp3,
	MoveTmp4,
	Chown,
	Chgrp,
	Chmod,
	/// Recursive chmod.
	ChmodR,
	Symlink,
	/// Symlink replacing an existing link.
	Symlink2,
	Mkdir,
	Rmdir,
	Mkfile,
}

/// Data payload attached to an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OpData {
	#[default]
	None,
	/// Free text: a chmod mode string or a user-action description.
	Text(String),
	/// A uid or gid.
	Id(u32),
	/// Create parent directories as well (`mkdir -p`).
	Recursive,
}

/// Result of dispatching one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpsResult {
	Succeeded,
	Failed,
	/// The operation was skipped (by the user or by cancellation).
	Skipped,
}

/// Which of the two path buffers an argument slot refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
	Buf1,
	Buf2,
}

/// Argument sides of one direction of an operation: which buffer is
/// the first and second argument, which path must exist beforehand and
/// which must be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SideSpec {
	pub src: Option<Arg>,
	pub dst: Option<Arg>,
	pub exists: Option<Arg>,
	pub absent: Option<Arg>,
}

impl Op {
	/// The operation that reverses this one.  [`Op::None`] means the
	/// operation cannot be undone.
	pub fn inverse(self) -> Op {
		match self {
			Op::None | Op::Usr | Op::Remove => Op::None,
			Op::RemoveSl => Op::Symlink,
			Op::Copy | Op::CopyF | Op::CopyA => Op::Remove,
			Op::Move | Op::MoveF | Op::MoveA => Op::Move,
			Op::MoveTmp1 => Op::MoveTmp1,
			Op::MoveTmp2 => Op::MoveTmp2,
			Op::MoveTmp3 => Op::MoveTmp3,
			Op::MoveTmp4 => Op::MoveTmp4,
			Op::Chown => Op::Chown,
			Op::Chgrp => Op::Chgrp,
			Op::Chmod => Op::Chmod,
			Op::ChmodR => Op::ChmodR,
			Op::Symlink => Op::Remove,
			Op::Symlink2 => Op::RemoveSl,
			Op::Mkdir => Op::Rmdir,
			Op::Rmdir => Op::Mkdir,
			Op::Mkfile => Op::Remove,
		}
	}

	/// Whether an inverse operation exists.
	pub fn has_inverse(self) -> bool {
		self.inverse() != Op::None
	}

	/// Argument sides of the forward and the inverse form.
	pub fn sides(self) -> (SideSpec, SideSpec) {
		use Arg::{Buf1, Buf2};

		let spec = |src, dst, exists, absent| SideSpec {
			src,
			dst,
			exists,
			absent,
		};
		let none = SideSpec::default();

		match self {
			Op::None | Op::Usr => (none, none),
			Op::Remove => (spec(Some(Buf1), None, Some(Buf1), None), none),
			Op::RemoveSl => (
				spec(Some(Buf1), None, Some(Buf1), None),
				spec(Some(Buf2), Some(Buf1), None, None),
			),
			Op::Copy | Op::CopyF | Op::CopyA => (
				spec(Some(Buf1), Some(Buf2), Some(Buf1), Some(Buf2)),
				spec(Some(Buf2), None, Some(Buf2), None),
			),
			Op::Move | Op::MoveF | Op::MoveA => (
				spec(Some(Buf1), Some(Buf2), Some(Buf1), Some(Buf2)),
				spec(Some(Buf2), Some(Buf1), Some(Buf2), Some(Buf1)),
			),
			Op::MoveTmp1 => (
				spec(Some(Buf1), Some(Buf2), Some(Buf2), None),
				spec(Some(Buf2), Some(Buf1), Some(Buf2), None),
			),
			Op::MoveTmp2 => (
				spec(Some(Buf1), Some(Buf2), Some(Buf1), None),
				spec(Some(Buf2), Some(Buf1), Some(Buf1), None),
			),
			Op::MoveTmp3 => (
				spec(Some(Buf1), Some(Buf2), None, Some(Buf2)),
				spec(Some(Buf2), Some(Buf1), Some(Buf2), Some(Buf1)),
			),
			Op::MoveTmp4 => (
				spec(Some(Buf1), Some(Buf2), Some(Buf1), Some(Buf2)),
				spec(Some(Buf2), Some(Buf1), None, None),
			),
			Op::Chown | Op::Chgrp | Op::Chmod | Op::ChmodR => (
				spec(Some(Buf1), None, Some(Buf1), None),
				spec(Some(Buf1), None, Some(Buf1), None),
			),
			Op::Symlink => (
				spec(Some(Buf1), Some(Buf2), None, Some(Buf2)),
				spec(Some(Buf2), None, Some(Buf2), None),
			),
			Op::Symlink2 => (
				spec(Some(Buf1), Some(Buf2), None, None),
				spec(Some(Buf2), None, Some(Buf2), None),
			),
			Op::Mkdir => (
				spec(Some(Buf1), None, None, Some(Buf1)),
				spec(Some(Buf1), None, Some(Buf1), None),
			),
			Op::Rmdir => (
				spec(Some(Buf1), None, Some(Buf1), None),
				spec(Some(Buf1), None, None, Some(Buf1)),
			),
			Op::Mkfile => (
				spec(Some(Buf1), None, None, Some(Buf1)),
				spec(Some(Buf1), None, Some(Buf1), None),
			),
		}
	}
}

/// Human description of an operation, as shown in the undo list.
pub fn describe(op: Op, data: &OpData, src: Option<&Path>, dst: Option<&Path>) -> String {
	let p = |path: Option<&Path>| path.map(|p| p.display().to_string()).unwrap_or_default();

	match op {
		Op::None => "<no operation>".to_string(),
		Op::Usr => match data {
			OpData::Text(text) => text.clone(),
			_ => String::new(),
		},
		Op::Remove | Op::RemoveSl => format!("rm {}", p(src)),
		Op::Copy | Op::CopyA => format!("cp {} to {}", p(src), p(dst)),
		Op::CopyF => format!("cp -f {} to {}", p(src), p(dst)),
		Op::Move | Op::MoveA | Op::MoveTmp1 | Op::MoveTmp2 | Op::MoveTmp3 | Op::MoveTmp4 => {
			format!("mv {} to {}", p(src), p(dst))
		}
		Op::MoveF => format!("mv -f {} to {}", p(src), p(dst)),
		Op::Chown => match data {
			OpData::Id(uid) => format!("chown {uid} {}", p(src)),
			_ => format!("chown {}", p(src)),
		},
		Op::Chgrp => match data {
			OpData::Id(gid) => format!("chown :{gid} {}", p(src)),
			_ => format!("chown {}", p(src)),
		},
		Op::Chmod | Op::ChmodR => match data {
			OpData::Text(mode) => format!("chmod {mode} {}", p(src)),
			_ => format!("chmod {}", p(src)),
		},
		Op::Symlink | Op::Symlink2 => format!("ln -s {} to {}", p(src), p(dst)),
		Op::Mkdir => {
			if *data == OpData::Recursive {
				format!("mkdir {} -p", p(src))
			} else {
				format!("mkdir {}", p(src))
			}
		}
		Op::Rmdir => format!("rmdir {}", p(src)),
		Op::Mkfile => format!("touch {}", p(src)),
	}
}
