//! Executors behind the single dispatch entry point.
//!
//! Every filesystem mutation of the application funnels through
//! [`perform_operation`] so that progress accounting and cancellation
//! can live in one place.  Executors are idempotent where physically
//! possible: removing a missing file succeeds, the force variants
//! replace existing destinations instead of failing.

use std::fs;
use std::io;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;

use thiserror::Error;
use tracing::warn;

use crate::op::{Op, OpData, OpsResult};

/// Why an executor failed.
#[derive(Debug, Error)]
pub enum OpError {
	#[error("operation argument is missing")]
	MissingArg,
	#[error("invalid mode string: {0:?}")]
	BadMode(String),
	#[error(transparent)]
	Io(#[from] io::Error),
}

/// Dispatches one operation.  The single entry point of the table.
pub fn perform_operation(
	op: Op,
	data: &OpData,
	src: Option<&Path>,
	dst: Option<&Path>,
) -> OpsResult {
	match try_perform(op, data, src, dst) {
		Ok(()) => OpsResult::Succeeded,
		Err(err) => {
			warn!(?op, ?src, ?dst, %err, "operation failed");
			OpsResult::Failed
		}
	}
}

fn try_perform(
	op: Op,
	data: &OpData,
	src: Option<&Path>,
	dst: Option<&Path>,
) -> Result<(), OpError> {
	let src_or = || src.ok_or(OpError::MissingArg);
	let dst_or = || dst.ok_or(OpError::MissingArg);

	match op {
		Op::None | Op::Usr => Ok(()),
		Op::Remove | Op::RemoveSl => remove_any(src_or()?),
		Op::Copy => copy_new(src_or()?, dst_or()?),
		Op::CopyF => {
			remove_any(dst_or()?)?;
			copy_new(src_or()?, dst_or()?)
		}
		Op::CopyA => append(src_or()?, dst_or()?),
		Op::Move | Op::MoveTmp1 | Op::MoveTmp2 | Op::MoveTmp3 | Op::MoveTmp4 => {
			move_new(src_or()?, dst_or()?)
		}
		Op::MoveF => {
			remove_any(dst_or()?)?;
			move_new(src_or()?, dst_or()?)
		}
		Op::MoveA => {
			append(src_or()?, dst_or()?)?;
			remove_any(src_or()?)
		}
		Op::Chown => {
			let uid = id_of(data)?;
			std::os::unix::fs::chown(src_or()?, Some(uid), None)?;
			Ok(())
		}
		Op::Chgrp => {
			let gid = id_of(data)?;
			std::os::unix::fs::chown(src_or()?, None, Some(gid))?;
			Ok(())
		}
		Op::Chmod => chmod(src_or()?, mode_of(data)?),
		Op::ChmodR => chmod_recursive(src_or()?, mode_of(data)?),
		Op::Symlink => {
			symlink(src_or()?, dst_or()?)?;
			Ok(())
		}
		Op::Symlink2 => {
			let dst = dst_or()?;
			if let Ok(meta) = fs::symlink_metadata(dst)
				&& meta.file_type().is_symlink()
			{
				fs::remove_file(dst)?;
			}
			symlink(src_or()?, dst)?;
			Ok(())
		}
		Op::Mkdir => {
			if *data == OpData::Recursive {
				fs::create_dir_all(src_or()?)?;
			} else {
				fs::create_dir(src_or()?)?;
			}
			Ok(())
		}
		Op::Rmdir => {
			fs::remove_dir(src_or()?)?;
			Ok(())
		}
		Op::Mkfile => {
			fs::OpenOptions::new()
				.write(true)
				.create_new(true)
				.open(src_or()?)?;
			Ok(())
		}
	}
}

fn id_of(data: &OpData) -> Result<u32, OpError> {
	match data {
		OpData::Id(id) => Ok(*id),
		_ => Err(OpError::MissingArg),
	}
}

fn mode_of(data: &OpData) -> Result<u32, OpError> {
	match data {
		OpData::Text(text) => {
			u32::from_str_radix(text, 8).map_err(|_| OpError::BadMode(text.clone()))
		}
		_ => Err(OpError::MissingArg),
	}
}

/// Removes a path of any kind.  A missing path is a success.
fn remove_any(path: &Path) -> Result<(), OpError> {
	let meta = match fs::symlink_metadata(path) {
		Ok(meta) => meta,
		Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
		Err(err) => return Err(err.into()),
	};

	if meta.is_dir() {
		fs::remove_dir_all(path)?;
	} else {
		fs::remove_file(path)?;
	}
	Ok(())
}

/// Copies a file or directory tree to a destination that must not
/// exist yet.
fn copy_new(src: &Path, dst: &Path) -> Result<(), OpError> {
	if fs::symlink_metadata(dst).is_ok() {
		return Err(io::Error::new(io::ErrorKind::AlreadyExists, "destination exists").into());
	}
	copy_tree(src, dst)
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), OpError> {
	let meta = fs::symlink_metadata(src)?;

	if meta.file_type().is_symlink() {
		let target = fs::read_link(src)?;
		symlink(&target, dst)?;
	} else if meta.is_dir() {
		fs::create_dir(dst)?;
		for entry in fs::read_dir(src)? {
			let entry = entry?;
			copy_tree(&entry.path(), &dst.join(entry.file_name()))?;
		}
		fs::set_permissions(dst, meta.permissions())?;
	} else {
		fs::copy(src, dst)?;
	}
	Ok(())
}

/// Moves a file or directory tree to a destination that must not exist
/// yet.  Falls back to copy-and-remove across filesystems.
fn move_new(src: &Path, dst: &Path) -> Result<(), OpError> {
	if fs::symlink_metadata(dst).is_ok() {
		return Err(io::Error::new(io::ErrorKind::AlreadyExists, "destination exists").into());
	}

	match fs::rename(src, dst) {
		Ok(()) => Ok(()),
		Err(_) => {
			copy_tree(src, dst)?;
			remove_any(src)
		}
	}
}

/// Appends the content of `src` to `dst`.  Both must be regular files.
fn append(src: &Path, dst: &Path) -> Result<(), OpError> {
	let mut from = fs::File::open(src)?;
	let mut to = fs::OpenOptions::new().append(true).open(dst)?;
	io::copy(&mut from, &mut to)?;
	Ok(())
}

fn chmod(path: &Path, mode: u32) -> Result<(), OpError> {
	fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
	Ok(())
}

fn chmod_recursive(path: &Path, mode: u32) -> Result<(), OpError> {
	chmod(path, mode)?;
	if fs::symlink_metadata(path)?.is_dir() {
		for entry in fs::read_dir(path)? {
			chmod_recursive(&entry?.path(), mode)?;
		}
	}
	Ok(())
}
