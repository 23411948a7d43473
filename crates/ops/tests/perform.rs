//! Filesystem behaviour of the executors.

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use skiff_ops::{perform_operation, Op, OpData, OpsResult};
use tempfile::TempDir;

fn touch(path: &Path, content: &str) {
	fs::write(path, content).unwrap();
}

fn read(path: &Path) -> String {
	fs::read_to_string(path).unwrap()
}

#[test]
fn remove_is_idempotent() {
	let dir = TempDir::new().unwrap();
	let file = dir.path().join("a");
	touch(&file, "x");

	assert_eq!(
		perform_operation(Op::Remove, &OpData::None, Some(&file), None),
		OpsResult::Succeeded
	);
	assert!(!file.exists());

	// A second removal of the same path is still a success.
	assert_eq!(
		perform_operation(Op::Remove, &OpData::None, Some(&file), None),
		OpsResult::Succeeded
	);
}

#[test]
fn remove_takes_directories_recursively() {
	let dir = TempDir::new().unwrap();
	let tree = dir.path().join("tree");
	fs::create_dir_all(tree.join("sub")).unwrap();
	touch(&tree.join("sub/file"), "x");

	assert_eq!(
		perform_operation(Op::Remove, &OpData::None, Some(&tree), None),
		OpsResult::Succeeded
	);
	assert!(!tree.exists());
}

#[test]
fn copy_refuses_existing_destination() {
	let dir = TempDir::new().unwrap();
	let src = dir.path().join("src");
	let dst = dir.path().join("dst");
	touch(&src, "new");
	touch(&dst, "old");

	assert_eq!(
		perform_operation(Op::Copy, &OpData::None, Some(&src), Some(&dst)),
		OpsResult::Failed
	);
	assert_eq!(read(&dst), "old");
}

#[test]
fn copy_force_replaces_the_destination() {
	let dir = TempDir::new().unwrap();
	let src = dir.path().join("src");
	let dst = dir.path().join("dst");
	touch(&src, "new");
	touch(&dst, "old");

	assert_eq!(
		perform_operation(Op::CopyF, &OpData::None, Some(&src), Some(&dst)),
		OpsResult::Succeeded
	);
	assert_eq!(read(&dst), "new");
	assert!(src.exists());
}

#[test]
fn copy_handles_directory_trees() {
	let dir = TempDir::new().unwrap();
	let src = dir.path().join("src");
	fs::create_dir_all(src.join("nested")).unwrap();
	touch(&src.join("nested/file"), "data");

	let dst = dir.path().join("dst");
	assert_eq!(
		perform_operation(Op::Copy, &OpData::None, Some(&src), Some(&dst)),
		OpsResult::Succeeded
	);
	assert_eq!(read(&dst.join("nested/file")), "data");
	assert!(src.exists());
}

#[test]
fn copy_append_concatenates() {
	let dir = TempDir::new().unwrap();
	let src = dir.path().join("src");
	let dst = dir.path().join("dst");
	touch(&src, "-tail");
	touch(&dst, "head");

	assert_eq!(
		perform_operation(Op::CopyA, &OpData::None, Some(&src), Some(&dst)),
		OpsResult::Succeeded
	);
	assert_eq!(read(&dst), "head-tail");
	assert!(src.exists());
}

#[test]
fn move_renames_and_refuses_clobbering() {
	let dir = TempDir::new().unwrap();
	let src = dir.path().join("src");
	let dst = dir.path().join("dst");
	touch(&src, "content");

	assert_eq!(
		perform_operation(Op::Move, &OpData::None, Some(&src), Some(&dst)),
		OpsResult::Succeeded
	);
	assert!(!src.exists());
	assert_eq!(read(&dst), "content");

	touch(&src, "other");
	assert_eq!(
		perform_operation(Op::Move, &OpData::None, Some(&src), Some(&dst)),
		OpsResult::Failed
	);
	assert_eq!(read(&dst), "content");
}

#[test]
fn move_force_replaces() {
	let dir = TempDir::new().unwrap();
	let src = dir.path().join("src");
	let dst = dir.path().join("dst");
	touch(&src, "new");
	touch(&dst, "old");

	assert_eq!(
		perform_operation(Op::MoveF, &OpData::None, Some(&src), Some(&dst)),
		OpsResult::Succeeded
	);
	assert!(!src.exists());
	assert_eq!(read(&dst), "new");
}

#[test]
fn move_append_consumes_the_source() {
	let dir = TempDir::new().unwrap();
	let src = dir.path().join("src");
	let dst = dir.path().join("dst");
	touch(&src, "-tail");
	touch(&dst, "head");

	assert_eq!(
		perform_operation(Op::MoveA, &OpData::None, Some(&src), Some(&dst)),
		OpsResult::Succeeded
	);
	assert_eq!(read(&dst), "head-tail");
	assert!(!src.exists());
}

#[test]
fn tmp_moves_behave_as_moves() {
	let dir = TempDir::new().unwrap();
	let a = dir.path().join("a");
	let b = dir.path().join("b");
	touch(&a, "1");

	for op in [Op::MoveTmp1, Op::MoveTmp2, Op::MoveTmp3, Op::MoveTmp4] {
		assert_eq!(
			perform_operation(op, &OpData::None, Some(&a), Some(&b)),
			OpsResult::Succeeded
		);
		fs::rename(&b, &a).unwrap();
	}
}

#[test]
fn symlink_creation_and_replacement() {
	let dir = TempDir::new().unwrap();
	let target = dir.path().join("target");
	let other = dir.path().join("other");
	let link = dir.path().join("link");
	touch(&target, "x");
	touch(&other, "y");

	assert_eq!(
		perform_operation(Op::Symlink, &OpData::None, Some(&target), Some(&link)),
		OpsResult::Succeeded
	);
	assert_eq!(fs::read_link(&link).unwrap(), target);

	// A plain symlink cannot clobber.
	assert_eq!(
		perform_operation(Op::Symlink, &OpData::None, Some(&other), Some(&link)),
		OpsResult::Failed
	);

	// The replacing variant can.
	assert_eq!(
		perform_operation(Op::Symlink2, &OpData::None, Some(&other), Some(&link)),
		OpsResult::Succeeded
	);
	assert_eq!(fs::read_link(&link).unwrap(), other);
}

#[test]
fn mkdir_rmdir_mkfile() {
	let dir = TempDir::new().unwrap();
	let sub = dir.path().join("sub");
	let deep = dir.path().join("deep/er/dir");
	let file = dir.path().join("file");

	assert_eq!(
		perform_operation(Op::Mkdir, &OpData::None, Some(&sub), None),
		OpsResult::Succeeded
	);
	assert!(sub.is_dir());

	assert_eq!(
		perform_operation(Op::Mkdir, &OpData::None, Some(&deep), None),
		OpsResult::Failed
	);
	assert_eq!(
		perform_operation(Op::Mkdir, &OpData::Recursive, Some(&deep), None),
		OpsResult::Succeeded
	);

	assert_eq!(
		perform_operation(Op::Rmdir, &OpData::None, Some(&sub), None),
		OpsResult::Succeeded
	);
	assert!(!sub.exists());

	assert_eq!(
		perform_operation(Op::Mkfile, &OpData::None, Some(&file), None),
		OpsResult::Succeeded
	);
	assert!(file.is_file());
	assert_eq!(
		perform_operation(Op::Mkfile, &OpData::None, Some(&file), None),
		OpsResult::Failed
	);
}

#[test]
fn chmod_applies_the_mode() {
	use std::os::unix::fs::PermissionsExt;

	let dir = TempDir::new().unwrap();
	let file = dir.path().join("file");
	touch(&file, "x");

	assert_eq!(
		perform_operation(Op::Chmod, &OpData::Text("0600".into()), Some(&file), None),
		OpsResult::Succeeded
	);
	let mode = fs::metadata(&file).unwrap().permissions().mode() & 0o7777;
	assert_eq!(mode, 0o600);

	assert_eq!(
		perform_operation(Op::Chmod, &OpData::Text("bogus".into()), Some(&file), None),
		OpsResult::Failed
	);
}

#[test]
fn missing_arguments_fail_cleanly() {
	assert_eq!(
		perform_operation(Op::Move, &OpData::None, None, None),
		OpsResult::Failed
	);
	assert_eq!(
		perform_operation(Op::None, &OpData::None, None, None),
		OpsResult::Succeeded
	);
}
