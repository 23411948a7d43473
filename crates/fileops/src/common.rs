//! Path helpers shared by the file operation modules.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::trash::Trash;

/// Destination basename for a source file: the demangled trash name
/// when it comes from a trash, its own basename otherwise.
pub fn dst_name(src: &Path, from_trash: bool) -> String {
	let name = src
		.file_name()
		.map(|n| n.to_string_lossy().into_owned())
		.unwrap_or_default();
	if from_trash {
		Trash::demangle(&name).to_string()
	} else {
		name
	}
}

/// Produces an unused sibling name for a path.
pub fn make_name_unique(path: &Path) -> PathBuf {
	let name = path
		.file_name()
		.map(|n| n.to_string_lossy().into_owned())
		.unwrap_or_default();
	let parent = path.parent().unwrap_or(Path::new(""));

	(0..)
		.map(|i| parent.join(format!("{name}_{i}")))
		.find(|candidate| fs::symlink_metadata(candidate).is_err())
		.unwrap_or_else(|| path.to_path_buf())
}

/// Whether `path` lies inside the tree rooted at `root`.
pub fn is_in_subtree(path: &Path, root: &Path) -> bool {
	path.starts_with(root)
}

/// Depth of a path's resolved location: number of components of its
/// real path, falling back to the path as given.
pub fn real_path_depth(path: &Path) -> usize {
	let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
	resolved
		.components()
		.filter(|c| matches!(c, Component::Normal(_)))
		.count()
}

/// Rewrites `target` relative to `base`, inserting `..` components
/// where the two diverge.
pub fn make_rel_path(target: &Path, base: &Path) -> PathBuf {
	let target: Vec<Component> = target.components().collect();
	let base: Vec<Component> = base.components().collect();

	let common = target
		.iter()
		.zip(base.iter())
		.take_while(|(a, b)| a == b)
		.count();

	let mut rel = PathBuf::new();
	for _ in common..base.len() {
		rel.push("..");
	}
	for component in &target[common..] {
		rel.push(component);
	}
	if rel.as_os_str().is_empty() {
		rel.push(".");
	}
	rel
}

/// Whether two paths name the same file.
pub fn paths_equal(a: &Path, b: &Path) -> bool {
	if a == b {
		return true;
	}
	match (fs::canonicalize(a), fs::canonicalize(b)) {
		(Ok(a), Ok(b)) => a == b,
		_ => false,
	}
}
