//! The narrow view seam.
//!
//! The real application keeps far richer per-pane state; the file
//! operation layer only needs a directory, a flat entry list with
//! selection marks and a cursor.

use std::path::{Path, PathBuf};

/// One entry of a view's file list.
#[derive(Debug, Clone)]
pub struct ViewEntry {
	pub name: String,
	pub is_dir: bool,
	pub selected: bool,
}

impl ViewEntry {
	pub fn new(name: &str) -> Self {
		Self {
			name: name.to_string(),
			is_dir: false,
			selected: false,
		}
	}

	pub fn dir(name: &str) -> Self {
		Self {
			name: name.to_string(),
			is_dir: true,
			selected: false,
		}
	}

	pub fn selected(mut self) -> Self {
		self.selected = true;
		self
	}
}

/// A pane: directory, entries, cursor.
#[derive(Debug, Clone, Default)]
pub struct View {
	pub dir: PathBuf,
	pub entries: Vec<ViewEntry>,
	pub cursor: usize,
}

impl View {
	pub fn new(dir: &Path) -> Self {
		Self {
			dir: dir.to_path_buf(),
			entries: Vec::new(),
			cursor: 0,
		}
	}

	/// The entry under the cursor.
	pub fn current_entry(&self) -> Option<&ViewEntry> {
		self.entries.get(self.cursor)
	}

	/// Absolute path of an entry.
	pub fn entry_path(&self, index: usize) -> Option<PathBuf> {
		self.entries.get(index).map(|e| self.dir.join(&e.name))
	}

	/// Names of the selected entries, or the current one when nothing
	/// is selected.
	pub fn marked_names(&self) -> Vec<String> {
		let selected: Vec<String> = self
			.entries
			.iter()
			.filter(|e| e.selected)
			.map(|e| e.name.clone())
			.collect();
		if selected.is_empty() {
			return self
				.current_entry()
				.map(|e| vec![e.name.clone()])
				.unwrap_or_default();
		}
		selected
	}

	/// Names of the selected entries only.
	pub fn selected_names(&self) -> Vec<String> {
		self.entries
			.iter()
			.filter(|e| e.selected)
			.map(|e| e.name.clone())
			.collect()
	}

	/// Absolute paths of the marked entries.
	pub fn marked_paths(&self) -> Vec<PathBuf> {
		self.marked_names()
			.into_iter()
			.map(|name| self.dir.join(name))
			.collect()
	}

	/// Finds the entry whose absolute path is `path`.
	pub fn position_of(&self, path: &Path) -> Option<usize> {
		self.entries
			.iter()
			.position(|e| self.dir.join(&e.name) == path)
	}

	/// Moves the cursor to the entry at `path`, if present.
	pub fn set_cursor_to(&mut self, path: &Path) -> bool {
		match self.position_of(path) {
			Some(pos) => {
				self.cursor = pos;
				true
			}
			None => false,
		}
	}

	/// Destination directory of a paste-style operation: the directory
	/// entry at `at`, or the view's own directory.
	pub fn dst_dir(&self, at: Option<usize>) -> PathBuf {
		if let Some(at) = at
			&& let Some(entry) = self.entries.get(at)
			&& entry.is_dir
		{
			return self.dir.join(&entry.name);
		}
		self.dir.clone()
	}
}
