//! The register store: named clipboard-like lists of absolute paths.
//!
//! Registers are mutated only from the main thread.  An optional
//! external mirror file lets cooperating processes share register
//! content; synchronization is explicit via [`Registers::sync_to`] and
//! [`Registers::sync_from`], never automatic.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// The unnamed register.
pub const UNNAMED: char = '"';

/// All valid register names.
pub fn is_valid_name(name: char) -> bool {
	name == UNNAMED || name.is_ascii_lowercase() || name.is_ascii_digit()
}

/// Serialized form of the store for the mirror file.
#[derive(Serialize, Deserialize, Default)]
struct Mirror {
	registers: BTreeMap<char, Vec<PathBuf>>,
}

/// The process-wide register store.
///
/// A slot holding `None` marks a file consumed by a move; empty slots
/// are dropped by [`Registers::pack`].
#[derive(Default)]
pub struct Registers {
	map: BTreeMap<char, Vec<Option<PathBuf>>>,
}

impl Registers {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a path to a register.  Duplicates and invalid names are
	/// ignored.
	pub fn append(&mut self, name: char, path: &Path) {
		if !is_valid_name(name) {
			return;
		}
		let slots = self.map.entry(name).or_default();
		if !slots.iter().flatten().any(|p| p == path) {
			slots.push(Some(path.to_path_buf()));
		}
	}

	/// Empties a register.
	pub fn clear(&mut self, name: char) {
		self.map.remove(&name);
	}

	/// Whether the register holds at least one live path.
	pub fn has_files(&self, name: char) -> bool {
		self.map
			.get(&name)
			.is_some_and(|slots| slots.iter().any(Option::is_some))
	}

	/// Live paths of a register.
	pub fn files(&self, name: char) -> Vec<PathBuf> {
		self.map
			.get(&name)
			.map(|slots| slots.iter().flatten().cloned().collect())
			.unwrap_or_default()
	}

	/// Number of slots (live or consumed) in a register.
	pub fn slot_count(&self, name: char) -> usize {
		self.map.get(&name).map_or(0, Vec::len)
	}

	/// The path in one slot, live slots only.
	pub fn slot(&self, name: char, index: usize) -> Option<PathBuf> {
		self.map.get(&name)?.get(index)?.clone()
	}

	/// Marks one slot as consumed.
	pub fn take_slot(&mut self, name: char, index: usize) {
		if let Some(slots) = self.map.get_mut(&name)
			&& let Some(slot) = slots.get_mut(index)
		{
			*slot = None;
		}
	}

	/// Drops consumed slots of a register.
	pub fn pack(&mut self, name: char) {
		if let Some(slots) = self.map.get_mut(&name) {
			slots.retain(Option::is_some);
		}
	}

	/// Replaces every occurrence of a path across all registers.
	pub fn rename_contents(&mut self, old: &Path, new: &Path) {
		for slots in self.map.values_mut() {
			for slot in slots.iter_mut().flatten() {
				if slot == old {
					*slot = new.to_path_buf();
				}
			}
		}
	}

	/// Drops paths under a trash directory from all registers.
	pub fn clear_with_trash(&mut self, trash_dir: &Path) {
		for slots in self.map.values_mut() {
			slots.retain(|slot| slot.as_ref().is_none_or(|p| !p.starts_with(trash_dir)));
		}
	}

	/// Copies a register's live content into the unnamed register.
	pub fn update_unnamed(&mut self, name: char) {
		if name == UNNAMED {
			return;
		}
		let files: Vec<Option<PathBuf>> = self.files(name).into_iter().map(Some).collect();
		self.map.insert(UNNAMED, files);
	}

	/// `(name, live paths)` of every non-empty register.
	pub fn list(&self) -> Vec<(char, Vec<PathBuf>)> {
		self.map
			.keys()
			.copied()
			.filter(|&name| self.has_files(name))
			.map(|name| (name, self.files(name)))
			.collect()
	}

	/* ===== EXTERNAL MIRROR ===== */

	/// Writes the live content of all registers to the mirror file.
	pub fn sync_to(&self, path: &Path) -> io::Result<()> {
		let mirror = Mirror {
			registers: self
				.map
				.keys()
				.map(|&name| (name, self.files(name)))
				.filter(|(_, files)| !files.is_empty())
				.collect(),
		};
		let data = serde_json::to_vec(&mirror)?;
		fs::write(path, data)?;
		debug!(?path, "register store mirrored out");
		Ok(())
	}

	/// Replaces the store content with the mirror file's.  A missing
	/// mirror file leaves the store untouched.
	pub fn sync_from(&mut self, path: &Path) -> io::Result<()> {
		let data = match fs::read(path) {
			Ok(data) => data,
			Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
			Err(err) => return Err(err),
		};
		let mirror: Mirror = serde_json::from_slice(&data)?;
		self.map = mirror
			.registers
			.into_iter()
			.map(|(name, files)| (name, files.into_iter().map(Some).collect()))
			.collect();
		debug!(?path, "register store mirrored in");
		Ok(())
	}
}
