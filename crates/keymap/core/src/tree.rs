//! Prefix trees holding key bindings.
//!
//! Each mode owns one tree for commands and one for selectors; user
//! and foreign bindings live in a separate tree that shadows the
//! builtin one during lookup.

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use skiff_keymap_parser::Key;

use crate::types::{BindingSource, Follow, KeyHandler, MappingFlags};

/// What a terminal node does when dispatched.
#[derive(Clone)]
pub(crate) enum BindingKind {
	/// A reserved prefix that waits for more keys and never dispatches.
	WaitPoint,
	/// A builtin command with a handler.
	Cmd {
		handler: KeyHandler,
		/// Accepts a second count between its keys.
		nim: bool,
	},
	/// A user mapping expanding to another key sequence.
	User { rhs: Vec<Key>, flags: MappingFlags },
	/// A plugin-provided terminal node.
	Foreign { handler: KeyHandler },
}

/// Payload stored at a tree node.
#[derive(Clone)]
pub(crate) struct Binding {
	pub kind: BindingKind,
	pub follow: Follow,
	pub descr: String,
	pub skip_suggestion: bool,
	pub user_data: Option<Rc<dyn Any>>,
}

impl Binding {
	pub(crate) fn source(&self) -> BindingSource {
		match self.kind {
			BindingKind::WaitPoint | BindingKind::Cmd { .. } => BindingSource::Builtin,
			BindingKind::User { .. } => BindingSource::User,
			BindingKind::Foreign { .. } => BindingSource::Foreign,
		}
	}
}

/// One node of a prefix tree.
#[derive(Default)]
pub(crate) struct TrieNode {
	pub children: HashMap<Key, TrieNode>,
	pub binding: Option<Binding>,
}

impl TrieNode {
	pub(crate) fn is_leaf(&self) -> bool {
		self.children.is_empty()
	}

	/// Visits every binding in the subtree, passing the path suffix
	/// leading to it (empty for this node's own binding).
	pub(crate) fn visit<'a>(&'a self, path: &mut Vec<Key>, f: &mut dyn FnMut(&[Key], &'a Binding)) {
		if let Some(binding) = &self.binding {
			f(path, binding);
		}
		for (key, child) in &self.children {
			path.push(*key);
			child.visit(path, f);
			path.pop();
		}
	}

	/// Whether any user mapping in the subtree carries the given flag.
	pub(crate) fn any_user_flag(&self, flag: MappingFlags) -> bool {
		if let Some(Binding {
			kind: BindingKind::User { flags, .. },
			..
		}) = &self.binding
			&& flags.contains(flag)
		{
			return true;
		}
		self.children.values().any(|c| c.any_user_flag(flag))
	}
}

/// A prefix tree mapping key sequences to bindings.
#[derive(Default)]
pub(crate) struct Trie {
	pub root: TrieNode,
}

impl Trie {
	/// Returns the node at `path`, if the path exists.
	pub(crate) fn node(&self, path: &[Key]) -> Option<&TrieNode> {
		let mut node = &self.root;
		for key in path {
			node = node.children.get(key)?;
		}
		Some(node)
	}

	/// Inserts or replaces the binding at `path`, creating interior
	/// nodes as needed.
	pub(crate) fn insert(&mut self, path: &[Key], binding: Binding) {
		let mut node = &mut self.root;
		for key in path {
			node = node.children.entry(*key).or_default();
		}
		node.binding = Some(binding);
	}

	/// Removes the binding at `path` when `pred` accepts it, pruning
	/// childless interior nodes on the way out.  Returns whether a
	/// binding was removed.
	pub(crate) fn remove(&mut self, path: &[Key], pred: &dyn Fn(&Binding) -> bool) -> bool {
		fn rec(node: &mut TrieNode, path: &[Key], pred: &dyn Fn(&Binding) -> bool) -> bool {
			match path.split_first() {
				None => match &node.binding {
					Some(binding) if pred(binding) => {
						node.binding = None;
						true
					}
					_ => false,
				},
				Some((key, rest)) => {
					let Some(child) = node.children.get_mut(key) else {
						return false;
					};
					let removed = rec(child, rest, pred);
					if removed && child.binding.is_none() && child.is_leaf() {
						node.children.remove(key);
					}
					removed
				}
			}
		}

		rec(&mut self.root, path, pred)
	}

	/// Drops every binding `pred` accepts, pruning emptied branches.
	pub(crate) fn retain(&mut self, pred: &dyn Fn(&Binding) -> bool) {
		fn rec(node: &mut TrieNode, pred: &dyn Fn(&Binding) -> bool) {
			if let Some(binding) = &node.binding
				&& !pred(binding)
			{
				node.binding = None;
			}
			node.children.retain(|_, child| {
				rec(child, pred);
				child.binding.is_some() || !child.is_leaf()
			});
		}

		rec(&mut self.root, pred)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn waitpoint() -> Binding {
		Binding {
			kind: BindingKind::WaitPoint,
			follow: Follow::None,
			descr: String::new(),
			skip_suggestion: false,
			user_data: None,
		}
	}

	fn user(rhs: &[Key], flags: MappingFlags) -> Binding {
		Binding {
			kind: BindingKind::User {
				rhs: rhs.to_vec(),
				flags,
			},
			follow: Follow::None,
			descr: String::new(),
			skip_suggestion: false,
			user_data: None,
		}
	}

	fn keys(s: &str) -> Vec<Key> {
		s.chars().map(Key::Char).collect()
	}

	#[test]
	fn insert_and_lookup() {
		let mut trie = Trie::default();
		trie.insert(&keys("gg"), waitpoint());

		assert!(trie.node(&keys("g")).is_some());
		assert!(trie.node(&keys("gg")).unwrap().binding.is_some());
		assert!(trie.node(&keys("g")).unwrap().binding.is_none());
		assert!(trie.node(&keys("x")).is_none());
	}

	#[test]
	fn remove_prunes_interior_nodes() {
		let mut trie = Trie::default();
		trie.insert(&keys("abc"), user(&keys("j"), MappingFlags::empty()));

		assert!(trie.remove(&keys("abc"), &|_| true));
		assert!(trie.node(&keys("a")).is_none());
		assert!(!trie.remove(&keys("abc"), &|_| true));
	}

	#[test]
	fn remove_keeps_shared_prefixes() {
		let mut trie = Trie::default();
		trie.insert(&keys("ab"), user(&keys("j"), MappingFlags::empty()));
		trie.insert(&keys("ac"), user(&keys("k"), MappingFlags::empty()));

		assert!(trie.remove(&keys("ab"), &|_| true));
		assert!(trie.node(&keys("ac")).unwrap().binding.is_some());
	}

	#[test]
	fn wait_flag_is_found_below_a_prefix() {
		let mut trie = Trie::default();
		trie.insert(&keys("vj"), user(&keys("j"), MappingFlags::WAIT));

		let node = trie.node(&keys("v")).unwrap();
		assert!(node.any_user_flag(MappingFlags::WAIT));
		assert!(!node.any_user_flag(MappingFlags::SILENT));
	}
}
