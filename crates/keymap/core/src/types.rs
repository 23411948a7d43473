//! Shared types of the key dispatch engine.

use std::any::Any;
use std::rc::Rc;

use bitflags::bitflags;
use skiff_keymap_parser::Key;

use crate::engine::KeyEngine;

/// A command handler.
///
/// Handlers receive the engine itself so that they can switch modes,
/// change mappings or re-enter dispatch; the engine never holds a
/// borrow across a handler call.
pub type KeyHandler = Rc<dyn Fn(&KeyEngine, KeyInfo, &mut KeysInfo)>;

/// Per-mode fallback for keys no tree matches.
///
/// A non-zero return value aborts the current execution call and is
/// handed back to the caller verbatim.
pub type DefaultHandler = Rc<dyn Fn(&KeyEngine, Key) -> i32>;

/// Callback toggling UI suspension around `silent` mapping expansion.
pub type SuspendCb = Rc<dyn Fn(bool)>;

/// What the engine expects after a node's own keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Follow {
	/// Nothing; the node dispatches as soon as it is reached.
	#[default]
	None,
	/// A motion over the selector tree producing an index set.
	Selector,
	/// One more key, captured as the handler's `multi` argument.
	MultiKey,
}

/// Where a binding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSource {
	Builtin,
	User,
	Foreign,
}

bitflags! {
	/// Flags attached to a user mapping.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct MappingFlags: u8 {
		/// The right-hand side is expanded without user-map lookups.
		const NO_REMAP = 1;
		/// UI is suspended while the mapping runs.
		const SILENT = 1 << 1;
		/// An ambiguous prefix of this mapping waits indefinitely
		/// instead of resolving on a short timeout.
		const WAIT = 1 << 2;
	}
}

/// Input to a command handler.
#[derive(Clone, Default)]
pub struct KeyInfo {
	/// Combined numeric count, `None` when absent.
	pub count: Option<i32>,
	/// Selected register, `None` when absent.
	pub register: Option<char>,
	/// The key captured after a multi-key node.
	pub multi: Option<Key>,
	/// Opaque data attached at registration time.
	pub user_data: Option<Rc<dyn Any>>,
}

impl std::fmt::Debug for KeyInfo {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("KeyInfo")
			.field("count", &self.count)
			.field("register", &self.register)
			.field("multi", &self.multi)
			.field("user_data", &self.user_data.is_some())
			.finish()
	}
}

/// Selector output and dispatch meta-flags, shared between a selector
/// handler and the command handler it feeds.
#[derive(Debug, Clone, Default)]
pub struct KeysInfo {
	/// This call is a selector evaluation.
	pub selector: bool,
	/// Entry indexes produced by the selector.
	pub indexes: Vec<usize>,
	/// The dispatch was resolved via the short timeout.
	pub after_wait: bool,
	/// The dispatch came from a user-mapping expansion.
	pub mapped: bool,
	/// The dispatch happened inside a nested execution call.
	pub recursive: bool,
}

/// Result of one key-execution call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecResult {
	/// At least the final command of the stream ran to completion.
	Dispatched,
	/// No binding matches the input.
	Unknown,
	/// The input is a strict prefix; more keys are required.
	Wait,
	/// The input is ambiguous: it matches a terminal node that also
	/// has longer completions.  A short timeout resolves it.
	WaitShort,
	/// A default handler returned this non-zero code.
	Code(i32),
}

impl ExecResult {
	/// Whether the result is one of the reserved non-dispatch codes.
	pub fn is_reserved(self) -> bool {
		matches!(
			self,
			ExecResult::Unknown | ExecResult::Wait | ExecResult::WaitShort
		)
	}
}
