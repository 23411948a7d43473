//! The modal key dispatch engine.
//!
//! One execution call receives a slice of already-decoded keys and
//! processes it as a *stream of commands*: every completed command is
//! dispatched on the spot and the status of the last, possibly
//! incomplete, parse becomes the call's result.  A key that cannot
//! extend the current prefix resolves the longest terminal node passed
//! so far and parsing restarts at the first unconsumed key.
//!
//! The engine is single-threaded and re-entrant: handlers receive
//! `&KeyEngine` and may switch modes, change mappings or execute keys
//! recursively.  No borrow of internal state is held across a handler
//! call.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use skiff_keymap_parser::Key;
use tracing::trace;

use crate::mode::{Mode, ModeFlags, ModeSlot, ModeState};
use crate::tree::{Binding, BindingKind, Trie, TrieNode};
use crate::types::{
	BindingSource, DefaultHandler, ExecResult, Follow, KeyHandler, KeyInfo, KeysInfo,
	MappingFlags, SuspendCb,
};

/// Upper bound on mapping expansion nesting.
const MAX_MAP_DEPTH: usize = 256;

/// Specification of a builtin command node.
#[derive(Clone)]
pub struct Builtin {
	pub handler: KeyHandler,
	pub follow: Follow,
	/// Accepts a second count between its keys (`d2d`).
	pub nim: bool,
	pub descr: String,
	pub skip_suggestion: bool,
	pub user_data: Option<Rc<dyn Any>>,
}

impl Builtin {
	/// A plain command with no follow expectation.
	pub fn new(handler: KeyHandler) -> Self {
		Self {
			handler,
			follow: Follow::None,
			nim: false,
			descr: String::new(),
			skip_suggestion: false,
			user_data: None,
		}
	}

	pub fn follow(mut self, follow: Follow) -> Self {
		self.follow = follow;
		self
	}

	pub fn nim(mut self) -> Self {
		self.nim = true;
		self
	}

	pub fn descr(mut self, descr: &str) -> Self {
		self.descr = descr.to_string();
		self
	}

	pub fn skip_suggestion(mut self) -> Self {
		self.skip_suggestion = true;
		self
	}

	pub fn user_data(mut self, data: Rc<dyn Any>) -> Self {
		self.user_data = Some(data);
		self
	}
}

/// A single binding reported by [`KeyEngine::list`] or
/// [`KeyEngine::suggest`].
#[derive(Debug, Clone)]
pub struct BindingEntry {
	/// Left-hand side (for listings) or remaining suffix (for
	/// suggestions).
	pub keys: Vec<Key>,
	/// Expansion of a user mapping, `None` otherwise.
	pub rhs: Option<Vec<Key>>,
	pub descr: String,
	pub source: BindingSource,
}

/// Per-mode binding tables.
struct ModeTables {
	builtin: Trie,
	user: Trie,
	selectors: Trie,
	default_handler: Option<DefaultHandler>,
}

impl ModeTables {
	fn new() -> Self {
		Self {
			builtin: Trie::default(),
			user: Trie::default(),
			selectors: Trie::default(),
			default_handler: None,
		}
	}
}

/// Pending register/count carried into a nested parse.
#[derive(Debug, Clone, Copy, Default)]
struct Pending {
	count: Option<i32>,
	register: Option<char>,
}

/// Ready-to-run dispatch extracted from the trees.
struct DispatchPlan {
	handler: KeyHandler,
	info: KeyInfo,
	selector: Option<(KeyHandler, KeyInfo)>,
}

/// Outcome of parsing one command from the stream.
enum Step {
	Dispatch {
		consumed: usize,
		plan: DispatchPlan,
	},
	Expand {
		consumed: usize,
		lhs: Vec<Key>,
		rhs: Vec<Key>,
		flags: MappingFlags,
		pending: Pending,
	},
	Default {
		consumed: usize,
		key: Key,
	},
	CancelOk {
		consumed: usize,
	},
	Pending(ExecResult),
	Unknown,
}

/// Result of one stream frame together with whether it dispatched
/// anything at all.
struct StreamOutcome {
	result: ExecResult,
	dispatched: bool,
}

/// Mutable state shared by all frames of one execution call.
struct ExecCtx {
	timed_out: bool,
	recursive: bool,
	/// User mappings currently being expanded, keyed by mode + lhs.
	active: Vec<(Mode, Vec<Key>)>,
}

/// The deepest dispatchable terminal passed during a walk.
struct BestMatch {
	consumed: usize,
	lhs: Vec<Key>,
	binding: Binding,
	/// A secondary count had been consumed when this node was passed.
	nim: Option<i32>,
}

/// Walk position over the parallel user/builtin trees.
struct Walk<'a> {
	user: Option<&'a TrieNode>,
	builtin: Option<&'a TrieNode>,
	lhs: Vec<Key>,
}

impl<'a> Walk<'a> {
	fn start(tables: &'a ModeTables, remap: bool) -> Self {
		let user = Some(&tables.user.root).filter(|n| subtree_visible(n, remap));
		Self {
			user,
			builtin: Some(&tables.builtin.root),
			lhs: Vec::new(),
		}
	}

	/// The binding in effect here: a visible user or foreign binding
	/// shadows the builtin one.
	fn binding(&self, remap: bool, mode: Mode, ctx: &ExecCtx) -> Option<&'a Binding> {
		let user = self.user.and_then(|n| n.binding.as_ref()).filter(|b| {
			match b.kind {
				BindingKind::User { .. } => {
					remap && !ctx.active.iter().any(|(m, l)| *m == mode && *l == self.lhs)
				}
				_ => true,
			}
		});
		user.or_else(|| self.builtin.and_then(|n| n.binding.as_ref()))
	}

	/// Whether the key continues the walk in either tree.
	fn child(&self, key: Key, remap: bool) -> Option<Walk<'a>> {
		let user = self
			.user
			.and_then(|n| n.children.get(&key))
			.filter(|n| subtree_visible(n, remap));
		let builtin = self.builtin.and_then(|n| n.children.get(&key));
		if user.is_none() && builtin.is_none() {
			return None;
		}
		let mut lhs = self.lhs.clone();
		lhs.push(key);
		Some(Walk {
			user,
			builtin,
			lhs,
		})
	}

	/// Whether longer bindings extend this position.
	fn has_children(&self, remap: bool) -> bool {
		self.user
			.is_some_and(|n| n.children.values().any(|c| subtree_visible(c, remap)))
			|| self.builtin.is_some_and(|n| !n.is_leaf())
	}
}

/// The engine.  See the module documentation for the dispatch model.
pub struct KeyEngine {
	modes: RefCell<Vec<ModeTables>>,
	flags: Vec<ModeFlags>,
	mode_state: Cell<ModeState>,
	counter: Cell<u64>,
	suspend: Option<SuspendCb>,
	exec_depth: Cell<u32>,
	mapping_depth: Cell<u32>,
}

impl KeyEngine {
	/// Creates an engine with the given per-mode flags.  Modes not
	/// listed get no flags.
	pub fn new(mode_flags: &[(Mode, ModeFlags)], suspend: Option<SuspendCb>) -> Self {
		let mut flags = vec![ModeFlags::empty(); Mode::ALL.len()];
		for &(mode, f) in mode_flags {
			flags[mode.index()] = f;
		}
		Self {
			modes: RefCell::new(Mode::ALL.iter().map(|_| ModeTables::new()).collect()),
			flags,
			mode_state: Cell::new(ModeState::new()),
			counter: Cell::new(0),
			suspend,
			exec_depth: Cell::new(0),
			mapping_depth: Cell::new(0),
		}
	}

	/* ===== MODE STATE ===== */

	/// Activates a mode in the given slot.
	pub fn set_mode(&self, mode: Mode, slot: ModeSlot) {
		let mut state = self.mode_state.get();
		state.set(mode, slot);
		self.mode_state.set(state);
	}

	/// The mode key lookup is currently scoped by.
	pub fn current_mode(&self) -> Mode {
		self.mode_state.get().current()
	}

	/// The active primary mode.
	pub fn primary_mode(&self) -> Mode {
		self.mode_state.get().primary()
	}

	/// Whether the current mode is `mode`.
	pub fn mode_is(&self, mode: Mode) -> bool {
		self.current_mode() == mode
	}

	/* ===== REGISTRATION ===== */

	/// Inserts or overrides a builtin command node.
	pub fn add_builtin(&self, mode: Mode, keys: &[Key], spec: Builtin) {
		self.modes.borrow_mut()[mode.index()]
			.builtin
			.insert(keys, binding_of(spec));
	}

	/// Inserts a node into the mode's selector tree.
	pub fn add_selector(&self, mode: Mode, keys: &[Key], spec: Builtin) {
		self.modes.borrow_mut()[mode.index()]
			.selectors
			.insert(keys, binding_of(spec));
	}

	/// Reserves a prefix that waits for more input and never
	/// dispatches by itself.
	pub fn add_wait_point(&self, mode: Mode, keys: &[Key]) {
		self.modes.borrow_mut()[mode.index()].builtin.insert(
			keys,
			Binding {
				kind: BindingKind::WaitPoint,
				follow: Follow::None,
				descr: String::new(),
				skip_suggestion: false,
				user_data: None,
			},
		);
	}

	/// Adds a user mapping.  Overrides any previous mapping of any
	/// kind at `lhs`; an empty `lhs` is ignored.
	pub fn user_add(&self, mode: Mode, lhs: &[Key], rhs: &[Key], flags: MappingFlags) {
		if lhs.is_empty() {
			return;
		}
		self.modes.borrow_mut()[mode.index()].user.insert(
			lhs,
			Binding {
				kind: BindingKind::User {
					rhs: rhs.to_vec(),
					flags,
				},
				follow: Follow::None,
				descr: String::new(),
				skip_suggestion: false,
				user_data: None,
			},
		);
	}

	/// Whether a user or foreign mapping exists at `lhs`.
	pub fn user_exists(&self, mode: Mode, lhs: &[Key]) -> bool {
		!lhs.is_empty()
			&& self.modes.borrow()[mode.index()]
				.user
				.node(lhs)
				.is_some_and(|n| n.binding.is_some())
	}

	/// Removes a user mapping.  Builtin and foreign nodes are
	/// preserved.  Returns whether a mapping was removed.
	pub fn user_remove(&self, mode: Mode, lhs: &[Key]) -> bool {
		self.modes.borrow_mut()[mode.index()]
			.user
			.remove(lhs, &|b| matches!(b.kind, BindingKind::User { .. }))
	}

	/// Removes all user mappings in all modes, keeping foreign ones.
	pub fn user_clear(&self) {
		for tables in self.modes.borrow_mut().iter_mut() {
			tables
				.user
				.retain(&|b| !matches!(b.kind, BindingKind::User { .. }));
		}
	}

	/// Adds a plugin-backed terminal node.  Replaces a user mapping at
	/// the same `lhs`.
	pub fn foreign_add(&self, mode: Mode, lhs: &[Key], handler: KeyHandler, descr: &str) {
		if lhs.is_empty() {
			return;
		}
		self.modes.borrow_mut()[mode.index()].user.insert(
			lhs,
			Binding {
				kind: BindingKind::Foreign { handler },
				follow: Follow::None,
				descr: descr.to_string(),
				skip_suggestion: false,
				user_data: None,
			},
		);
	}

	/// Removes a foreign node.  Returns whether one was removed.
	pub fn foreign_remove(&self, mode: Mode, lhs: &[Key]) -> bool {
		self.modes.borrow_mut()[mode.index()]
			.user
			.remove(lhs, &|b| matches!(b.kind, BindingKind::Foreign { .. }))
	}

	/// Installs or removes the mode's default handler.
	pub fn set_default_handler(&self, mode: Mode, handler: Option<DefaultHandler>) {
		self.modes.borrow_mut()[mode.index()].default_handler = handler;
	}

	/* ===== EXECUTION ===== */

	/// Executes keys with user-mapping expansion.
	pub fn exec(&self, keys: &[Key]) -> ExecResult {
		self.exec_general(keys, false, true)
	}

	/// Executes keys without expanding user mappings.
	pub fn exec_no_remap(&self, keys: &[Key]) -> ExecResult {
		self.exec_general(keys, false, false)
	}

	/// Executes keys resolving ambiguous prefixes to their terminal.
	pub fn exec_timed_out(&self, keys: &[Key]) -> ExecResult {
		self.exec_general(keys, true, true)
	}

	/// Timed-out execution without user-mapping expansion.
	pub fn exec_timed_out_no_remap(&self, keys: &[Key]) -> ExecResult {
		self.exec_general(keys, true, false)
	}

	/// Number of successfully dispatched command handlers so far.
	pub fn counter(&self) -> u64 {
		self.counter.get()
	}

	/// Whether a user-mapping expansion is currently running.
	pub fn inside_mapping(&self) -> bool {
		self.mapping_depth.get() > 0
	}

	fn exec_general(&self, keys: &[Key], timed_out: bool, remap: bool) -> ExecResult {
		if keys.is_empty() {
			return ExecResult::Unknown;
		}

		let recursive = self.exec_depth.get() > 0;
		self.exec_depth.set(self.exec_depth.get() + 1);
		let mut ctx = ExecCtx {
			timed_out,
			recursive,
			active: Vec::new(),
		};
		let outcome = self.exec_stream(keys.to_vec(), Pending::default(), remap, false, &mut ctx);
		self.exec_depth.set(self.exec_depth.get() - 1);

		outcome.result
	}

	/// Processes one frame of the key stream.  `mapped` marks frames
	/// that came from a user-mapping expansion.
	fn exec_stream(
		&self,
		input: Vec<Key>,
		mut pending: Pending,
		remap: bool,
		mapped: bool,
		ctx: &mut ExecCtx,
	) -> StreamOutcome {
		let mut pos = 0;
		let mut dispatched = false;

		while pos < input.len() {
			let mode = self.current_mode();
			let step = self.parse_command(mode, &input[pos..], pending, remap, ctx);
			pending = Pending::default();

			match step {
				Step::Dispatch { consumed, plan } => {
					self.run_plan(plan, mapped, ctx);
					dispatched = true;
					pos += consumed;
				}
				Step::Default { consumed, key } => {
					let Some(handler) = self.modes.borrow()[mode.index()].default_handler.clone()
					else {
						return StreamOutcome {
							result: ExecResult::Unknown,
							dispatched,
						};
					};
					let saved = self.mapping_depth.replace(0);
					let code = handler(self, key);
					self.mapping_depth.set(saved);
					if code != 0 {
						return StreamOutcome {
							result: ExecResult::Code(code),
							dispatched,
						};
					}
					self.counter.set(self.counter.get() + 1);
					dispatched = true;
					pos += consumed;
				}
				Step::CancelOk { consumed } => {
					dispatched = true;
					pos += consumed;
				}
				Step::Expand {
					consumed,
					lhs,
					rhs,
					flags,
					pending: map_pending,
				} => {
					if ctx.active.len() >= MAX_MAP_DEPTH {
						return StreamOutcome {
							result: ExecResult::Unknown,
							dispatched,
						};
					}

					trace!(lhs = ?lhs, "expanding user mapping");

					// A mapping to nothing swallows its count and
					// register along with the keys.
					let map_pending = if rhs.is_empty() {
						Pending::default()
					} else {
						map_pending
					};

					// The expansion replaces the matched keys; the
					// rest of this frame is handed to the nested one
					// so that it can complete partial commands there.
					let mut nested_input = rhs;
					nested_input.extend_from_slice(&input[pos + consumed..]);

					let silent = flags.contains(MappingFlags::SILENT);
					if silent && let Some(suspend) = &self.suspend {
						suspend(true);
					}

					ctx.active.push((mode, lhs));
					self.mapping_depth.set(self.mapping_depth.get() + 1);
					let nested = self.exec_stream(
						nested_input,
						map_pending,
						remap && !flags.contains(MappingFlags::NO_REMAP),
						true,
						ctx,
					);
					self.mapping_depth.set(self.mapping_depth.get() - 1);
					ctx.active.pop();

					if silent && let Some(suspend) = &self.suspend {
						suspend(false);
					}

					// A failure after the expansion already did work
					// must not rerun the chain.
					let result = match nested.result {
						ExecResult::Unknown if nested.dispatched => ExecResult::Dispatched,
						other => other,
					};
					return StreamOutcome {
						result,
						dispatched: dispatched || nested.dispatched,
					};
				}
				Step::Pending(result) => {
					return StreamOutcome { result, dispatched };
				}
				Step::Unknown => {
					return StreamOutcome {
						result: ExecResult::Unknown,
						dispatched,
					};
				}
			}
		}

		StreamOutcome {
			result: ExecResult::Dispatched,
			dispatched,
		}
	}

	/// Runs one extracted dispatch plan: selector first, then the
	/// command handler.
	fn run_plan(&self, plan: DispatchPlan, mapped: bool, ctx: &ExecCtx) {
		let mut keys_info = KeysInfo {
			selector: false,
			indexes: Vec::new(),
			after_wait: ctx.timed_out,
			mapped,
			recursive: ctx.recursive,
		};

		if let Some((sel_handler, sel_info)) = plan.selector {
			keys_info.selector = true;
			sel_handler(self, sel_info, &mut keys_info);
			keys_info.selector = false;
		}

		(plan.handler)(self, plan.info, &mut keys_info);
		self.counter.set(self.counter.get() + 1);
	}

	/// Parses one command from the head of `keys`.
	///
	/// Holds a single immutable borrow of the tables and returns an
	/// owned step, so handlers are free to mutate the engine.
	fn parse_command(
		&self,
		mode: Mode,
		keys: &[Key],
		prev: Pending,
		remap: bool,
		ctx: &ExecCtx,
	) -> Step {
		let tables = self.modes.borrow();
		let t = &tables[mode.index()];
		let flags = self.flags[mode.index()];

		let mut i = 0;
		let mut register = prev.register;

		if flags.contains(ModeFlags::USES_REGS) && keys.first() == Some(&Key::Char('"')) {
			match keys.get(1) {
				None => return Step::Pending(ExecResult::Wait),
				Some(k) if k.is_cancel() => return Step::CancelOk { consumed: 2 },
				Some(Key::Char(c)) => {
					register = Some(*c);
					i = 2;
				}
				Some(_) => return Step::Unknown,
			}
		}

		let mut count = prev.count;
		if flags.contains(ModeFlags::USES_COUNT) {
			let (run, next) = scan_count(keys, i);
			if let Some(run) = run {
				count = Some(combine_counts(count, run));
				i = next;
			}
		}

		let mut walk = Walk::start(t, remap);
		let mut nim: Option<i32> = None;
		let mut j = i;
		let mut best: Option<BestMatch> = None;

		loop {
			let binding = walk.binding(remap, mode, ctx);

			if j == keys.len() {
				if let Some(b) = binding
					&& b.follow == Follow::None
					&& dispatchable(b)
				{
					if !walk.has_children(remap) || ctx.timed_out {
						return make_step(b.clone(), walk.lhs, register, count, nim, None, None, j);
					}
					return Step::Pending(self.ambiguity(walk.user));
				}
				if let Some(b) = binding
					&& matches!(b.follow, Follow::Selector | Follow::MultiKey)
					&& dispatchable(b)
				{
					return Step::Pending(ExecResult::Wait);
				}
				if let Some(best) = best {
					if ctx.timed_out {
						return make_step(
							best.binding,
							best.lhs,
							register,
							count,
							best.nim,
							None,
							None,
							best.consumed,
						);
					}
					return Step::Pending(self.ambiguity(walk.user));
				}
				// In a mode with a default handler the prefix is
				// ambiguous with plain input, which the timeout
				// resolves key by key.
				if t.default_handler.is_some() && i < keys.len() {
					if ctx.timed_out {
						return Step::Default {
							consumed: i + 1,
							key: keys[i],
						};
					}
					return Step::Pending(self.ambiguity(walk.user));
				}
				return Step::Pending(ExecResult::Wait);
			}

			let key = keys[j];

			// Multi-key capture has priority over everything else.
			if let Some(b) = binding
				&& b.follow == Follow::MultiKey
				&& dispatchable(b)
			{
				if key.is_cancel() {
					return Step::CancelOk { consumed: j + 1 };
				}
				return make_step(
					b.clone(),
					walk.lhs,
					register,
					count,
					nim,
					Some(key),
					None,
					j + 1,
				);
			}

			if let Some(next) = walk.child(key, remap) {
				walk = next;
				j += 1;
				record_best(&mut best, &walk, remap, mode, ctx, j, nim);
				continue;
			}

			// A count may sit between the keys of a nim command.
			if j > i
				&& nim.is_none()
				&& let (Some(run), next) = scan_count(keys, j)
			{
				match keys.get(next) {
					None => return Step::Pending(ExecResult::Wait),
					Some(k2) => {
						if let Some(next_walk) = walk.child(*k2, remap) {
							nim = Some(run);
							walk = next_walk;
							j = next + 1;
							record_best(&mut best, &walk, remap, mode, ctx, j, nim);
							continue;
						}
					}
				}
			}

			// The remainder of the stream may be a motion.
			if let Some(b) = binding
				&& b.follow == Follow::Selector
				&& dispatchable(b)
			{
				let sel_pending = Pending { count, register };
				match self.parse_selector(t, flags, &keys[j..], sel_pending, ctx) {
					SelStep::Dispatch {
						consumed,
						handler,
						info,
					} => {
						return make_step(
							b.clone(),
							walk.lhs,
							register,
							None,
							None,
							None,
							Some((handler, info)),
							j + consumed,
						);
					}
					SelStep::CancelOk { consumed } => {
						return Step::CancelOk {
							consumed: j + consumed,
						};
					}
					SelStep::Pending(r) => return Step::Pending(r),
					SelStep::Unknown => {}
				}
			}

			if let Some(best) = best {
				return make_step(
					best.binding,
					best.lhs,
					register,
					count,
					best.nim,
					None,
					None,
					best.consumed,
				);
			}

			if t.default_handler.is_some() {
				return Step::Default {
					consumed: i + 1,
					key: keys[i],
				};
			}

			return Step::Unknown;
		}
	}

	/// `WaitShort` unless a user mapping below the prefix asks for the
	/// infinite wait.
	fn ambiguity(&self, user_node: Option<&TrieNode>) -> ExecResult {
		if user_node.is_some_and(|n| n.any_user_flag(MappingFlags::WAIT)) {
			ExecResult::Wait
		} else {
			ExecResult::WaitShort
		}
	}

	/// Parses the selector part of a command against the mode's
	/// selector tree.  The pending count and register of the command
	/// flow into the selector.
	fn parse_selector(
		&self,
		t: &ModeTables,
		flags: ModeFlags,
		keys: &[Key],
		prev: Pending,
		ctx: &ExecCtx,
	) -> SelStep {
		let mut i = 0;
		let mut register = prev.register;

		if flags.contains(ModeFlags::USES_REGS) && keys.first() == Some(&Key::Char('"')) {
			match keys.get(1) {
				None => return SelStep::Pending(ExecResult::Wait),
				Some(k) if k.is_cancel() => return SelStep::CancelOk { consumed: 2 },
				Some(Key::Char(c)) => {
					register = Some(*c);
					i = 2;
				}
				Some(_) => return SelStep::Unknown,
			}
		}

		let mut count = prev.count;
		if flags.contains(ModeFlags::USES_COUNT) {
			let (run, next) = scan_count(keys, i);
			if let Some(run) = run {
				count = Some(combine_counts(count, run));
				i = next;
			}
		}

		let mut node = &t.selectors.root;
		let mut j = i;
		let mut best: Option<(usize, Binding)> = None;

		loop {
			let binding = node.binding.as_ref();

			if j == keys.len() {
				if let Some(b) = binding
					&& b.follow == Follow::None
					&& dispatchable(b)
				{
					if !node.is_leaf() && !ctx.timed_out {
						return SelStep::Pending(ExecResult::WaitShort);
					}
					return sel_dispatch(b.clone(), register, count, None, j);
				}
				if let Some(b) = binding
					&& b.follow == Follow::MultiKey
					&& dispatchable(b)
				{
					return SelStep::Pending(ExecResult::Wait);
				}
				if let Some((consumed, b)) = best {
					if ctx.timed_out {
						return sel_dispatch(b, register, count, None, consumed);
					}
					return SelStep::Pending(ExecResult::WaitShort);
				}
				return SelStep::Pending(ExecResult::Wait);
			}

			let key = keys[j];

			if let Some(b) = binding
				&& b.follow == Follow::MultiKey
				&& dispatchable(b)
			{
				if key.is_cancel() {
					return SelStep::CancelOk { consumed: j + 1 };
				}
				return sel_dispatch(b.clone(), register, count, Some(key), j + 1);
			}

			if let Some(child) = node.children.get(&key) {
				node = child;
				j += 1;
				if let Some(b) = &node.binding
					&& b.follow == Follow::None
					&& dispatchable(b)
				{
					best = Some((j, b.clone()));
				}
				continue;
			}

			if let Some((consumed, b)) = best {
				return sel_dispatch(b, register, count, None, consumed);
			}

			return SelStep::Unknown;
		}
	}

	/* ===== INTROSPECTION ===== */

	/// Enumerates the bindings of a mode: user and foreign mappings
	/// first, then builtins.
	pub fn list(&self, mode: Mode, only_user: bool, visitor: &mut dyn FnMut(&BindingEntry)) {
		let mut entries = Vec::new();
		{
			let tables = self.modes.borrow();
			let t = &tables[mode.index()];

			let mut path = Vec::new();
			t.user.root.visit(&mut path, &mut |keys, binding| {
				entries.push(BindingEntry {
					keys: keys.to_vec(),
					rhs: match &binding.kind {
						BindingKind::User { rhs, .. } => Some(rhs.clone()),
						_ => None,
					},
					descr: binding.descr.clone(),
					source: binding.source(),
				});
			});
			entries.sort_by(|a, b| a.keys.cmp(&b.keys));

			if !only_user {
				let mut builtins = Vec::new();
				let mut path = Vec::new();
				t.builtin.root.visit(&mut path, &mut |keys, binding| {
					if matches!(binding.kind, BindingKind::WaitPoint) {
						return;
					}
					builtins.push(BindingEntry {
						keys: keys.to_vec(),
						rhs: None,
						descr: binding.descr.clone(),
						source: binding.source(),
					});
				});
				builtins.sort_by(|a, b| a.keys.cmp(&b.keys));
				entries.extend(builtins);
			}
		}

		for entry in &entries {
			visitor(entry);
		}
	}

	/// Completion suggestions for a prefix in the current mode.
	///
	/// The visitor receives the remaining suffix of each binding that
	/// extends the prefix by at least one key.  When the prefix ends in
	/// a selector expectation, the selector tree is enumerated.
	pub fn suggest(&self, prefix: &[Key], visitor: &mut dyn FnMut(&BindingEntry)) {
		let mut entries: Vec<BindingEntry> = Vec::new();
		{
			let tables = self.modes.borrow();
			let t = &tables[self.current_mode().index()];

			let mut user_node = Some(&t.user.root);
			let mut builtin_node = Some(&t.builtin.root);
			let mut selector_node: Option<&TrieNode> = None;
			let mut dead_end = false;

			for (pos, key) in prefix.iter().enumerate() {
				if let Some(sel) = selector_node {
					selector_node = sel.children.get(key);
					if selector_node.is_none() {
						dead_end = true;
						break;
					}
					continue;
				}

				let in_user = user_node.and_then(|n| n.children.get(key));
				let in_builtin = builtin_node.and_then(|n| n.children.get(key));
				if in_user.is_none() && in_builtin.is_none() {
					// The prefix may continue as a motion of the last
					// matched command node.
					if effective_follow(user_node, builtin_node) == Some(Follow::Selector) {
						selector_node = t.selectors.node(&prefix[pos..=pos]);
						if selector_node.is_some() {
							continue;
						}
					}
					dead_end = true;
					break;
				}
				user_node = in_user;
				builtin_node = in_builtin;
			}

			let mut push = |keys: &[Key], binding: &Binding| {
				if keys.is_empty() || binding.skip_suggestion {
					return;
				}
				if matches!(binding.kind, BindingKind::WaitPoint) {
					return;
				}
				entries.push(BindingEntry {
					keys: keys.to_vec(),
					rhs: match &binding.kind {
						BindingKind::User { rhs, .. } => Some(rhs.clone()),
						_ => None,
					},
					descr: binding.descr.clone(),
					source: binding.source(),
				});
			};

			let mut path = Vec::new();
			if dead_end {
				// Nothing to complete.
			} else if let Some(sel) = selector_node {
				sel.visit(&mut path, &mut |keys, binding| push(keys, binding));
			} else {
				if let Some(n) = user_node {
					n.visit(&mut path, &mut |keys, binding| push(keys, binding));
				}
				path.clear();
				if let Some(n) = builtin_node {
					n.visit(&mut path, &mut |keys, binding| push(keys, binding));
				}
				// A command expecting a motion also completes through
				// the selector tree.
				if effective_follow(user_node, builtin_node) == Some(Follow::Selector) {
					path.clear();
					t.selectors
						.root
						.visit(&mut path, &mut |keys, binding| push(keys, binding));
				}
			}
		}

		entries.sort_by(|a, b| a.keys.cmp(&b.keys));
		entries.dedup_by(|a, b| a.keys == b.keys);

		for entry in &entries {
			visitor(entry);
		}
	}
}

/// Outcome of a selector sub-parse.
enum SelStep {
	Dispatch {
		consumed: usize,
		handler: KeyHandler,
		info: KeyInfo,
	},
	CancelOk {
		consumed: usize,
	},
	Pending(ExecResult),
	Unknown,
}

fn sel_dispatch(
	binding: Binding,
	register: Option<char>,
	count: Option<i32>,
	multi: Option<Key>,
	consumed: usize,
) -> SelStep {
	let handler = match &binding.kind {
		BindingKind::Cmd { handler, .. } => handler.clone(),
		BindingKind::Foreign { handler } => handler.clone(),
		_ => return SelStep::Unknown,
	};
	SelStep::Dispatch {
		consumed,
		handler,
		info: KeyInfo {
			count,
			register,
			multi,
			user_data: binding.user_data.clone(),
		},
	}
}

/// Whether a binding can be dispatched at all (wait points cannot).
fn dispatchable(binding: &Binding) -> bool {
	!matches!(binding.kind, BindingKind::WaitPoint)
}

fn binding_of(spec: Builtin) -> Binding {
	Binding {
		kind: BindingKind::Cmd {
			handler: spec.handler,
			nim: spec.nim,
		},
		follow: spec.follow,
		descr: spec.descr,
		skip_suggestion: spec.skip_suggestion,
		user_data: spec.user_data,
	}
}

/// Turns a resolved binding into a step: user mappings expand, commands
/// dispatch.  A secondary count is only legal on nim commands.
#[allow(clippy::too_many_arguments)]
fn make_step(
	binding: Binding,
	lhs: Vec<Key>,
	register: Option<char>,
	count: Option<i32>,
	nim: Option<i32>,
	multi: Option<Key>,
	selector: Option<(KeyHandler, KeyInfo)>,
	consumed: usize,
) -> Step {
	let combined = combine_opt(count, nim);

	let (handler, accepts_nim) = match binding.kind {
		BindingKind::User { rhs, flags } => {
			return Step::Expand {
				consumed,
				lhs,
				rhs,
				flags,
				pending: Pending {
					count: combined,
					register,
				},
			};
		}
		BindingKind::Cmd { handler, nim } => (handler, nim),
		BindingKind::Foreign { handler } => (handler, false),
		BindingKind::WaitPoint => return Step::Unknown,
	};

	if nim.is_some() && !accepts_nim {
		return Step::Unknown;
	}

	let info = KeyInfo {
		count: if selector.is_some() { None } else { combined },
		register,
		multi,
		user_data: binding.user_data,
	};
	Step::Dispatch {
		consumed,
		plan: DispatchPlan {
			handler,
			info,
			selector,
		},
	}
}

/// Whether any part of a user-tree subtree remains visible when user
/// mappings are disabled (foreign nodes always are).
fn subtree_visible(node: &TrieNode, remap: bool) -> bool {
	if remap {
		return true;
	}
	matches!(
		node.binding.as_ref().map(|b| &b.kind),
		Some(BindingKind::Foreign { .. })
	) || node.children.values().any(|c| subtree_visible(c, remap))
}

/// The follow expectation of the effective binding at a node pair.
fn effective_follow(
	user_node: Option<&TrieNode>,
	builtin_node: Option<&TrieNode>,
) -> Option<Follow> {
	user_node
		.and_then(|n| n.binding.as_ref())
		.or_else(|| builtin_node.and_then(|n| n.binding.as_ref()))
		.map(|b| b.follow)
}

/// Records the deepest dispatchable terminal passed during the walk.
fn record_best(
	best: &mut Option<BestMatch>,
	walk: &Walk<'_>,
	remap: bool,
	mode: Mode,
	ctx: &ExecCtx,
	consumed: usize,
	nim: Option<i32>,
) {
	if let Some(b) = walk.binding(remap, mode, ctx)
		&& b.follow == Follow::None
		&& dispatchable(b)
	{
		*best = Some(BestMatch {
			consumed,
			lhs: walk.lhs.clone(),
			binding: b.clone(),
			nim,
		});
	}
}

/// Scans a `[1-9][0-9]*` count at `from`.  Returns the value (saturated
/// at `i32::MAX`) and the index past the run.
fn scan_count(keys: &[Key], from: usize) -> (Option<i32>, usize) {
	match keys.get(from) {
		Some(Key::Char(c)) if c.is_ascii_digit() && *c != '0' => {}
		_ => return (None, from),
	}

	let mut value: i32 = 0;
	let mut j = from;
	while let Some(d) = keys.get(j).and_then(|k| k.as_digit()) {
		value = value.saturating_mul(10).saturating_add(d as i32);
		j += 1;
	}
	(Some(value), j)
}

/// Multiplies two counts, treating an absent one as neutral.
fn combine_counts(prev: Option<i32>, new: i32) -> i32 {
	match prev {
		Some(prev) => prev.saturating_mul(new),
		None => new,
	}
}

fn combine_opt(count: Option<i32>, nim: Option<i32>) -> Option<i32> {
	match (count, nim) {
		(None, None) => None,
		(Some(c), None) => Some(c),
		(None, Some(n)) => Some(n),
		(Some(c), Some(n)) => Some(c.saturating_mul(n)),
	}
}
