//! Shared fixture: a small normal/cmdline/visual binding set and a
//! recorder the handlers report into.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use skiff_keymap_core::{
	Builtin, ExecResult, Follow, KeyEngine, KeyHandler, Mode, ModeFlags, ModeSlot,
};
use skiff_keymap_parser::{parse_seq, Key};

/// What the fixture handlers observed last.
#[derive(Debug, Default)]
pub struct Recorder {
	/// 1 = `k`, 2 = `j`, 3 = `gu`, 4 = delete.
	pub last: i32,
	pub last_command_count: Option<i32>,
	pub last_selector_count: Option<i32>,
	pub last_register: Option<char>,
	pub last_multi: Option<Key>,
	/// Handler names in dispatch order.
	pub order: Vec<&'static str>,
}

pub type Shared = Rc<RefCell<Recorder>>;

pub fn keys(s: &str) -> Vec<Key> {
	parse_seq(s).unwrap()
}

/// Asserts that a result is one of the reserved non-dispatch codes.
pub fn assert_pending(result: ExecResult) {
	assert!(result.is_reserved(), "expected reserved code, got {result:?}");
}

pub fn marking(rec: &Shared, mark: &'static str, last: i32) -> KeyHandler {
	let rec = Rc::clone(rec);
	Rc::new(move |_engine: &KeyEngine, info, keys_info| {
		let mut r = rec.borrow_mut();
		r.order.push(mark);
		if last != 0 {
			r.last = last;
		}
		if keys_info.selector {
			r.last_selector_count = info.count;
		} else {
			r.last_command_count = info.count;
		}
		r.last_register = info.register;
		r.last_multi = info.multi;
	})
}

/// Builds the engine with the canonical fixture bindings.
pub fn fixture() -> (Rc<KeyEngine>, Shared) {
	let rec: Shared = Rc::default();
	let engine = Rc::new(KeyEngine::new(
		&[
			(Mode::Normal, ModeFlags::USES_REGS | ModeFlags::USES_COUNT),
			(Mode::CmdLine, ModeFlags::USES_INPUT),
			(Mode::Visual, ModeFlags::USES_COUNT),
		],
		None,
	));

	let normal = Mode::Normal;
	let visual = Mode::Visual;

	let colon: KeyHandler = Rc::new(|engine: &KeyEngine, _info, _keys_info| {
		engine.set_mode(Mode::CmdLine, ModeSlot::Primary);
	});
	engine.add_builtin(normal, &keys(":"), Builtin::new(colon));

	engine.add_builtin(
		normal,
		&keys("m"),
		Builtin::new(marking(&rec, "m", 0)).follow(Follow::MultiKey),
	);
	engine.add_builtin(
		normal,
		&keys("'"),
		Builtin::new(marking(&rec, "quote", 0)).follow(Follow::MultiKey),
	);

	engine.add_builtin(
		normal,
		&keys("gu"),
		Builtin::new(marking(&rec, "gu", 3)).follow(Follow::Selector),
	);
	engine.add_builtin(normal, &keys("guu"), Builtin::new(marking(&rec, "guu", 3)));
	engine.add_builtin(normal, &keys("gugu"), Builtin::new(marking(&rec, "gugu", 3)));

	for mode in [normal, visual] {
		engine.add_builtin(mode, &keys("j"), Builtin::new(marking(&rec, "j", 2)));
		engine.add_builtin(mode, &keys("k"), Builtin::new(marking(&rec, "k", 1)));
		engine.add_selector(mode, &keys("j"), Builtin::new(marking(&rec, "sel-j", 2)));
		engine.add_selector(mode, &keys("k"), Builtin::new(marking(&rec, "sel-k", 1)));
		engine.add_selector(mode, &keys("s"), Builtin::new(marking(&rec, "sel-s", 0)));
		engine.add_selector(mode, &keys("if"), Builtin::new(marking(&rec, "sel-if", 0)));
	}
	engine.add_builtin(normal, &keys("i"), Builtin::new(marking(&rec, "i", 0)));
	engine.add_selector(normal, &keys("gg"), Builtin::new(marking(&rec, "sel-gg", 0)));
	engine.add_selector(
		normal,
		&keys("'"),
		Builtin::new(marking(&rec, "sel-quote", 0)).follow(Follow::MultiKey),
	);

	engine.add_builtin(
		normal,
		&keys("d"),
		Builtin::new(marking(&rec, "d", 4)).follow(Follow::Selector),
	);
	engine.add_builtin(
		normal,
		&keys("dd"),
		Builtin::new(marking(&rec, "dd", 4)).nim(),
	);
	engine.add_builtin(normal, &keys("<"), Builtin::new(marking(&rec, "<", 0)).nim());

	let toggle: KeyHandler = Rc::new(|engine: &KeyEngine, _info, _keys_info| {
		let next = if engine.mode_is(Mode::Normal) {
			Mode::Visual
		} else {
			Mode::Normal
		};
		engine.set_mode(next, ModeSlot::Primary);
	});
	engine.add_builtin(normal, &keys("v"), Builtin::new(Rc::clone(&toggle)));
	engine.add_builtin(visual, &keys("v"), Builtin::new(toggle));

	engine.add_builtin(normal, &keys("ZQ"), Builtin::new(marking(&rec, "quit", 0)));
	engine.add_builtin(normal, &keys("ZZ"), Builtin::new(marking(&rec, "quit", 0)));
	engine.add_builtin(visual, &keys("ZZ"), Builtin::new(marking(&rec, "quit", 0)));

	let norm: KeyHandler = Rc::new(|engine: &KeyEngine, _info, _keys_info| {
		engine.exec_timed_out(&keys("ZZ"));
	});
	engine.add_builtin(normal, &keys("norm"), Builtin::new(norm));

	(engine, rec)
}
