//! Stream parsing and dispatch: counts, registers, selectors and
//! multi-key captures.

mod common;

use std::rc::Rc;

use common::{assert_pending, fixture, keys, marking, Shared};
use pretty_assertions::assert_eq;
use skiff_keymap_core::{Builtin, ExecResult, KeyEngine, Mode, ModeFlags};

#[test]
fn plain_command_dispatches() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("j")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().last, 2);

	assert_eq!(engine.exec(&keys("k")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().last, 1);
}

#[test]
fn no_count_is_reported_as_absent() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("dd")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().last_command_count, None);
}

#[test]
fn count_prefix_is_combined() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("123dd")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().last_command_count, Some(123));
}

#[test]
fn huge_count_saturates() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("999999999999dd")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().last_command_count, Some(i32::MAX));
}

#[test]
fn count_alone_waits() {
	let (engine, _rec) = fixture();

	assert_eq!(engine.exec(&keys("1")), ExecResult::Wait);
	assert_eq!(engine.exec(&keys("21")), ExecResult::Wait);
}

#[test]
fn leading_zero_is_not_a_count() {
	let (engine, _rec) = fixture();

	assert_eq!(engine.exec(&keys("0")), ExecResult::Unknown);
	assert_eq!(engine.exec(&keys("01")), ExecResult::Unknown);
	assert_eq!(engine.exec(&keys("0dd")), ExecResult::Unknown);
}

#[test]
fn nim_count_multiplies() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("2d1d")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().last_command_count, Some(2));

	assert_eq!(engine.exec(&keys("3d12d")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().last_command_count, Some(36));

	assert_eq!(engine.exec(&keys("2d123d")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().last_command_count, Some(246));
}

#[test]
fn nim_count_waits_for_the_closing_key() {
	let (engine, _rec) = fixture();

	assert_eq!(engine.exec(&keys("2d1")), ExecResult::Wait);
	assert_eq!(engine.exec(&keys("2d12")), ExecResult::Wait);
}

#[test]
fn nim_count_rejects_leading_zero() {
	let (engine, _rec) = fixture();

	// `0` is a key, not a count, and nothing is bound at `d0`.
	assert_eq!(engine.exec(&keys("d0")), ExecResult::Unknown);
	assert_eq!(engine.exec(&keys("d01d")), ExecResult::Unknown);
}

/// A command bound at both one and two keys: the short form fires when
/// the next key can extend neither the sequence nor a count.
#[test]
fn ambiguous_nim_prefix_falls_back_to_the_short_form() {
	let rec: Shared = Rc::default();
	let engine = KeyEngine::new(&[(Mode::Normal, ModeFlags::USES_COUNT)], None);
	engine.add_builtin(Mode::Normal, &keys("d"), Builtin::new(marking(&rec, "d", 4)));
	engine.add_builtin(
		Mode::Normal,
		&keys("dd"),
		Builtin::new(marking(&rec, "dd", 4)).nim(),
	);

	assert_eq!(engine.exec(&keys("2d3d")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().last_command_count, Some(6));
	assert_eq!(rec.borrow().order, vec!["dd"]);

	// The zero cannot start the inner count, so the short form runs
	// with the outer count and the rest is unknown.
	rec.borrow_mut().order.clear();
	assert_eq!(engine.exec(&keys("2d0d")), ExecResult::Unknown);
	assert_eq!(rec.borrow().last_command_count, Some(2));
	assert_eq!(rec.borrow().order, vec!["d"]);
}

#[test]
fn selector_completes_a_command() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("d")), ExecResult::Wait);
	let before = engine.counter();
	assert_eq!(engine.exec(&keys("dk")), ExecResult::Dispatched);
	assert_eq!(engine.counter(), before + 1);

	let rec = rec.borrow();
	assert_eq!(rec.order, vec!["sel-k", "d"]);
	assert_eq!(rec.last_command_count, None);
}

#[test]
fn multichar_selector_waits_and_completes() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("d")), ExecResult::Wait);
	assert_eq!(engine.exec(&keys("di")), ExecResult::Wait);

	let before = engine.counter();
	assert_eq!(engine.exec(&keys("dif")), ExecResult::Dispatched);
	assert_eq!(engine.counter(), before + 1);
	assert_eq!(rec.borrow().order, vec!["sel-if", "d"]);
}

#[test]
fn selector_count_multiplies_with_the_command_count() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("d1k")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().last_selector_count, Some(1));
	assert_eq!(rec.borrow().last_command_count, None);

	assert_eq!(engine.exec(&keys("2d3k")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().last_selector_count, Some(6));

	assert_eq!(engine.exec(&keys("2d123k")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().last_selector_count, Some(246));
}

#[test]
fn selector_with_zero_count_is_unknown() {
	let (engine, _rec) = fixture();

	assert_eq!(engine.exec(&keys("d0k")), ExecResult::Unknown);
	assert_eq!(engine.exec(&keys("d012k")), ExecResult::Unknown);
}

#[test]
fn commands_are_not_motions() {
	let (engine, _rec) = fixture();

	// `ZZ` is a command, `m` is a multi-key command; neither is a
	// valid selector for `d`.
	assert_eq!(engine.exec(&keys("dZZ")), ExecResult::Unknown);
	assert_eq!(engine.exec(&keys("dm")), ExecResult::Unknown);
}

#[test]
fn motions_do_not_run_as_commands() {
	let (engine, _rec) = fixture();

	assert_eq!(engine.exec(&keys("ds")), ExecResult::Dispatched);
	assert_eq!(engine.exec(&keys("s")), ExecResult::Unknown);
}

#[test]
fn selector_tail_runs_as_the_next_command() {
	let (engine, rec) = fixture();

	let before = engine.counter();
	assert_eq!(engine.exec(&keys("dsj")), ExecResult::Dispatched);
	// Selector first, then the command, then the trailing command.
	assert_eq!(rec.borrow().order, vec!["sel-s", "d", "j"]);
	assert_eq!(engine.counter(), before + 2);
}

#[test]
fn multikey_captures_the_following_key() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("m")), ExecResult::Wait);
	assert_eq!(engine.exec(&keys("ma")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().last_multi, Some(skiff_keymap_parser::Key::Char('a')));
}

#[test]
fn multikey_cancels_on_escape_and_ctrl_c() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("m<esc>")), ExecResult::Dispatched);
	assert_eq!(engine.exec(&keys("m<c-c>")), ExecResult::Dispatched);
	assert!(rec.borrow().order.is_empty());
}

#[test]
fn multikey_then_full_command() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("mbj")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().last, 2);
}

#[test]
fn multikey_works_as_a_motion() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("'")), ExecResult::Wait);
	assert_eq!(engine.exec(&keys("d'")), ExecResult::Wait);
	assert_eq!(engine.exec(&keys("d'm")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().order, vec!["sel-quote", "d"]);
}

#[test]
fn register_prefix_is_captured() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("\"add")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().last_register, Some('a'));
}

#[test]
fn register_prefix_cancels_on_escape() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("\"")), ExecResult::Wait);
	assert_eq!(engine.exec(&keys("\"<esc>")), ExecResult::Dispatched);
	assert_eq!(engine.exec(&keys("\"<c-c>")), ExecResult::Dispatched);
	assert!(rec.borrow().order.is_empty());
}

#[test]
fn full_commands_wait_at_every_prefix() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("\"")), ExecResult::Wait);
	assert_eq!(engine.exec(&keys("\"a")), ExecResult::Wait);
	assert_eq!(engine.exec(&keys("\"a1")), ExecResult::Wait);
	assert_eq!(engine.exec(&keys("\"a1d")), ExecResult::Wait);
	assert_eq!(engine.exec(&keys("\"a1d\"")), ExecResult::Wait);
	assert_eq!(engine.exec(&keys("\"a1d\"r")), ExecResult::Wait);
	assert_eq!(engine.exec(&keys("\"a1d\"r1")), ExecResult::Wait);
	assert_eq!(engine.exec(&keys("\"a1d\"r1k")), ExecResult::Dispatched);

	let rec = rec.borrow();
	assert_eq!(rec.order, vec!["sel-k", "d"]);
	// The selector takes its own register; the command kept the outer
	// one.
	assert_eq!(rec.last_register, Some('a'));
	assert_eq!(rec.last_selector_count, Some(1));
}

#[test]
fn commands_chain_within_one_call() {
	let (engine, rec) = fixture();

	let before = engine.counter();
	assert_eq!(engine.exec(&keys("jj")), ExecResult::Dispatched);
	assert_eq!(engine.counter(), before + 2);
	assert_eq!(rec.borrow().order, vec!["j", "j"]);
}

#[test]
fn longer_bindings_win_over_shorter_ones() {
	let (engine, rec) = fixture();

	assert_eq!(engine.exec(&keys("guu")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().order, vec!["guu"]);

	rec.borrow_mut().order.clear();
	assert_eq!(engine.exec(&keys("gug")), ExecResult::Wait);
	assert_eq!(engine.exec(&keys("gugu")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().order, vec!["gugu"]);

	// `gu` followed by a motion still works.
	rec.borrow_mut().order.clear();
	assert_eq!(engine.exec(&keys("guj")), ExecResult::Dispatched);
	assert_eq!(rec.borrow().order, vec!["sel-j", "gu"]);
}

#[test]
fn mode_switch_applies_to_the_rest_of_the_stream() {
	let (engine, rec) = fixture();

	// `v` enters visual mode, where `j` is bound separately.
	assert_eq!(engine.exec(&keys("vj")), ExecResult::Dispatched);
	assert!(engine.mode_is(Mode::Visual));
	assert_eq!(rec.borrow().last, 2);

	assert_eq!(engine.exec(&keys("v")), ExecResult::Dispatched);
	assert!(engine.mode_is(Mode::Normal));
}

#[test]
fn recursive_execution_is_flagged_and_counted() {
	let (engine, _rec) = fixture();

	let before = engine.counter();
	// `norm` re-enters the engine with `ZZ`.
	assert_eq!(engine.exec(&keys("norm")), ExecResult::Dispatched);
	assert_eq!(engine.counter(), before + 2);
}

#[test]
fn empty_input_is_unknown() {
	let (engine, _rec) = fixture();

	assert_eq!(engine.exec(&[]), ExecResult::Unknown);
}

#[test]
fn reserved_codes_are_recognized() {
	let (engine, _rec) = fixture();

	assert_pending(engine.exec(&keys("d")));
	assert_pending(engine.exec(&keys("x")));
	assert!(!engine.exec(&keys("j")).is_reserved());
}
