//! Command macro expansion.
//!
//! A `%<letter>` macro expands against the state of the two views and
//! the register store.  Flag macros expand to nothing and accumulate
//! into [`MacroFlags`], which is returned alongside the expanded
//! string.

use std::path::Path;

use bitflags::bitflags;

use crate::registers::{is_valid_name, Registers};
use crate::view::View;

bitflags! {
	/// Non-expanding macro flags.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct MacroFlags: u32 {
		const MENU_OUTPUT = 1;
		const MENU_NAV_OUTPUT = 1 << 1;
		const STATUSBAR_OUTPUT = 1 << 2;
		const PREVIEW_OUTPUT = 1 << 3;
		const CUSTOMVIEW_OUTPUT = 1 << 4;
		const VERYCUSTOMVIEW_OUTPUT = 1 << 5;
		const CUSTOMVIEW_IOUTPUT = 1 << 6;
		const VERYCUSTOMVIEW_IOUTPUT = 1 << 7;
		const IGNORE = 1 << 8;
		const SPLIT = 1 << 9;
		const SPLIT_VERT = 1 << 10;
		const NO_TERM_MUX = 1 << 11;
		const KEEP_SESSION = 1 << 12;
		const PIPE_FILE_LIST = 1 << 13;
		const PIPE_FILE_LIST_Z = 1 << 14;
		const NO_CACHE = 1 << 15;
	}
}

/// How expanded names are protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quoting {
	/// For internal consumption: minimal escaping.
	Op,
	/// For handing to a shell.
	Shell,
}

/// View and register state the macros read.
pub struct MacroContext<'a> {
	pub current: &'a View,
	pub other: &'a View,
	pub registers: &'a Registers,
}

/// Expands macros in `command`.  Returns the expanded string and the
/// accumulated flags.
pub fn expand(
	ctx: &MacroContext<'_>,
	command: &str,
	args: &str,
	quoting: Quoting,
) -> (String, MacroFlags) {
	let mut out = String::new();
	let mut flags = MacroFlags::empty();

	let mut chars = command.chars().peekable();
	while let Some(ch) = chars.next() {
		if ch != '%' {
			out.push(ch);
			continue;
		}

		let Some(macro_ch) = chars.next() else {
			break;
		};

		// `%"x` is the double-quoted form of the `%x` macro.
		let (macro_ch, quoted) = if macro_ch == '"' {
			match chars.next() {
				Some(ch) => (ch, true),
				None => break,
			}
		} else {
			(macro_ch, false)
		};

		let protect = |names: Vec<String>| protect_names(names, quoting, quoted);

		match macro_ch {
			'%' => out.push('%'),
			'a' => out.push_str(args),
			'c' => {
				if let Some(entry) = ctx.current.current_entry() {
					out.push_str(&protect(vec![entry.name.clone()]));
				}
			}
			'C' => {
				if let Some(entry) = ctx.other.current_entry() {
					out.push_str(&protect(vec![path_str(
						&ctx.other.dir.join(&entry.name),
					)]));
				}
			}
			'd' => out.push_str(&protect(vec![path_str(&ctx.current.dir)])),
			'D' => out.push_str(&protect(vec![path_str(&ctx.other.dir)])),
			'f' => out.push_str(&protect(ctx.current.marked_names())),
			'F' => out.push_str(&protect(marked_abs(ctx.other))),
			'b' => {
				let mut parts = ctx.current.marked_names();
				parts.extend(marked_abs(ctx.other));
				out.push_str(&protect(parts));
			}
			'l' => out.push_str(&protect(ctx.current.selected_names())),
			'L' => out.push_str(&protect(selected_abs(ctx.other))),
			'r' => {
				if let Some(&name) = chars.peek()
					&& is_valid_name(name)
				{
					chars.next();
					let files: Vec<String> = ctx
						.registers
						.files(name)
						.iter()
						.map(|p| path_str(p))
						.collect();
					out.push_str(&protect(files));
				}
			}
			'm' => flags |= MacroFlags::MENU_OUTPUT,
			'M' => flags |= MacroFlags::MENU_NAV_OUTPUT,
			'S' => flags |= MacroFlags::STATUSBAR_OUTPUT,
			'q' => flags |= MacroFlags::PREVIEW_OUTPUT,
			'u' => flags |= MacroFlags::CUSTOMVIEW_OUTPUT,
			'U' => flags |= MacroFlags::VERYCUSTOMVIEW_OUTPUT,
			'i' => flags |= MacroFlags::IGNORE,
			's' => flags |= MacroFlags::SPLIT,
			'v' => flags |= MacroFlags::SPLIT_VERT,
			'n' => flags |= MacroFlags::NO_TERM_MUX,
			'N' => flags |= MacroFlags::KEEP_SESSION,
			'I' => match chars.next() {
				Some('u') => flags |= MacroFlags::CUSTOMVIEW_IOUTPUT,
				Some('U') => flags |= MacroFlags::VERYCUSTOMVIEW_IOUTPUT,
				Some(other) => out.push(other),
				None => {}
			},
			'P' => match chars.next() {
				Some('l') => flags |= MacroFlags::PIPE_FILE_LIST,
				Some('z') => flags |= MacroFlags::PIPE_FILE_LIST_Z,
				Some(other) => out.push(other),
				None => {}
			},
			'p' => match chars.next() {
				Some('u') => flags |= MacroFlags::NO_CACHE,
				Some(other) => out.push(other),
				None => {}
			},
			other => out.push(other),
		}
	}

	(out, flags)
}

fn path_str(path: &Path) -> String {
	path.to_string_lossy().into_owned()
}

fn marked_abs(view: &View) -> Vec<String> {
	view.marked_paths().iter().map(|p| path_str(p)).collect()
}

fn selected_abs(view: &View) -> Vec<String> {
	view.selected_names()
		.into_iter()
		.map(|name| path_str(&view.dir.join(name)))
		.collect()
}

/// Joins names with spaces, protecting each one.
fn protect_names(names: Vec<String>, quoting: Quoting, quoted: bool) -> String {
	names
		.into_iter()
		.map(|name| {
			if quoted {
				format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
			} else {
				escape(&name, quoting)
			}
		})
		.collect::<Vec<String>>()
		.join(" ")
}

fn escape(name: &str, quoting: Quoting) -> String {
	let special: &[char] = match quoting {
		Quoting::Op => &[' ', '"', '\'', '\\'],
		Quoting::Shell => &[
			' ', '"', '\'', '\\', '|', '&', ';', '<', '>', '(', ')', '$', '`', '*', '?', '[',
			']', '#', '~',
		],
	};

	let mut out = String::with_capacity(name.len());
	for ch in name.chars() {
		if special.contains(&ch) {
			out.push('\\');
		}
		out.push(ch);
	}
	out
}
