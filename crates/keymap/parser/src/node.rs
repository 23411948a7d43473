//! The wide-key model.
//!
//! A key is either a Unicode code point or one of a small set of
//! function-key sentinels that have no character representation.
//! Control characters are ordinary `Char` values, which keeps the
//! terminal boundary trivial: whatever the terminal layer decodes is
//! what the engine matches on.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::EnumString;

/// Escape as a character key.
pub const ESC: Key = Key::Char('\u{1b}');
/// Ctrl-C as a character key.
pub const CTRL_C: Key = Key::Char('\u{3}');
/// Carriage return (Enter) as a character key.
pub const CR: Key = Key::Char('\r');

/// A single key as seen by the input engine.
///
/// The `EnumString` derive covers only the named sentinels; it backs
/// the `<up>`-style names in bracket notation.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum Key {
	/// A plain code point, including control characters.
	#[strum(disabled)]
	Char(char),
	Up,
	Down,
	Left,
	Right,
	Home,
	End,
	PageUp,
	PageDown,
	/// The delete function key (not the `\x7f` character).
	#[strum(serialize = "del")]
	Delete,
	/// A decoded mouse event pseudo-key.
	#[strum(disabled)]
	Mouse,
}

impl Key {
	/// Returns the decimal value of the key if it is a digit character.
	pub fn as_digit(self) -> Option<u32> {
		match self {
			Key::Char(c) => c.to_digit(10),
			_ => None,
		}
	}

	/// Whether the key cancels a pending input (Escape or Ctrl-C).
	pub fn is_cancel(self) -> bool {
		self == ESC || self == CTRL_C
	}

	/// The bracket-notation name of a sentinel key, without brackets.
	fn sentinel_name(self) -> Option<&'static str> {
		match self {
			Key::Up => Some("up"),
			Key::Down => Some("down"),
			Key::Left => Some("left"),
			Key::Right => Some("right"),
			Key::Home => Some("home"),
			Key::End => Some("end"),
			Key::PageUp => Some("pageup"),
			Key::PageDown => Some("pagedown"),
			Key::Delete => Some("del"),
			Key::Mouse => Some("mouse"),
			Key::Char(_) => None,
		}
	}

	/// Renders the key in bracket notation.
	///
	/// `at_boundary` controls how a space is shown: at the start or end
	/// of a sequence it must be visible, in the middle it reads fine as
	/// a literal blank.
	pub fn notation(self, at_boundary: bool) -> String {
		match self {
			Key::Char(' ') if at_boundary => "<space>".to_string(),
			Key::Char(' ') => " ".to_string(),
			Key::Char('<') => "<lt>".to_string(),
			Key::Char('\r') => "<cr>".to_string(),
			Key::Char('\t') => "<tab>".to_string(),
			Key::Char('\u{1b}') => "<esc>".to_string(),
			Key::Char('\u{8}') => "<bs>".to_string(),
			Key::Char('\u{7f}') => "<c-?>".to_string(),
			Key::Char(c) if (c as u32) < 0x20 => {
				format!("<c-{}>", char::from_u32(c as u32 | 0x60).unwrap())
			}
			Key::Char(c) => c.to_string(),
			named => format!("<{}>", named.sentinel_name().unwrap()),
		}
	}
}

impl From<char> for Key {
	fn from(c: char) -> Self {
		Key::Char(c)
	}
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.notation(true))
	}
}
