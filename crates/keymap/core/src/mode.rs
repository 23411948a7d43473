//! Modes and the primary/secondary mode state.

use bitflags::bitflags;

/// The closed set of input modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
	Normal,
	CmdLine,
	Visual,
	Menu,
	Sort,
	Attr,
	Change,
	View,
	FileInfo,
	Msg,
	More,
}

impl Mode {
	/// All modes, in declaration order.
	pub const ALL: [Mode; 11] = [
		Mode::Normal,
		Mode::CmdLine,
		Mode::Visual,
		Mode::Menu,
		Mode::Sort,
		Mode::Attr,
		Mode::Change,
		Mode::View,
		Mode::FileInfo,
		Mode::Msg,
		Mode::More,
	];

	/// Index of the mode within [`Mode::ALL`].
	pub(crate) fn index(self) -> usize {
		match self {
			Mode::Normal => 0,
			Mode::CmdLine => 1,
			Mode::Visual => 2,
			Mode::Menu => 3,
			Mode::Sort => 4,
			Mode::Attr => 5,
			Mode::Change => 6,
			Mode::View => 7,
			Mode::FileInfo => 8,
			Mode::Msg => 9,
			Mode::More => 10,
		}
	}
}

bitflags! {
	/// Per-mode capabilities that affect key-stream parsing.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct ModeFlags: u8 {
		/// The mode consumes a `"` register prefix.
		const USES_REGS = 1;
		/// The mode consumes a numeric count prefix.
		const USES_COUNT = 1 << 1;
		/// The mode accepts arbitrary input through its default handler.
		const USES_INPUT = 1 << 2;
	}
}

/// Which slot a mode is activated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSlot {
	Primary,
	Secondary,
}

/// Tracks the active primary mode and an optional secondary one.
///
/// Key lookup is scoped by the *current* mode: the secondary when one
/// is set, the primary otherwise.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ModeState {
	primary: Mode,
	secondary: Option<Mode>,
}

impl ModeState {
	pub(crate) fn new() -> Self {
		Self {
			primary: Mode::Normal,
			secondary: None,
		}
	}

	pub(crate) fn current(self) -> Mode {
		self.secondary.unwrap_or(self.primary)
	}

	pub(crate) fn primary(self) -> Mode {
		self.primary
	}

	pub(crate) fn set(&mut self, mode: Mode, slot: ModeSlot) {
		match slot {
			ModeSlot::Primary => {
				self.primary = mode;
				self.secondary = None;
			}
			ModeSlot::Secondary => self.secondary = Some(mode),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn secondary_scopes_lookup_until_primary_is_set() {
		let mut state = ModeState::new();
		assert_eq!(state.current(), Mode::Normal);

		state.set(Mode::CmdLine, ModeSlot::Secondary);
		assert_eq!(state.current(), Mode::CmdLine);
		assert_eq!(state.primary(), Mode::Normal);

		state.set(Mode::Visual, ModeSlot::Primary);
		assert_eq!(state.current(), Mode::Visual);
	}
}
