//! Keymap parser for skiff.
//!
//! Provides the wide-key model used by the input engine and the
//! bracket-notation syntax users write in their configuration.
//!
//! # Examples
//!
//! Parse a key sequence:
//! ```
//! use skiff_keymap_parser::{parse_seq, Key};
//!
//! let keys = parse_seq("d<c-w>").unwrap();
//! assert_eq!(keys, vec![Key::Char('d'), Key::Char('\u{17}')]);
//! ```
//!
//! Render it back:
//! ```
//! use skiff_keymap_parser::{display_seq, Key};
//!
//! assert_eq!(display_seq(&[Key::Char('d'), Key::Up]), "d<up>");
//! ```
pub mod node;
pub mod parser;

pub use node::Key;
pub use parser::{display_seq, parse_seq, ParseError};
