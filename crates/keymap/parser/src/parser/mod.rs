//! # Parser
//!
//! Parses the bracket notation used to spell special keys in mappings
//! and configuration, and renders key sequences back into it.
//!
//! ## Supported syntax
//!
//! ```text
//! seq     = item*
//! item    = bracket | char
//! bracket = "<" name ">" | "<c-" char ">"
//! name    = "esc" | "cr" | "space" | "tab" | "bs" | "del" | "lt"
//!         | "nop" | "up" | "down" | "left" | "right" | "home" | "end"
//!         | "pageup" | "pagedown"
//! ```
//!
//! Names are case-insensitive.  `<lt>` is a literal `<`, `<nop>`
//! expands to nothing and `<tab>` is the same key as `<c-i>`.  A `<`
//! that does not open a well-formed bracket expression is taken
//! literally.

use crate::node::Key;


/// Represents an error that occurred while parsing bracket notation.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ParseError {
	/// Human-readable description of the parse error.
	pub message: String,
	/// Byte offset in the input where the error occurred.
	pub position: usize,
}

impl std::fmt::Display for ParseError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Parse error at position {}: {}", self.position, self.message)
	}
}

impl std::error::Error for ParseError {}

/// Maintains the parser's state for recursive descent parsing.
struct Parser<'a> {
	/// The input string being parsed.
	input: &'a str,
	/// Current byte position in the input.
	position: usize,
}

impl<'a> Parser<'a> {
	/// Creates a new `Parser` from the given input string.
	fn new(input: &'a str) -> Self {
		Self { input, position: 0 }
	}

	/// Peeks at the next character without consuming it.
	fn peek(&self) -> Option<char> {
		self.input.chars().next()
	}

	/// Consumes and returns the next character, advancing the parser.
	fn next(&mut self) -> Option<char> {
		if let Some(ch) = self.peek() {
			self.position += ch.len_utf8();
			self.input = &self.input[ch.len_utf8()..];

			Some(ch)
		} else {
			None
		}
	}

	/// Returns `true` if the parser has consumed all input.
	fn is_end(&self) -> bool {
		self.input.is_empty()
	}

	/// Consumes the next character if it matches the expected one.
	///
	/// # Errors
	///
	/// Returns a [`ParseError`] if the character doesn't match or if input is exhausted.
	fn take(&mut self, expected: char) -> Result<(), ParseError> {
		match self.next() {
			Some(ch) if ch == expected => Ok(()),
			Some(ch) => Err(ParseError {
				message: format!("expected '{expected}', found '{ch}'"),
				position: self.position - ch.len_utf8(),
			}),
			None => Err(ParseError {
				message: format!("expected '{expected}', found end of input"),
				position: self.position,
			}),
		}
	}

	/// Attempts to parse with a fallback: restores state if parsing fails.
	///
	/// Returns `Ok(Some(value))` if successful, or `Ok(None)` on failure.
	fn try_parse<T, F>(&mut self, f: F) -> Result<Option<T>, ParseError>
	where
		F: FnOnce(&mut Parser<'a>) -> Result<Option<T>, ParseError>,
	{
		let snapshot = (self.input, self.position);
		match f(self) {
			Ok(Some(val)) => Ok(Some(val)),
			Ok(None) | Err(_) => {
				self.input = snapshot.0;
				self.position = snapshot.1;
				Ok(None)
			}
		}
	}

	/// Consumes and returns characters that satisfy a predicate.
	fn take_while<F>(&mut self, predicate: F) -> String
	where
		F: Fn(char) -> bool,
	{
		let mut result = String::new();

		while let Some(ch) = self.peek() {
			if predicate(ch) {
				result.push(ch);
				self.next();
			} else {
				break;
			}
		}

		result
	}

	/// Creates a [`ParseError`] with the current parser position.
	fn error(&self, message: String) -> ParseError {
		ParseError {
			message,
			position: self.position,
		}
	}
}

/// Parses a whole sequence written in bracket notation into keys.
///
/// # Errors
///
/// Returns a [`ParseError`] on an unknown `<...>` name.
///
/// # Examples
///
/// ```
/// use skiff_keymap_parser::{parse_seq, Key};
///
/// let keys = parse_seq("gg<cr>").unwrap();
/// assert_eq!(
///     keys,
///     vec![Key::Char('g'), Key::Char('g'), Key::Char('\r')]
/// );
/// ```
pub fn parse_seq(s: &str) -> Result<Vec<Key>, ParseError> {
	let mut parser = Parser::new(s);
	let mut keys = Vec::new();

	while !parser.is_end() {
		if parser.peek() == Some('<') {
			if let Some(parsed) = parser.try_parse(try_parse_bracket)? {
				keys.extend(parsed);
				continue;
			}

			// No closing '>' ahead, so this is a literal '<'.
			if !parser.input[1..].contains('>') {
				parser.next();
				keys.push(Key::Char('<'));
				continue;
			}

			let name: String = parser.input[1..].chars().take_while(|&c| c != '>').collect();
			return Err(parser.error(format!("unknown key name: <{name}>")));
		}

		keys.push(Key::Char(parser.next().unwrap()));
	}

	Ok(keys)
}

/// Attempts to parse one `<...>` expression.
///
/// Returns zero keys for `<nop>` and one key otherwise.
fn try_parse_bracket(parser: &mut Parser) -> Result<Option<Vec<Key>>, ParseError> {
	parser.take('<')?;

	let name = parser
		.take_while(|ch| ch != '>' && ch != '<')
		.to_ascii_lowercase();
	if parser.take('>').is_err() {
		return Ok(None);
	}

	if let Some(rest) = name.strip_prefix("c-") {
		let mut chars = rest.chars();
		let (Some(ch), None) = (chars.next(), chars.next()) else {
			return Ok(None);
		};
		return Ok(ctrl_key(ch).map(|k| vec![k]));
	}

	let key = match name.as_str() {
		"esc" => Key::Char('\u{1b}'),
		"cr" | "enter" => Key::Char('\r'),
		"space" => Key::Char(' '),
		"tab" => Key::Char('\t'),
		"bs" => Key::Char('\u{8}'),
		"lt" => Key::Char('<'),
		"nop" => return Ok(Some(Vec::new())),
		other => match other.parse::<Key>() {
			Ok(key) => key,
			Err(_) => return Ok(None),
		},
	};

	Ok(Some(vec![key]))
}

/// Maps a `<c-x>` suffix character onto the control character it names.
fn ctrl_key(ch: char) -> Option<Key> {
	match ch {
		'a'..='z' => Some(Key::Char(char::from_u32(ch as u32 & 0x1f).unwrap())),
		'[' | ']' | '_' => Some(Key::Char(char::from_u32(ch as u32 & 0x1f).unwrap())),
		'?' => Some(Key::Char('\u{7f}')),
		_ => None,
	}
}

/// Renders a key sequence in bracket notation.
///
/// A space is spelled `<space>` only where it would otherwise be
/// invisible (first or last position); interior spaces stay literal.
pub fn display_seq(keys: &[Key]) -> String {
	let mut out = String::new();
	for (i, key) in keys.iter().enumerate() {
		let at_boundary = i == 0 || i == keys.len() - 1;
		out.push_str(&key.notation(at_boundary));
	}
	out
}
