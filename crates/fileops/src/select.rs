//! Selection writer: hands the current selection to external tools.

use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{FromRawFd, IntoRawFd, RawFd};
use std::path::Path;

/// Writes one absolute path per line, `\n`-terminated.
pub fn write_selection<W: Write>(paths: &[impl AsRef<Path>], mut out: W) -> io::Result<()> {
	for path in paths {
		out.write_all(path.as_ref().to_string_lossy().as_bytes())?;
		out.write_all(b"\n")?;
	}
	out.flush()
}

/// Writes the selection to a file at `path`.
pub fn write_selection_to_path(paths: &[impl AsRef<Path>], path: &Path) -> io::Result<()> {
	write_selection(paths, File::create(path)?)
}

/// Writes the selection to an already-open descriptor.  The
/// descriptor stays open.
pub fn write_selection_to_fd(paths: &[impl AsRef<Path>], fd: RawFd) -> io::Result<()> {
	// Borrow the descriptor without adopting it.
	let file = unsafe { File::from_raw_fd(fd) };
	let result = write_selection(paths, &file);
	let _ = file.into_raw_fd();
	result
}
