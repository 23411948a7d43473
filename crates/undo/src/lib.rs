//! Grouped undo/redo log for skiff's file operations.
//!
//! Handlers wrap their work in a group, register every reversible step
//! through [`UndoLog::add_op`] and close the group; [`UndoLog::
//! undo_group`] and [`UndoLog::redo_group`] replay whole groups through
//! an injected operation executor.  See [`log`] for the storage model.

pub mod log;
pub mod types;

pub use log::UndoLog;
pub use types::{CancelFn, ExecFn, OpAvailFn, TrashMediator, UndoResult};
