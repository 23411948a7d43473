//! File operation layer of skiff.
//!
//! Builds user-facing operations on top of the dispatcher and the undo
//! log: registers, the trash, interactive pasting with conflict
//! resolution ([`put::PutSession`]), batch renaming, deletion, yanking,
//! background workers, command macro expansion and the selection
//! writer.

pub mod bg;
pub mod common;
pub mod cpmv;
pub mod macros;
pub mod misc;
pub mod put;
pub mod registers;
pub mod rename;
pub mod select;
pub mod trash;
pub mod view;

pub use bg::{BgProgress, BgTask};
pub use cpmv::{cpmv, CpmvError};
pub use macros::{expand, MacroContext, MacroFlags, Quoting};
pub use misc::{delete, yank};
pub use put::{
	put_bg, ConflictInfo, ConflictOption, ConflictResponse, DataLossInfo, DataLossResponse,
	PutError, PutKind, PutOutcome, PutSession, PutStats,
};
pub use registers::Registers;
pub use rename::{batch_rename, RenameError};
pub use select::{write_selection, write_selection_to_fd, write_selection_to_path};
pub use trash::{AppTrashMediator, Trash, TrashEntry, TrashError};
pub use view::{View, ViewEntry};
