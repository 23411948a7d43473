//! Modal key dispatch for skiff.
//!
//! The engine owns one command tree and one selector tree per mode,
//! plus a shadowing tree of user and plugin mappings.  Streams of
//! decoded keys go in through [`KeyEngine::exec`] and friends; command
//! handlers, selector evaluations and mapping expansions come out.
//!
//! See the [`engine`] module for the dispatch model.

pub mod engine;
pub mod mode;
mod tree;
pub mod types;

pub use engine::{BindingEntry, Builtin, KeyEngine};
pub use mode::{Mode, ModeFlags, ModeSlot};
pub use types::{
	BindingSource, DefaultHandler, ExecResult, Follow, KeyHandler, KeyInfo, KeysInfo,
	MappingFlags, SuspendCb,
};
