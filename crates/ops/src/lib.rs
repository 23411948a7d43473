//! File operation model and dispatcher for skiff.
//!
//! Defines the closed set of reversible operations ([`Op`]), their
//! inverses and argument-side descriptors, and funnels every actual
//! filesystem mutation through one entry point
//! ([`perform_operation`]).  The undo log and the file-operation
//! layers both build on this crate.
//!
//! Unix only: ownership, permissions and symlinks use the Unix
//! extensions of the standard library.

pub mod handle;
pub mod op;
pub mod perform;

pub use handle::OpsHandle;
pub use op::{describe, Arg, Op, OpData, OpsResult, SideSpec};
pub use perform::{perform_operation, OpError};
