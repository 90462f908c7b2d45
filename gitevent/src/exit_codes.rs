//! Stable exit codes for gitevent CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid input, config or repository state, or any other error.
pub const INVALID: i32 = 1;
/// Nothing was selected to merge or push, or no workflow step was enabled.
pub const NOTHING_SELECTED: i32 = 2;
/// Some steps or merge items failed; the run is partially complete.
pub const PARTIAL: i32 = 3;
/// The remote could not be reached.
pub const REMOTE_UNAVAILABLE: i32 = 4;
