//! Repository branching, tagging and merging workflow with an auditable
//! event history.
//!
//! - **[`core`]**: Pure logic (name resolution, event model, indexes, file
//!   layout). No I/O.
//! - **[`io`]**: Side effects (git, config, event files, run state, operator
//!   prompts). Isolated behind small seams so tests can script them.
//!
//! [`refs`], [`merge`] and [`workflow`] sequence the two to implement the CLI
//! commands; [`history`] renders stored events.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod history;
pub mod io;
pub mod logging;
pub mod merge;
pub mod refs;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
