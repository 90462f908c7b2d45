//! Operator decisions for failed merges.

use std::io::{self, BufRead, IsTerminal, Write};

use tracing::warn;

use super::config::OnFailure;
use crate::merge::{FailureHandler, FixedPolicy, MergeDecision, MergeFailure};

/// [`FailureHandler`] driven by the configured policy.
///
/// `skip` and `stop` are a [`FixedPolicy`]. `prompt` asks on stderr and reads
/// the answer from stdin; without a terminal on stdin it stops instead of
/// blocking.
#[derive(Debug, Clone, Copy)]
pub enum Operator {
    Fixed(FixedPolicy),
    Prompt { interactive: bool },
}

impl Operator {
    pub fn new(policy: OnFailure) -> Self {
        match policy {
            OnFailure::Skip => Self::Fixed(FixedPolicy(MergeDecision::Skip)),
            OnFailure::Stop => Self::Fixed(FixedPolicy(MergeDecision::Stop)),
            OnFailure::Prompt => Self::Prompt {
                interactive: io::stdin().is_terminal(),
            },
        }
    }
}

impl FailureHandler for Operator {
    fn on_failure(&self, failure: &MergeFailure) -> MergeDecision {
        match self {
            Self::Fixed(policy) => policy.on_failure(failure),
            Self::Prompt { interactive: false } => {
                warn!(name = %failure.name, "stdin is not a terminal, stopping merge run");
                MergeDecision::Stop
            }
            Self::Prompt { interactive: true } => {
                let stdin = io::stdin();
                ask(&mut stdin.lock(), &mut io::stderr(), failure)
            }
        }
    }
}

/// Ask until the answer is recognised. End of input or an I/O error stops.
pub fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, failure: &MergeFailure) -> MergeDecision {
    let _ = writeln!(
        output,
        "merge of {} '{}' failed: {:#}",
        failure.kind, failure.name, failure.error
    );
    loop {
        let _ = write!(output, "[s]kip and continue, or s[t]op? ");
        let _ = output.flush();
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return MergeDecision::Stop,
            Ok(_) => {}
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "s" | "skip" => return MergeDecision::Skip,
            "t" | "stop" => return MergeDecision::Stop,
            other => {
                let _ = writeln!(output, "unrecognised answer '{other}'");
            }
        }
    }
}
