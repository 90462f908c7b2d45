//! Collision-free branch and tag naming.
//!
//! Naming happens in two steps: a [`NameSpec`] produces a base name from the
//! operator's inputs, then [`resolve`] appends `.N` when the base name is
//! already taken. Both steps are pure.

use std::collections::BTreeSet;

use anyhow::Result;
use regex::Regex;

use crate::core::types::RefKind;
use crate::error::WorkflowError;

/// How the base name is formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameBasis {
    /// `<prefix>_<date>`, e.g. `feature_2024.01.01`.
    Preset { prefix: String, date: String },
    /// The literal is the whole base name.
    Custom(String),
}

/// Operator inputs for a new branch or tag name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameSpec {
    pub kind: RefKind,
    pub basis: NameBasis,
    /// Appended as `_<suffix>` to preset names. Ignored for custom names.
    pub custom_suffix: Option<String>,
}

impl NameSpec {
    pub fn preset(kind: RefKind, prefix: &str, date: &str) -> Self {
        Self {
            kind,
            basis: NameBasis::Preset {
                prefix: prefix.to_string(),
                date: date.to_string(),
            },
            custom_suffix: None,
        }
    }

    pub fn custom(kind: RefKind, literal: &str) -> Self {
        Self {
            kind,
            basis: NameBasis::Custom(literal.to_string()),
            custom_suffix: None,
        }
    }

    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.custom_suffix = Some(suffix.to_string());
        self
    }

    /// Build the base name before collision resolution.
    pub fn base_name(&self) -> Result<String> {
        match &self.basis {
            NameBasis::Custom(literal) => {
                let literal = literal.trim();
                if literal.is_empty() {
                    return Err(WorkflowError::EmptyName { kind: self.kind }.into());
                }
                Ok(literal.to_string())
            }
            NameBasis::Preset { prefix, date } => {
                let mut name = format!("{}_{}", prefix.trim(), date.trim());
                if let Some(suffix) = self
                    .custom_suffix
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                {
                    name.push('_');
                    name.push_str(suffix);
                }
                Ok(name)
            }
        }
    }

    /// Base name resolved against `existing`.
    pub fn final_name(&self, existing: &BTreeSet<String>) -> Result<String> {
        Ok(resolve(&self.base_name()?, existing))
    }
}

/// Return `base` if unused, otherwise `base.<max N + 1>`.
///
/// Only names equal to `base` or `base.<digits>` count. `base.beta` and other
/// non-numeric suffixes are ignored. If `max N + 1` overflows, the lowest
/// unused suffix is taken instead.
pub fn resolve(base: &str, existing: &BTreeSet<String>) -> String {
    if !existing.contains(base) {
        return base.to_string();
    }
    let next = max_suffix(base, existing)
        .checked_add(1)
        .unwrap_or_else(|| lowest_free_suffix(base, existing));
    format!("{base}.{next}")
}

fn lowest_free_suffix(base: &str, existing: &BTreeSet<String>) -> u64 {
    let mut n = 1;
    while existing.contains(&format!("{base}.{n}")) {
        n += 1;
    }
    n
}

fn max_suffix(base: &str, existing: &BTreeSet<String>) -> u64 {
    let pattern = format!(r"^{}(?:\.(\d+))?$", regex::escape(base));
    // An escaped literal plus a fixed tail always compiles.
    let Ok(re) = Regex::new(&pattern) else {
        return 0;
    };
    existing
        .iter()
        .filter_map(|name| re.captures(name))
        .filter_map(|caps| caps.get(1))
        .filter_map(|n| n.as_str().parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}
