//! Build environment snapshot.
//!
//! The resolver constructs one [`BuildEnv`] per run from the ambient process
//! environment plus the toolchain overlay, and every stage receives it
//! read-only. The ambient environment of the orchestrator itself is never
//! mutated; translation into a real child environment happens only at the
//! process-launch boundary ([`crate::command::ProcessRunner`]).

use std::collections::BTreeMap;
use std::path::Path;

#[cfg(windows)]
const PATH_LIST_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: &str = ":";

/// Immutable-once-constructed environment for external tool invocations.
///
/// Construction uses consuming builder methods; after the resolver hands the
/// value out, only read access remains.
#[derive(Debug, Clone, Default)]
pub struct BuildEnv {
    vars: BTreeMap<String, String>,
}

impl BuildEnv {
    /// Snapshot the ambient process environment.
    pub fn from_ambient() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// An empty environment. Mostly useful in tests.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set (or overwrite) a variable.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Prepend a directory to the search path.
    ///
    /// Prepended, not appended: tools launched with this environment must
    /// discover the pipeline's library versions before anything already on
    /// the operator's PATH.
    pub fn with_path_prepended(mut self, dir: &Path) -> Self {
        let dir = dir.to_string_lossy().into_owned();
        let value = match self.vars.get("PATH") {
            Some(existing) if !existing.is_empty() => {
                format!("{dir}{PATH_LIST_SEPARATOR}{existing}")
            }
            _ => dir,
        };
        self.vars.insert("PATH".to_string(), value);
        self
    }

    /// Look up a variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Full variable map, for translation into a child process environment.
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Number of variables in the snapshot.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
