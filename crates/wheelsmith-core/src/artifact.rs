//! Artifact lifecycle and lookup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ArtifactError;

/// Lifecycle state of a wheel. Transitions only move forward:
/// `Built -> Repaired -> Installed` (repair may be skipped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactState {
    Built,
    Repaired,
    Installed,
}

/// A wheel file on disk plus where it is in its lifecycle.
#[derive(Debug, Clone)]
pub struct Artifact {
    path: PathBuf,
    state: ArtifactState,
}

impl Artifact {
    /// A freshly built artifact.
    pub fn built(path: PathBuf) -> Self {
        Self {
            path,
            state: ArtifactState::Built,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> ArtifactState {
        self.state
    }

    /// Transition to `Repaired`, adopting the repaired file's path. From
    /// here on the pipeline uses the repaired artifact exclusively.
    pub fn repaired(self, repaired_path: PathBuf) -> Result<Artifact, ArtifactError> {
        match self.state {
            ArtifactState::Built => Ok(Artifact {
                path: repaired_path,
                state: ArtifactState::Repaired,
            }),
            from => Err(ArtifactError::InvalidTransition {
                from,
                to: ArtifactState::Repaired,
            }),
        }
    }

    /// Transition to `Installed`.
    pub fn installed(self) -> Result<Artifact, ArtifactError> {
        match self.state {
            ArtifactState::Built | ArtifactState::Repaired => Ok(Artifact {
                path: self.path,
                state: ArtifactState::Installed,
            }),
            from => Err(ArtifactError::InvalidTransition {
                from,
                to: ArtifactState::Installed,
            }),
        }
    }
}

/// Locate exactly one `<package>-*.whl` in `dir`.
///
/// Zero matches after a claimed-successful tool exit is how silent packaging
/// failures surface; more than one means the directory was not cleaned up
/// between runs. Both are errors.
pub fn find_single_wheel(dir: &Path, package: &str) -> Result<PathBuf, ArtifactError> {
    let pattern = dir
        .join(format!("{package}-*.whl"))
        .to_string_lossy()
        .into_owned();

    let mut matches: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|source| ArtifactError::Pattern {
            pattern: pattern.clone(),
            source,
        })?
        .filter_map(Result::ok)
        .collect();

    if matches.len() > 1 {
        return Err(ArtifactError::Ambiguous {
            pattern,
            count: matches.len(),
        });
    }
    matches.pop().ok_or(ArtifactError::NoMatch { pattern })
}
