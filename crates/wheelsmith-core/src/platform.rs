//! Host platform detection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating system the pipeline is running on.
///
/// The build targets Windows with a MinGW toolchain; anything else fails the
/// prerequisite check. Carried as data (rather than probed inline) so tests
/// can exercise the platform gate on any host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
    Linux,
    Macos,
}

impl Os {
    /// Detect the operating system of the current process.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "macos") {
            Os::Macos
        } else {
            Os::Linux
        }
    }

    /// OS name as used in log output and error messages.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Os::Windows => "windows",
            Os::Linux => "linux",
            Os::Macos => "macos",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_is_consistent() {
        let os = Os::current();
        assert!(!os.as_str().is_empty());
    }

    #[test]
    fn test_display_matches_as_str() {
        assert_eq!(Os::Windows.to_string(), "windows");
        assert_eq!(Os::Linux.to_string(), "linux");
        assert_eq!(Os::Macos.to_string(), "macos");
    }
}
