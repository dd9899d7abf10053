//! Version-control revision identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Value passed to the builder when no revision could be determined.
pub const UNVERSIONED: &str = "unversioned";

/// The commit a build was made from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevisionId {
    /// A commit hash, either a detached HEAD or a resolved branch tip.
    Commit(String),
    Unversioned,
}

impl RevisionId {
    pub fn as_str(&self) -> &str {
        match self {
            RevisionId::Commit(hash) => hash,
            RevisionId::Unversioned => UNVERSIONED,
        }
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
