//! Dotted numeric product versions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// A dot-separated sequence of non-negative integers, e.g. `9.24.1.0`.
///
/// Ordering is component-wise from the left. Shorter versions are not padded,
/// so `9.22` sorts before `9.22.0.0`; compare versions of equal arity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(Vec<u64>);

impl Version {
    pub fn new(components: impl Into<Vec<u64>>) -> Self {
        Self(components.into())
    }

    pub fn components(&self) -> &[u64] {
        &self.0
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(Error::InvalidVersion {
                input: s.to_string(),
                message: "empty version string".to_string(),
            });
        }

        input
            .split('.')
            .map(|part| {
                part.parse::<u64>().map_err(|e| Error::InvalidVersion {
                    input: s.to_string(),
                    message: format!("component {part:?}: {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{component}")?;
            first = false;
        }
        Ok(())
    }
}
