//! Dotted mod and game versions

use crate::core::error::PackageError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A `major.minor.patch.revision` version
///
/// Parsing accepts two to four components; missing trailing components are
/// zero, so `"1.1"` and `"1.1.0.0"` are the same version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub revision: u16,
}

impl ModVersion {
    pub const fn new(major: u16, minor: u16, patch: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            patch,
            revision,
        }
    }

    /// The `major.minor` part, which is what game compatibility is decided on
    pub fn game_line(&self) -> (u16, u16) {
        (self.major, self.minor)
    }

    /// Whether a mod built for `self` loads on a game of version `host`
    ///
    /// The game accepts mods of its own `major.minor` line; 1.0 additionally
    /// loads 0.18 mods.
    pub fn is_compatible_with(&self, host: &ModVersion) -> bool {
        self.game_line() == host.game_line() || (host.game_line() == (1, 0) && self.game_line() == (0, 18))
    }
}

impl FromStr for ModVersion {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PackageError::InvalidVersion {
            input: s.to_string(),
        };

        let parts = s
            .trim()
            .split('.')
            .map(|part| part.trim().parse::<u16>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        if !(2..=4).contains(&parts.len()) {
            return Err(invalid());
        }

        let at = |i: usize| parts.get(i).copied().unwrap_or(0);
        Ok(Self::new(at(0), at(1), at(2), at(3)))
    }
}

impl fmt::Display for ModVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, self.revision)
    }
}

impl Serialize for ModVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
