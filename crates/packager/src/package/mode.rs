//! Export modes: how a mod reference is satisfied on import

use crate::core::{ModVersion, PackageError, Result};

/// How the version of a mod is chosen when the package is imported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionStrategy {
    /// Whatever the newest release is at import time
    Latest,
    /// Exactly this version
    Specific(ModVersion),
    /// The newest release compatible with this game version
    FactorioCompatible(ModVersion),
}

/// The strategy without its version, used where the version comes later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Latest,
    Specific,
    FactorioCompatible,
}

impl StrategyKind {
    const LATEST_BITS: u32 = 1;
    const SPECIFIC_BITS: u32 = 2;
    const FACTORIO_BITS: u32 = 3;

    pub fn bits(self) -> u32 {
        match self {
            StrategyKind::Latest => Self::LATEST_BITS,
            StrategyKind::Specific => Self::SPECIFIC_BITS,
            StrategyKind::FactorioCompatible => Self::FACTORIO_BITS,
        }
    }
}

impl VersionStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            VersionStrategy::Latest => StrategyKind::Latest,
            VersionStrategy::Specific(_) => StrategyKind::Specific,
            VersionStrategy::FactorioCompatible(_) => StrategyKind::FactorioCompatible,
        }
    }

    /// The version two references must share to be the same definition
    pub fn comparison_version(&self) -> Option<ModVersion> {
        match self {
            VersionStrategy::Latest => None,
            VersionStrategy::Specific(version) | VersionStrategy::FactorioCompatible(version) => {
                Some(*version)
            }
        }
    }
}

/// Version strategy plus the two embedding flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExportMode {
    pub strategy: VersionStrategy,
    /// The mod file is embedded in the archive
    pub included: bool,
    /// Fetch a newer release on import even when the file is embedded
    pub download_newer: bool,
}

impl ExportMode {
    pub const STRATEGY_MASK: u32 = 0xFF;
    pub const INCLUDED: u32 = 0x100;
    pub const DOWNLOAD_NEWER: u32 = 0x200;

    pub fn new(strategy: VersionStrategy) -> Self {
        Self {
            strategy,
            included: false,
            download_newer: false,
        }
    }

    pub fn latest() -> Self {
        Self::new(VersionStrategy::Latest)
    }

    pub fn specific(version: ModVersion) -> Self {
        Self::new(VersionStrategy::Specific(version))
    }

    pub fn factorio_compatible(host: ModVersion) -> Self {
        Self::new(VersionStrategy::FactorioCompatible(host))
    }

    pub fn with_included(mut self, included: bool) -> Self {
        self.included = included;
        self
    }

    pub fn with_download_newer(mut self, download_newer: bool) -> Self {
        self.download_newer = download_newer;
        self
    }

    /// Encode as the `exportMode` integer of the package document
    pub fn bits(&self) -> u32 {
        let mut bits = self.strategy.kind().bits();
        if self.included {
            bits |= Self::INCLUDED;
        }
        if self.download_newer {
            bits |= Self::DOWNLOAD_NEWER;
        }
        bits
    }

    /// Decode the `exportMode` integer
    ///
    /// The strategy needs its version from the surrounding definition, so the
    /// caller passes both optional version fields; the one matching the
    /// strategy must be present.
    pub fn from_bits(
        bits: u32,
        version: Option<ModVersion>,
        factorio_version: Option<ModVersion>,
    ) -> Result<Self> {
        if bits & !(Self::STRATEGY_MASK | Self::INCLUDED | Self::DOWNLOAD_NEWER) != 0 {
            return Err(PackageError::InvalidExportMode { bits });
        }

        let strategy = match bits & Self::STRATEGY_MASK {
            StrategyKind::LATEST_BITS => VersionStrategy::Latest,
            StrategyKind::SPECIFIC_BITS => match version {
                Some(version) => VersionStrategy::Specific(version),
                None => return Err(missing("version")),
            },
            StrategyKind::FACTORIO_BITS => match factorio_version {
                Some(host) => VersionStrategy::FactorioCompatible(host),
                None => return Err(missing("factorioVersion")),
            },
            _ => return Err(PackageError::InvalidExportMode { bits }),
        };

        Ok(Self {
            strategy,
            included: bits & Self::INCLUDED != 0,
            download_newer: bits & Self::DOWNLOAD_NEWER != 0,
        })
    }
}

// The definition fills in uid and name when it converts the error.
fn missing(field: &'static str) -> PackageError {
    PackageError::MissingVersion {
        uid: 0,
        name: String::new(),
        field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_round_trip_flags() {
        let mode = ExportMode::specific(ModVersion::new(3, 1, 0, 0))
            .with_included(true)
            .with_download_newer(true);
        assert_eq!(mode.bits(), 2 | ExportMode::INCLUDED | ExportMode::DOWNLOAD_NEWER);

        let decoded = ExportMode::from_bits(mode.bits(), Some(ModVersion::new(3, 1, 0, 0)), None).unwrap();
        assert_eq!(decoded, mode);
    }

    #[test]
    fn test_zero_strategy_is_rejected() {
        let err = ExportMode::from_bits(0, None, None).unwrap_err();
        assert!(matches!(err, PackageError::InvalidExportMode { bits: 0 }));

        let err = ExportMode::from_bits(ExportMode::INCLUDED, None, None).unwrap_err();
        assert!(matches!(err, PackageError::InvalidExportMode { .. }));
    }

    #[test]
    fn test_unknown_bits_are_rejected() {
        assert!(ExportMode::from_bits(7, None, None).is_err());
        assert!(ExportMode::from_bits(1 | 0x400, None, None).is_err());
    }

    #[test]
    fn test_strategy_needs_its_version() {
        let err = ExportMode::from_bits(3, Some(ModVersion::new(1, 0, 0, 0)), None).unwrap_err();
        assert!(matches!(err, PackageError::MissingVersion { field: "factorioVersion", .. }));
    }

    #[test]
    fn test_comparison_version() {
        assert_eq!(VersionStrategy::Latest.comparison_version(), None);
        let host = ModVersion::new(1, 1, 0, 0);
        assert_eq!(VersionStrategy::FactorioCompatible(host).comparison_version(), Some(host));
    }
}
