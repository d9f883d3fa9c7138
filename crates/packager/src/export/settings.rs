//! Per-mod export choices

use crate::domain::Mod;
use crate::package::{ExportMode, StrategyKind, VersionStrategy};
use std::collections::HashMap;

/// How one mod reference should be exported
///
/// The version the strategy needs is taken from the mod itself when the
/// policy is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportPolicy {
    pub strategy: StrategyKind,
    pub included: bool,
    pub download_newer: bool,
}

impl ExportPolicy {
    pub fn new(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            included: false,
            download_newer: false,
        }
    }

    pub fn latest() -> Self {
        Self::new(StrategyKind::Latest)
    }

    pub fn specific() -> Self {
        Self::new(StrategyKind::Specific)
    }

    pub fn factorio_compatible() -> Self {
        Self::new(StrategyKind::FactorioCompatible)
    }

    pub fn included(mut self, included: bool) -> Self {
        self.included = included;
        self
    }

    pub fn download_newer(mut self, download_newer: bool) -> Self {
        self.download_newer = download_newer;
        self
    }

    /// Turn the policy into a concrete mode for `module`
    pub fn mode_for(&self, module: &Mod) -> ExportMode {
        let strategy = match self.strategy {
            StrategyKind::Latest => VersionStrategy::Latest,
            StrategyKind::Specific => VersionStrategy::Specific(module.version),
            StrategyKind::FactorioCompatible => {
                VersionStrategy::FactorioCompatible(module.factorio_version)
            }
        };
        ExportMode::new(strategy)
            .with_included(self.included)
            .with_download_newer(self.download_newer)
    }
}

impl Default for ExportPolicy {
    fn default() -> Self {
        Self::latest()
    }
}

/// Export policies with per-mod and per-membership overrides
///
/// Lookup order: the policy for this mod inside this modpack, then the policy
/// for this mod anywhere, then the default.
#[derive(Debug, Clone, Default)]
pub struct ExportSettings {
    default_policy: ExportPolicy,
    mod_policies: HashMap<String, ExportPolicy>,
    member_policies: HashMap<(u32, String), ExportPolicy>,
}

impl ExportSettings {
    pub fn new(default_policy: ExportPolicy) -> Self {
        Self {
            default_policy,
            ..Self::default()
        }
    }

    pub fn with_mod_policy<S: Into<String>>(mut self, mod_name: S, policy: ExportPolicy) -> Self {
        self.mod_policies.insert(mod_name.into(), policy);
        self
    }

    pub fn with_member_policy<S: Into<String>>(
        mut self,
        modpack_uid: u32,
        mod_name: S,
        policy: ExportPolicy,
    ) -> Self {
        self.member_policies.insert((modpack_uid, mod_name.into()), policy);
        self
    }

    pub fn default_policy(&self) -> &ExportPolicy {
        &self.default_policy
    }

    pub fn policy_for(&self, modpack_uid: u32, mod_name: &str) -> &ExportPolicy {
        self.member_policies
            .get(&(modpack_uid, mod_name.to_string()))
            .or_else(|| self.mod_policies.get(mod_name))
            .unwrap_or(&self.default_policy)
    }

    pub fn mode_for(&self, modpack_uid: u32, module: &Mod) -> ExportMode {
        self.policy_for(modpack_uid, &module.name).mode_for(module)
    }
}
