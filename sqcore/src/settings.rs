//! Run configuration for proofs and the automatic prover.
//!
//! Settings are plain serde structures stored as TOML. Every field has a
//! default, so a settings file only needs to name what it changes:
//!
//! ```toml
//! [strategy]
//! name = "first_order"
//! max_steps = 2000
//! goal_chooser = "depth_first"
//! ```
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    magic::{DEFAULT_MAX_STEPS, DEFAULT_STRATEGY, ENV_SETTINGS_PATH},
    utils::error::{ProofError, ProofResult},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GoalChooserKind {
    /// Goal whose best application is cheapest, oldest goal on ties.
    #[default]
    Default,
    /// Newest goal first.
    DepthFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// Name of a registered strategy factory.
    pub name: String,
    pub max_steps: usize,
    pub timeout_ms: Option<u64>,
    pub goal_chooser: GoalChooserKind,
    /// Stop as soon as one goal has no applicable rule left.
    pub stop_at_first_open_goal: bool,
    /// Free-form options read by the strategy factory.
    pub properties: BTreeMap<String, String>,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_STRATEGY.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
            timeout_ms: None,
            goal_chooser: GoalChooserKind::default(),
            stop_at_first_open_goal: false,
            properties: BTreeMap::new(),
        }
    }
}

impl StrategySettings {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Integer property `key`, `default` when absent.
    pub fn int_property(&self, key: &str, default: i64) -> ProofResult<i64> {
        match self.property(key) {
            None => Ok(default),
            Some(v) => v.trim().parse().map_err(|_| {
                ProofError::input("settings", format!("strategy.properties.{key}"), format!("`{v}` is not an integer"))
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProofSettings {
    pub strategy: StrategySettings,
    /// Worker threads used for side proofs.
    pub side_proof_workers: usize,
}

impl Default for ProofSettings {
    fn default() -> Self {
        Self {
            strategy: StrategySettings::default(),
            side_proof_workers: 4,
        }
    }
}

impl ProofSettings {
    /// Get the default path to the settings file.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(ENV_SETTINGS_PATH) {
            return path.into();
        }

        let mut path = PathBuf::new();

        #[cfg(target_os = "windows")]
        {
            if let Ok(appdata) = std::env::var("APPDATA") {
                path.push(appdata);
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
                path.push(xdg_config_home);
            } else if let Ok(home) = std::env::var("HOME") {
                path.push(home);
                path.push(".config");
            }
        }

        path.push("sq");
        path.push("settings.toml");
        path
    }

    /// Settings from [`Self::default_path`], or the defaults if there is no such file.
    pub fn load_default() -> ProofResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from_toml(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(text: &str, file: &str) -> ProofResult<Self> {
        let settings: Self = toml::from_str(text).map_err(|e| ProofError::SettingsParse {
            source: e,
            file: file.to_string(),
        })?;
        settings.validate(file)?;
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn load_from_toml(path: &Path) -> ProofResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    pub fn to_toml_string(&self) -> ProofResult<String> {
        toml::to_string(self).map_err(|e| ProofError::Serialize {
            source: e,
            what: "proof settings".to_string(),
        })
    }

    /// Save settings to a TOML file, creating parent directories.
    pub fn save_to_toml(&self, path: &Path) -> ProofResult<()> {
        let text = self.to_toml_string()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self, file: &str) -> ProofResult<()> {
        if self.strategy.name.trim().is_empty() {
            return Err(ProofError::input(file, "strategy.name", "must not be empty"));
        }
        if self.strategy.max_steps == 0 {
            return Err(ProofError::input(file, "strategy.max_steps", "must be positive"));
        }
        if self.side_proof_workers == 0 {
            return Err(ProofError::input(file, "side_proof_workers", "must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let s = ProofSettings::from_toml_str("[strategy]\nmax_steps = 12\n", "inline").unwrap();
        assert_eq!(s.strategy.max_steps, 12);
        assert_eq!(s.strategy.name, DEFAULT_STRATEGY);
        assert_eq!(s.strategy.goal_chooser, GoalChooserKind::Default);
        assert_eq!(s.side_proof_workers, 4);
    }

    #[test]
    fn chooser_names_are_snake_case() {
        let s = ProofSettings::from_toml_str("[strategy]\ngoal_chooser = \"depth_first\"\n", "inline").unwrap();
        assert_eq!(s.strategy.goal_chooser, GoalChooserKind::DepthFirst);
        assert_eq!(GoalChooserKind::DepthFirst.to_string(), "depth_first");
        assert!(ProofSettings::from_toml_str("[strategy]\ngoal_chooser = \"widest\"\n", "inline").is_err());
    }

    #[test]
    fn zero_budgets_are_rejected() {
        let err = ProofSettings::from_toml_str("[strategy]\nmax_steps = 0\n", "inline").unwrap_err();
        assert!(err.is_proof_input());
    }

    #[test]
    fn integer_properties() {
        let mut s = StrategySettings::default();
        s.properties.insert("beta_cost".into(), "250".into());
        s.properties.insert("broken".into(), "x".into());
        assert_eq!(s.int_property("beta_cost", 0).unwrap(), 250);
        assert_eq!(s.int_property("absent", 7).unwrap(), 7);
        assert!(s.int_property("broken", 0).is_err());
    }
}
