use crate::catalog::CatalogConfig;
use crate::hotkey::{parse_hotkey, parse_modifiers, Modifiers};
use crate::learner::{LearnerConfig, LEARNING_FILE};
use crate::ranker::RankConfig;
use crate::triggers::TriggerBinding;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Raw trigger entry as written in the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSetting {
    pub hotkey: String,
    pub object_id: String,
    pub action_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// When enabled the application initialises the logger at debug level.
    /// Defaults to `false` when the field is missing in the settings file.
    #[serde(default)]
    pub debug_logging: bool,
    /// Optional file that receives a copy of the log output.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Weight of the matcher score when ranking results.
    #[serde(default = "default_match_weight")]
    pub match_weight: f64,
    /// Weight of learned affinity when ranking results.
    #[serde(default = "default_learn_weight")]
    pub learn_weight: f64,
    /// Fraction of a usage weight that survives one day.
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,
    #[serde(default = "default_reward")]
    pub reward: f64,
    #[serde(default = "default_max_weight")]
    pub max_weight: f64,
    #[serde(default = "default_favorite_bonus")]
    pub favorite_bonus: f64,
    /// Records whose decayed weight falls below this are dropped on save.
    #[serde(default = "default_prune_threshold")]
    pub prune_threshold: f64,
    /// Bonus for the action last used on the same object.
    #[serde(default = "default_correlation_bonus")]
    pub correlation_bonus: f64,
    /// Learning store location. If absent, `learning.json` in the platform
    /// config directory is used.
    #[serde(default)]
    pub learning_file: Option<PathBuf>,
    /// Priority per plugin name for resolving duplicate object ids.
    #[serde(default)]
    pub plugin_priority: HashMap<String, i32>,
    /// Set of plugin names which should be enabled. If `None`, all loaded
    /// plugins are enabled.
    #[serde(default)]
    pub enabled_plugins: Option<HashSet<String>>,
    /// Characters that switch an empty object pane into free-text mode.
    #[serde(default = "default_free_text_prefixes")]
    pub free_text_prefixes: Vec<char>,
    /// Modifier combination that turns a key press into an accelerator.
    #[serde(default = "default_accelerator_modifier")]
    pub accelerator_modifier: String,
    /// Per-action accelerator overrides keyed by action id.
    #[serde(default)]
    pub accelerators: HashMap<String, String>,
    #[serde(default)]
    pub triggers: Vec<TriggerSetting>,
    /// Hide the launcher after an action runs.
    #[serde(default)]
    pub hide_after_run: bool,
    /// Clear the panes after an action runs.
    #[serde(default = "default_reset_after_run")]
    pub reset_after_run: bool,
    /// Roots scanned by the directory plugin.
    #[serde(default)]
    pub index_paths: Option<Vec<String>>,
}

fn default_match_weight() -> f64 {
    1.0
}

fn default_learn_weight() -> f64 {
    0.01
}

fn default_decay_factor() -> f64 {
    0.97
}

fn default_reward() -> f64 {
    1.0
}

fn default_max_weight() -> f64 {
    10.0
}

fn default_favorite_bonus() -> f64 {
    2.0
}

fn default_prune_threshold() -> f64 {
    0.05
}

fn default_correlation_bonus() -> f64 {
    1.0
}

fn default_free_text_prefixes() -> Vec<char> {
    vec!['/', '~']
}

fn default_accelerator_modifier() -> String {
    "Ctrl".into()
}

fn default_reset_after_run() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug_logging: false,
            log_file: None,
            match_weight: default_match_weight(),
            learn_weight: default_learn_weight(),
            decay_factor: default_decay_factor(),
            reward: default_reward(),
            max_weight: default_max_weight(),
            favorite_bonus: default_favorite_bonus(),
            prune_threshold: default_prune_threshold(),
            correlation_bonus: default_correlation_bonus(),
            learning_file: None,
            plugin_priority: HashMap::new(),
            enabled_plugins: None,
            free_text_prefixes: default_free_text_prefixes(),
            accelerator_modifier: default_accelerator_modifier(),
            accelerators: HashMap::new(),
            triggers: Vec::new(),
            hide_after_run: false,
            reset_after_run: default_reset_after_run(),
            index_paths: None,
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Ranking weights. Invalid values fall back to the defaults, and so
    /// does a learn weight large enough to outweigh the match weight at
    /// full affinity.
    pub fn rank_config(&self) -> RankConfig {
        let match_weight = checked("match_weight", self.match_weight, default_match_weight(), |v| v > 0.0);
        let learn_weight = checked("learn_weight", self.learn_weight, default_learn_weight(), |v| v >= 0.0);
        let max_weight = if self.max_weight.is_finite() && self.max_weight >= 0.0 {
            self.max_weight
        } else {
            default_max_weight()
        };
        if learn_weight * max_weight >= match_weight {
            tracing::warn!(
                "learn_weight {} outweighs match_weight {}; using default weights",
                learn_weight,
                match_weight
            );
            return RankConfig::default();
        }
        RankConfig {
            match_weight,
            learn_weight,
        }
    }

    /// Learner tuning with out-of-range values replaced by the defaults, so
    /// that weights stay non-negative and only ever decay between uses.
    pub fn learner_config(&self) -> LearnerConfig {
        let non_negative = |v: f64| v >= 0.0;
        LearnerConfig {
            reward: checked("reward", self.reward, default_reward(), non_negative),
            decay_factor: checked("decay_factor", self.decay_factor, default_decay_factor(), |v| {
                v > 0.0 && v < 1.0
            }),
            max_weight: checked("max_weight", self.max_weight, default_max_weight(), non_negative),
            favorite_bonus: checked("favorite_bonus", self.favorite_bonus, default_favorite_bonus(), non_negative),
            prune_threshold: checked("prune_threshold", self.prune_threshold, default_prune_threshold(), non_negative),
            correlation_bonus: checked(
                "correlation_bonus",
                self.correlation_bonus,
                default_correlation_bonus(),
                non_negative,
            ),
        }
    }

    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig {
            plugin_priority: self.plugin_priority.clone(),
            enabled_plugins: self.enabled_plugins.clone(),
        }
    }

    /// Location of the learning store.
    pub fn learning_path(&self) -> PathBuf {
        if let Some(path) = &self.learning_file {
            return path.clone();
        }
        dirs_next::config_dir()
            .map(|d| d.join("quick_launcher"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(LEARNING_FILE)
    }

    pub fn accelerator_modifier(&self) -> Modifiers {
        match parse_modifiers(&self.accelerator_modifier) {
            Some(m) => m,
            None => {
                tracing::warn!(
                    "provided accelerator_modifier '{}' is invalid; using Ctrl",
                    self.accelerator_modifier
                );
                Modifiers {
                    ctrl: true,
                    ..Modifiers::default()
                }
            }
        }
    }

    /// Accelerator overrides that consist of exactly one character.
    pub fn accelerator_overrides(&self) -> HashMap<String, char> {
        let mut out = HashMap::new();
        for (action, key) in &self.accelerators {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => {
                    out.insert(action.clone(), c.to_ascii_lowercase());
                }
                _ => tracing::warn!(
                    "accelerator '{}' for action '{}' is not a single key; ignoring",
                    key,
                    action
                ),
            }
        }
        out
    }

    /// Parsed trigger bindings; entries with an invalid hotkey are skipped.
    pub fn trigger_bindings(&self) -> Vec<TriggerBinding> {
        self.triggers
            .iter()
            .filter_map(|t| match parse_hotkey(&t.hotkey) {
                Some(hotkey) => Some(TriggerBinding {
                    hotkey,
                    object_id: t.object_id.clone(),
                    action_id: t.action_id.clone(),
                }),
                None => {
                    tracing::warn!(
                        "provided trigger hotkey string '{}' is invalid; ignoring",
                        t.hotkey
                    );
                    None
                }
            })
            .collect()
    }
}

fn checked(name: &str, value: f64, default: f64, valid: impl Fn(f64) -> bool) -> f64 {
    if value.is_finite() && valid(value) {
        value
    } else {
        tracing::warn!("provided {} {} is out of range; using {}", name, value, default);
        default
    }
}
