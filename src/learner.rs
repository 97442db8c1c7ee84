use crate::error::LauncherError;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const LEARNING_FILE: &str = "learning.json";
const STORE_VERSION: u32 = 1;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Key of a learning record: the used object or action, and for actions the
/// type of the object it was applied to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LearningKey {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl LearningKey {
    pub fn new(subject: &str, context: Option<&str>) -> Self {
        Self {
            subject: subject.to_string(),
            context: context.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningRecord {
    pub weight: f64,
    pub last_used: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnerConfig {
    /// Weight added per use.
    pub reward: f64,
    /// Per-day multiplier applied to weights, in `(0, 1)`.
    pub decay_factor: f64,
    /// Weights never grow past this value.
    pub max_weight: f64,
    /// Fixed bonus for favorites; does not decay.
    pub favorite_bonus: f64,
    /// Records decayed below this weight are dropped on save.
    pub prune_threshold: f64,
    /// Bonus for the action last used on the same object; does not decay.
    pub correlation_bonus: f64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            reward: 1.0,
            decay_factor: 0.97,
            max_weight: 10.0,
            favorite_bonus: 2.0,
            prune_threshold: 0.05,
            correlation_bonus: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Table {
    records: HashMap<LearningKey, LearningRecord>,
    favorites: BTreeSet<String>,
    /// Object id to the id of the action last used on it.
    correlations: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    #[serde(flatten)]
    key: LearningKey,
    #[serde(flatten)]
    record: LearningRecord,
}

#[derive(Serialize, Deserialize)]
struct StoredTable {
    version: u32,
    #[serde(default)]
    records: Vec<StoredEntry>,
    #[serde(default)]
    favorites: Vec<String>,
    #[serde(default)]
    correlations: BTreeMap<String, String>,
}

/// Usage statistics with exponential decay.
///
/// Readers load the last committed table without locking; writers are
/// serialized and publish a fresh table after each change.
pub struct Learner {
    config: LearnerConfig,
    table: ArcSwap<Table>,
    write: Mutex<()>,
    path: Option<PathBuf>,
}

impl Learner {
    /// Create an in-memory learner that never touches disk.
    pub fn new(config: LearnerConfig) -> Self {
        Self {
            config,
            table: ArcSwap::from_pointee(Table::default()),
            write: Mutex::new(()),
            path: None,
        }
    }

    /// Open the store at `path`.
    ///
    /// A missing file starts an empty table. A corrupt file is logged and
    /// also yields an empty table; it is overwritten on the next save.
    pub fn open(path: impl Into<PathBuf>, config: LearnerConfig) -> Self {
        let path = path.into();
        let table = match load_table(&path) {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(error = %e, "starting with empty learning table");
                Table::default()
            }
        };
        tracing::debug!(
            path = %path.display(),
            records = table.records.len(),
            "loaded learning store"
        );
        Self {
            config,
            table: ArcSwap::from_pointee(table),
            write: Mutex::new(()),
            path: Some(path),
        }
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record_use(&self, id: &str, context: Option<&str>) {
        self.record_use_at(id, context, Utc::now());
    }

    /// Reward a use of `id` at time `now`.
    ///
    /// The stored weight is decayed up to `now` before the reward is added,
    /// so a weight only ever drops between uses.
    pub fn record_use_at(&self, id: &str, context: Option<&str>, now: DateTime<Utc>) {
        let key = LearningKey::new(id, context);
        self.update(|table| {
            let current = table
                .records
                .get(&key)
                .map(|r| decayed(r, now, self.config.decay_factor))
                .unwrap_or(0.0);
            let weight = (current + self.config.reward).min(self.config.max_weight);
            let last_used = match table.records.get(&key) {
                Some(r) if r.last_used > now => r.last_used,
                _ => now,
            };
            table.records.insert(key, LearningRecord { weight, last_used });
        });
        tracing::debug!(id, context, "recorded use");
    }

    /// Decayed weight of `id` in `context` at `now`, plus the favorite bonus.
    pub fn affinity(&self, id: &str, context: Option<&str>, now: DateTime<Utc>) -> f64 {
        let table = self.table.load();
        let key = LearningKey::new(id, context);
        let learned = table
            .records
            .get(&key)
            .map(|r| decayed(r, now, self.config.decay_factor))
            .unwrap_or(0.0);
        let favorite = if table.favorites.contains(id) {
            self.config.favorite_bonus
        } else {
            0.0
        };
        learned + favorite
    }

    pub fn record(&self, id: &str, context: Option<&str>) -> Option<LearningRecord> {
        self.table
            .load()
            .records
            .get(&LearningKey::new(id, context))
            .copied()
    }

    /// Whether `id` has any learned history or is a favorite.
    pub fn has_affinity(&self, id: &str) -> bool {
        let table = self.table.load();
        table.favorites.contains(id) || table.records.keys().any(|k| k.subject == id)
    }

    /// Remember `action_id` as the action last used on `object_id`.
    pub fn set_correlation(&self, action_id: &str, object_id: &str) {
        self.update(|table| {
            table
                .correlations
                .insert(object_id.to_string(), action_id.to_string());
        });
    }

    /// Action last used on `object_id`, if any.
    pub fn correlation(&self, object_id: &str) -> Option<String> {
        self.table.load().correlations.get(object_id).cloned()
    }

    pub fn correlation_bonus(&self, action_id: &str, object_id: &str) -> f64 {
        let table = self.table.load();
        match table.correlations.get(object_id) {
            Some(last) if last == action_id => self.config.correlation_bonus,
            _ => 0.0,
        }
    }

    /// Remove every record for `id` in any context, its favorite mark and
    /// any correlation it takes part in.
    pub fn forget(&self, id: &str) {
        self.update(|table| {
            table.records.retain(|k, _| k.subject != id);
            table.favorites.remove(id);
            table.correlations.retain(|object, action| object != id && action != id);
        });
    }

    pub fn add_favorite(&self, id: &str) {
        self.update(|table| {
            table.favorites.insert(id.to_string());
        });
    }

    pub fn remove_favorite(&self, id: &str) {
        self.update(|table| {
            table.favorites.remove(id);
        });
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.table.load().favorites.contains(id)
    }

    pub fn len(&self) -> usize {
        self.table.load().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist the table to the store path, if any.
    pub fn save(&self) -> anyhow::Result<()> {
        match &self.path {
            Some(path) => self.save_at(path, Utc::now()),
            None => Ok(()),
        }
    }

    /// Persist to `path`, dropping records decayed below the prune threshold
    /// as of `now`. The file is written to a temporary sibling and renamed
    /// into place.
    pub fn save_at(&self, path: &Path, now: DateTime<Utc>) -> anyhow::Result<()> {
        let _guard = self.write.lock().unwrap_or_else(|e| e.into_inner());
        let table = self.table.load_full();
        let mut records: Vec<StoredEntry> = table
            .records
            .iter()
            .filter(|(_, r)| decayed(r, now, self.config.decay_factor) >= self.config.prune_threshold)
            .map(|(k, r)| StoredEntry {
                key: k.clone(),
                record: *r,
            })
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        let pruned = table.records.len() - records.len();
        let stored = StoredTable {
            version: STORE_VERSION,
            records,
            favorites: table.favorites.iter().cloned().collect(),
            correlations: table.correlations.clone(),
        };
        let json = serde_json::to_string_pretty(&stored)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension(format!("json.{}", std::process::id()));
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), pruned, "saved learning store");
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut Table)) {
        let _guard = self.write.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = Table::clone(&self.table.load());
        f(&mut next);
        self.table.store(Arc::new(next));
    }
}

fn decayed(record: &LearningRecord, now: DateTime<Utc>, decay_factor: f64) -> f64 {
    let elapsed = (now - record.last_used).num_milliseconds().max(0) as f64 / 1000.0;
    record.weight * decay_factor.powf(elapsed / SECONDS_PER_DAY)
}

fn load_table(path: &Path) -> Result<Table, LauncherError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Table::default()),
        Err(source) => {
            return Err(LauncherError::LearningStoreUnreadable {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if content.trim().is_empty() {
        return Ok(Table::default());
    }
    let stored: StoredTable =
        serde_json::from_str(&content).map_err(|source| LauncherError::LearningStoreCorrupt {
            path: path.to_path_buf(),
            source,
        })?;
    let records = stored
        .records
        .into_iter()
        .filter(|e| e.record.weight.is_finite() && e.record.weight >= 0.0)
        .map(|e| (e.key, e.record))
        .collect();
    Ok(Table {
        records,
        favorites: stored.favorites.into_iter().collect(),
        correlations: stored.correlations,
    })
}
