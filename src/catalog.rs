//! Plugin-fed object catalog published as immutable snapshots.
//!
//! Readers grab an `Arc<Snapshot>` and keep using it for as long as they
//! like. Writers rebuild one plugin's contribution, merge every contribution
//! into a fresh snapshot and swap it in atomically; publishing is serialized
//! so concurrent rebuilds of different plugins never lose each other's work.

use crate::error::LauncherError;
use crate::objects::{CatalogAction, CatalogObject};
use crate::plugin::{ChangeCallback, Plugin, PluginManager};
use arc_swap::ArcSwap;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

type Contribution = Arc<[Arc<CatalogObject>]>;

/// Static catalog configuration.
#[derive(Debug, Clone, Default)]
pub struct CatalogConfig {
    /// Higher wins when two plugins publish the same object id. Missing
    /// plugins default to `0`.
    pub plugin_priority: HashMap<String, i32>,
    /// Plugins allowed to contribute; `None` enables all.
    pub enabled_plugins: Option<HashSet<String>>,
}

impl CatalogConfig {
    fn priority(&self, plugin: &str) -> i32 {
        self.plugin_priority.get(plugin).copied().unwrap_or(0)
    }

    /// Plugin ids ordered from highest to lowest priority, ties by id.
    fn ordered<'a>(&self, ids: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
        let mut ids: Vec<&str> = ids.collect();
        ids.sort_by(|a, b| self.priority(b).cmp(&self.priority(a)).then(a.cmp(b)));
        ids
    }
}

#[derive(Debug, Default)]
pub struct Snapshot {
    version: u64,
    contributions: BTreeMap<String, Contribution>,
    objects: Vec<Arc<CatalogObject>>,
    by_id: HashMap<String, usize>,
}

impl Snapshot {
    fn build(
        version: u64,
        contributions: BTreeMap<String, Contribution>,
        config: &CatalogConfig,
    ) -> Self {
        let mut objects: Vec<Arc<CatalogObject>> = Vec::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();
        for plugin in config.ordered(contributions.keys().map(String::as_str)) {
            for obj in contributions[plugin].iter() {
                match by_id.get(&obj.id) {
                    Some(&idx) => merge_into(Arc::make_mut(&mut objects[idx]), obj),
                    None => {
                        by_id.insert(obj.id.clone(), objects.len());
                        objects.push(Arc::clone(obj));
                    }
                }
            }
        }
        objects.sort_by(|a, b| a.id.cmp(&b.id));
        let by_id = objects
            .iter()
            .enumerate()
            .map(|(idx, o)| (o.id.clone(), idx))
            .collect();
        Self {
            version,
            contributions,
            objects,
            by_id,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Merged objects, ordered by id.
    pub fn objects(&self) -> &[Arc<CatalogObject>] {
        &self.objects
    }

    pub fn get(&self, id: &str) -> Option<&Arc<CatalogObject>> {
        self.by_id.get(id).map(|&idx| &self.objects[idx])
    }

    pub fn objects_matching<F>(&self, predicate: F) -> Vec<Arc<CatalogObject>>
    where
        F: Fn(&CatalogObject) -> bool,
    {
        self.objects
            .iter()
            .filter(|o| predicate(o))
            .cloned()
            .collect()
    }

    /// Objects exactly as `plugin` published them, before merging.
    pub fn contribution(&self, plugin: &str) -> Option<&[Arc<CatalogObject>]> {
        self.contributions.get(plugin).map(|c| &c[..])
    }

    pub fn plugin_ids(&self) -> impl Iterator<Item = &str> {
        self.contributions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Fold a lower-priority duplicate into `target`.
fn merge_into(target: &mut CatalogObject, other: &CatalogObject) {
    for name in std::iter::once(&other.display_name).chain(other.aliases.iter()) {
        if *name != target.display_name && !target.aliases.contains(name) {
            target.aliases.push(name.clone());
        }
    }
    if target.icon_ref.is_none() {
        target.icon_ref = other.icon_ref.clone();
    }
    if target.content.is_none() {
        target.content = other.content.clone();
    }
}

pub struct Catalog {
    plugins: PluginManager,
    config: CatalogConfig,
    current: ArcSwap<Snapshot>,
    /// Held while publishing. Counts the changes made to each plugin's
    /// contribution, so a refresh can tell whether a watch callback got in
    /// while it was enumerating.
    publish: Mutex<HashMap<String, u64>>,
}

impl Catalog {
    /// Create a catalog over `plugins` with an empty initial snapshot. Call
    /// [`Catalog::refresh_all`] (or [`Catalog::spawn_refresh`]) to populate it.
    pub fn new(plugins: PluginManager, config: CatalogConfig) -> Self {
        Self {
            plugins,
            config,
            current: ArcSwap::from_pointee(Snapshot::default()),
            publish: Mutex::new(HashMap::new()),
        }
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn object(&self, id: &str) -> Option<Arc<CatalogObject>> {
        self.current.load().get(id).cloned()
    }

    pub fn objects_matching<F>(&self, predicate: F) -> Vec<Arc<CatalogObject>>
    where
        F: Fn(&CatalogObject) -> bool,
    {
        self.current.load().objects_matching(predicate)
    }

    /// Replace the contribution of `plugin_id` and publish a new snapshot.
    pub fn rebuild(&self, plugin_id: &str, objects: Vec<CatalogObject>) {
        let contribution = normalize(plugin_id, objects);
        let count = contribution.len();
        self.publish_with(|contributions, revisions| {
            contributions.insert(plugin_id.to_string(), contribution);
            *revisions.entry(plugin_id.to_string()).or_default() += 1;
        });
        tracing::debug!(plugin = plugin_id, objects = count, "rebuilt plugin contribution");
    }

    /// Drop everything `plugin_id` contributed.
    pub fn remove(&self, plugin_id: &str) {
        self.publish_with(|contributions, revisions| {
            contributions.remove(plugin_id);
            *revisions.entry(plugin_id.to_string()).or_default() += 1;
        });
    }

    /// Re-enumerate a single plugin.
    ///
    /// On failure the plugin's contribution is removed from the catalog and
    /// the error is returned; other plugins are untouched.
    pub fn refresh_plugin(&self, plugin_id: &str) -> Result<usize, LauncherError> {
        let plugin = self
            .plugins
            .iter_enabled(self.config.enabled_plugins.as_ref())
            .find(|p| p.name() == plugin_id)
            .ok_or_else(|| LauncherError::UnknownPlugin(plugin_id.to_string()))?;
        let started = self.revisions();
        match enumerate(&**plugin) {
            Ok(objects) => {
                let contribution = normalize(plugin_id, objects);
                let count = contribution.len();
                self.publish_refreshed(vec![(plugin_id.to_string(), Some(contribution))], &started);
                Ok(count)
            }
            Err(err) => {
                tracing::warn!("{err}");
                self.publish_refreshed(vec![(plugin_id.to_string(), None)], &started);
                Err(err)
            }
        }
    }

    /// Enumerate every enabled plugin and publish one snapshot.
    ///
    /// Plugins that fail, including by panicking, are left out of the
    /// snapshot; their errors are returned for inspection.
    pub fn refresh_all(&self) -> Vec<LauncherError> {
        let started = self.revisions();
        let mut fresh = Vec::new();
        let mut failures = Vec::new();
        for plugin in self.plugins.iter_enabled(self.config.enabled_plugins.as_ref()) {
            let name = plugin.name().to_string();
            match enumerate(&**plugin) {
                Ok(objects) => {
                    let contribution = normalize(&name, objects);
                    fresh.push((name, Some(contribution)));
                }
                Err(err) => {
                    tracing::warn!("{err}");
                    failures.push(err);
                    fresh.push((name, None));
                }
            }
        }
        self.publish_refreshed(fresh, &started);
        tracing::info!(
            version = self.current.load().version(),
            objects = self.current.load().len(),
            failures = failures.len(),
            "catalog refreshed"
        );
        failures
    }

    /// Run [`Catalog::refresh_all`] on a background thread.
    pub fn spawn_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let catalog = Arc::clone(self);
        std::thread::spawn(move || {
            catalog.refresh_all();
        })
    }

    /// Hand every enabled plugin that supports watching a callback which
    /// rebuilds its contribution. Returns the number of watching plugins.
    pub fn start_watching(self: &Arc<Self>) -> usize {
        let mut watching = 0;
        for plugin in self.plugins.iter_enabled(self.config.enabled_plugins.as_ref()) {
            let catalog = Arc::downgrade(self);
            let name = plugin.name().to_string();
            let on_change: ChangeCallback = Arc::new(move |objects| {
                if let Some(catalog) = catalog.upgrade() {
                    catalog.rebuild(&name, objects);
                }
            });
            if plugin.watch(on_change) {
                tracing::debug!(plugin = plugin.name(), "watching plugin");
                watching += 1;
            }
        }
        watching
    }

    /// Actions applicable to `object`, collected from all enabled plugins.
    ///
    /// When several plugins offer the same action id, the higher-priority
    /// plugin's action is kept.
    pub fn actions_for(&self, object: &CatalogObject) -> Vec<CatalogAction> {
        let enabled: Vec<_> = self
            .plugins
            .iter_enabled(self.config.enabled_plugins.as_ref())
            .collect();
        let order = self.config.ordered(enabled.iter().copied().map(|p| p.name()));
        let mut seen = HashSet::new();
        let mut actions = Vec::new();
        for name in order {
            let Some(plugin) = enabled.iter().find(|p| p.name() == name) else {
                continue;
            };
            for action in plugin.actions_for(object) {
                if action.applies(object) && seen.insert(action.id.clone()) {
                    actions.push(action);
                }
            }
        }
        actions
    }

    fn revisions(&self) -> HashMap<String, u64> {
        self.publish.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Publish refreshed contributions (`None` for a failed plugin), except
    /// for plugins whose contribution changed since `started` was taken.
    fn publish_refreshed(
        &self,
        fresh: Vec<(String, Option<Contribution>)>,
        started: &HashMap<String, u64>,
    ) {
        self.publish_with(|contributions, revisions| {
            for (plugin, contribution) in fresh {
                if revisions.get(&plugin) != started.get(&plugin) {
                    tracing::debug!(plugin = %plugin, "contribution changed during refresh; keeping newer");
                    continue;
                }
                match contribution {
                    Some(c) => contributions.insert(plugin.clone(), c),
                    None => contributions.remove(&plugin),
                };
                *revisions.entry(plugin).or_default() += 1;
            }
        });
    }

    fn publish_with(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, Contribution>, &mut HashMap<String, u64>),
    ) {
        let mut revisions = self.publish.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.current.load();
        let mut contributions = current.contributions.clone();
        f(&mut contributions, &mut *revisions);
        let next = Snapshot::build(current.version + 1, contributions, &self.config);
        self.current.store(Arc::new(next));
    }
}

/// Run `plugin.enumerate()`, turning an error or a panic into
/// [`LauncherError::PluginEnumeration`].
fn enumerate(plugin: &dyn Plugin) -> Result<Vec<CatalogObject>, LauncherError> {
    let source = match panic::catch_unwind(AssertUnwindSafe(|| plugin.enumerate())) {
        Ok(Ok(objects)) => return Ok(objects),
        Ok(Err(err)) => err,
        Err(payload) => {
            let message = if let Some(message) = payload.downcast_ref::<&str>() {
                (*message).to_string()
            } else if let Some(message) = payload.downcast_ref::<String>() {
                message.clone()
            } else {
                "unknown panic payload".to_string()
            };
            anyhow::anyhow!("panicked: {message}")
        }
    };
    Err(LauncherError::PluginEnumeration {
        plugin: plugin.name().to_string(),
        source,
    })
}

/// Stamp the source plugin and drop duplicate ids within one contribution.
fn normalize(plugin_id: &str, objects: Vec<CatalogObject>) -> Contribution {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(objects.len());
    for mut obj in objects {
        if !seen.insert(obj.id.clone()) {
            tracing::debug!(plugin = plugin_id, id = %obj.id, "skipping duplicate id");
            continue;
        }
        obj.source_plugin_id = plugin_id.to_string();
        out.push(Arc::new(obj));
    }
    out.into()
}
