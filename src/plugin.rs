use crate::objects::{CatalogAction, CatalogObject};
use std::collections::HashSet;
use std::sync::Arc;

/// Callback a watching plugin invokes with its complete new object list.
pub type ChangeCallback = Arc<dyn Fn(Vec<CatalogObject>) + Send + Sync>;

pub trait Plugin: Send + Sync {
    /// Unique plugin identifier.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Enumerate every object this plugin contributes.
    fn enumerate(&self) -> anyhow::Result<Vec<CatalogObject>>;

    /// Actions this plugin offers for `object`. Must be pure; the catalog
    /// still checks each action's applicability before offering it.
    fn actions_for(&self, _object: &CatalogObject) -> Vec<CatalogAction> {
        Vec::new()
    }

    /// Start reporting changes through `on_change`. Returns `false` when the
    /// plugin does not support watching.
    fn watch(&self, _on_change: ChangeCallback) -> bool {
        false
    }
}

/// A manager that holds plugins
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Register `plugin`, replacing an earlier plugin with the same name.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        if let Some(existing) = self.plugins.iter_mut().find(|p| p.name() == plugin.name()) {
            tracing::warn!(plugin = plugin.name(), "replacing plugin with duplicate name");
            *existing = plugin;
        } else {
            self.plugins.push(plugin);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.iter().find(|p| p.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins.iter()
    }

    /// Plugins allowed by `enabled`; `None` enables everything.
    pub fn iter_enabled<'a>(
        &'a self,
        enabled: Option<&'a HashSet<String>>,
    ) -> impl Iterator<Item = &'a Arc<dyn Plugin>> + 'a {
        self.plugins
            .iter()
            .filter(move |p| enabled.map_or(true, |set| set.contains(p.name())))
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
