use quick_launcher::catalog::{Catalog, CatalogConfig};
use quick_launcher::error::LauncherError;
use quick_launcher::objects::{CatalogAction, CatalogObject, TypeTag};
use quick_launcher::plugin::{ChangeCallback, Plugin, PluginManager};
use quick_launcher::plugins::ListPlugin;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

struct FailingPlugin;

impl Plugin for FailingPlugin {
    fn name(&self) -> &str {
        "broken"
    }

    fn enumerate(&self) -> anyhow::Result<Vec<CatalogObject>> {
        anyhow::bail!("backend unavailable")
    }
}

fn list(name: &str, objects: &[(&str, &str)]) -> Arc<ListPlugin> {
    Arc::new(ListPlugin::new(
        name,
        objects
            .iter()
            .map(|(id, n)| CatalogObject::new(*id, *n, TypeTag::Application))
            .collect(),
        Vec::new(),
    ))
}

#[test]
fn failing_plugin_is_isolated() {
    let mut plugins = PluginManager::new();
    plugins.register(Arc::new(FailingPlugin));
    plugins.register(list("apps", &[("firefox", "Firefox")]));
    let catalog = Catalog::new(plugins, CatalogConfig::default());

    let failures = catalog.refresh_all();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        &failures[0],
        LauncherError::PluginEnumeration { plugin, .. } if plugin == "broken"
    ));
    let snapshot = catalog.current_snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.get("firefox").unwrap().source_plugin_id, "apps");
    assert!(catalog.refresh_plugin("broken").is_err());
    assert!(catalog.object("firefox").is_some());
}

#[test]
fn readers_keep_their_snapshot() {
    let mut plugins = PluginManager::new();
    plugins.register(list("apps", &[("a", "Alpha")]));
    let catalog = Catalog::new(plugins, CatalogConfig::default());
    catalog.refresh_all();

    let before = catalog.current_snapshot();
    catalog.rebuild(
        "apps",
        vec![
            CatalogObject::new("a", "Alpha", TypeTag::Application),
            CatalogObject::new("b", "Beta", TypeTag::Application),
        ],
    );
    let after = catalog.current_snapshot();

    assert_eq!(before.len(), 1);
    assert_eq!(after.len(), 2);
    assert!(after.version() > before.version());
}

#[test]
fn higher_priority_plugin_wins_duplicates() {
    let mut plugins = PluginManager::new();
    plugins.register(list("low", &[("term", "Terminal"), ("only-low", "Low")]));
    plugins.register(list("high", &[("term", "Console")]));
    let config = CatalogConfig {
        plugin_priority: HashMap::from([("high".to_string(), 10)]),
        enabled_plugins: None,
    };
    let catalog = Catalog::new(plugins, config);
    catalog.refresh_all();

    let snapshot = catalog.current_snapshot();
    assert_eq!(snapshot.len(), 2);
    let term = snapshot.get("term").unwrap();
    assert_eq!(term.display_name, "Console");
    assert_eq!(term.source_plugin_id, "high");
    assert!(term.aliases.contains(&"Terminal".to_string()));
    assert_eq!(snapshot.contribution("low").unwrap().len(), 2);
}

#[test]
fn disabled_plugins_do_not_contribute() {
    let mut plugins = PluginManager::new();
    plugins.register(list("a", &[("x", "X")]));
    plugins.register(list("b", &[("y", "Y")]));
    let config = CatalogConfig {
        plugin_priority: HashMap::new(),
        enabled_plugins: Some(HashSet::from(["a".to_string()])),
    };
    let catalog = Catalog::new(plugins, config);
    catalog.refresh_all();
    assert!(catalog.object("x").is_some());
    assert!(catalog.object("y").is_none());
    assert!(matches!(
        catalog.refresh_plugin("b"),
        Err(LauncherError::UnknownPlugin(_))
    ));
}

#[test]
fn watching_plugin_pushes_changes() {
    let plugin = list("notes", &[("n1", "Groceries")]);
    let mut plugins = PluginManager::new();
    plugins.register(plugin.clone());
    let catalog = Arc::new(Catalog::new(plugins, CatalogConfig::default()));
    catalog.refresh_all();
    assert_eq!(catalog.start_watching(), 1);

    plugin
        .replace_objects(vec![CatalogObject::new("n2", "Holiday Plans", TypeTag::Text)])
        .unwrap();
    assert!(catalog.object("n1").is_none());
    assert_eq!(catalog.object("n2").unwrap().source_plugin_id, "notes");
}

#[test]
fn background_refresh_publishes() {
    let mut plugins = PluginManager::new();
    plugins.register(list("apps", &[("a", "Alpha"), ("b", "Beta")]));
    let catalog = Arc::new(Catalog::new(plugins, CatalogConfig::default()));
    catalog.spawn_refresh().join().unwrap();
    assert_eq!(catalog.current_snapshot().len(), 2);
}

#[test]
fn actions_collected_and_filtered() {
    let files = Arc::new(ListPlugin::new(
        "files",
        vec![CatalogObject::new("f", "notes.txt", TypeTag::File)],
        vec![
            CatalogAction::new("open", "Open").for_types(&[TypeTag::File]),
            CatalogAction::new("launch", "Launch").for_types(&[TypeTag::Application]),
        ],
    ));
    let clip = Arc::new(ListPlugin::new(
        "clipboard",
        Vec::new(),
        vec![
            CatalogAction::new("copy", "Copy"),
            CatalogAction::new("open", "Open Elsewhere"),
        ],
    ));
    let mut plugins = PluginManager::new();
    plugins.register(files);
    plugins.register(clip);
    let config = CatalogConfig {
        plugin_priority: HashMap::from([("files".to_string(), 1)]),
        enabled_plugins: None,
    };
    let catalog = Catalog::new(plugins, config);
    catalog.refresh_all();

    let file = catalog.object("f").unwrap();
    let actions = catalog.actions_for(&file);
    let ids: Vec<_> = actions.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["open", "copy"]);
    assert_eq!(actions[0].display_name, "Open");
}

/// Reports a newer object list through its watch callback while an
/// enumeration is still running, then returns the older list.
#[derive(Default)]
struct RacingPlugin {
    on_change: Mutex<Option<ChangeCallback>>,
}

impl Plugin for RacingPlugin {
    fn name(&self) -> &str {
        "racing"
    }

    fn enumerate(&self) -> anyhow::Result<Vec<CatalogObject>> {
        let callback = self.on_change.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(vec![CatalogObject::new("new", "Newer", TypeTag::Text)]);
        }
        Ok(vec![CatalogObject::new("old", "Older", TypeTag::Text)])
    }

    fn watch(&self, on_change: ChangeCallback) -> bool {
        *self.on_change.lock().unwrap() = Some(on_change);
        true
    }
}

#[test]
fn refresh_keeps_change_published_during_enumeration() {
    let mut plugins = PluginManager::new();
    plugins.register(Arc::new(RacingPlugin::default()));
    plugins.register(list("apps", &[("a", "Alpha")]));
    let catalog = Arc::new(Catalog::new(plugins, CatalogConfig::default()));
    assert_eq!(catalog.start_watching(), 2);

    assert!(catalog.refresh_all().is_empty());
    assert!(catalog.object("new").is_some());
    assert!(catalog.object("old").is_none());
    assert!(catalog.object("a").is_some());
}
