use quick_launcher::catalog::{Catalog, CatalogConfig};
use quick_launcher::error::LauncherError;
use quick_launcher::learner::{Learner, LearnerConfig, LEARNING_FILE};
use quick_launcher::objects::{CatalogObject, TypeTag};
use quick_launcher::plugin::{Plugin, PluginManager};
use quick_launcher::plugins::ListPlugin;
use serial_test::serial;
use std::sync::Arc;
use tempfile::tempdir;

struct EmptyPlugin;

impl Plugin for EmptyPlugin {
    fn name(&self) -> &str {
        "empty"
    }

    fn enumerate(&self) -> anyhow::Result<Vec<CatalogObject>> {
        Ok(Vec::new())
    }
}

struct PanickingPlugin;

impl Plugin for PanickingPlugin {
    fn name(&self) -> &str {
        "panicky"
    }

    fn enumerate(&self) -> anyhow::Result<Vec<CatalogObject>> {
        panic!("index exploded")
    }
}

#[test]
fn corrupt_object_file_does_not_panic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("objects.json");
    std::fs::write(&path, b"not json").unwrap();
    let mut plugins = PluginManager::new();
    plugins.register(Arc::new(ListPlugin::from_file("list", &path, Vec::new())));
    plugins.register(Arc::new(EmptyPlugin));
    let catalog = Catalog::new(plugins, CatalogConfig::default());
    let failures = catalog.refresh_all();
    assert_eq!(failures.len(), 1);
    assert!(catalog.current_snapshot().is_empty());
}

#[test]
fn truncated_learning_store_is_replaced() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(LEARNING_FILE);
    std::fs::write(&path, br#"{"version":1,"records":[{"subject":"a""#).unwrap();
    let learner = Learner::open(&path, LearnerConfig::default());
    assert!(learner.is_empty());
    learner.save().unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&contents).is_ok());
}

#[test]
fn panicking_plugin_does_not_abort_refresh() {
    let mut plugins = PluginManager::new();
    plugins.register(Arc::new(ListPlugin::new(
        "good",
        vec![CatalogObject::new("alpha", "Alpha", TypeTag::Application)],
        Vec::new(),
    )));
    plugins.register(Arc::new(PanickingPlugin));
    let catalog = Arc::new(Catalog::new(plugins, CatalogConfig::default()));

    let failures = catalog.refresh_all();
    assert_eq!(failures.len(), 1);
    match &failures[0] {
        LauncherError::PluginEnumeration { plugin, source } => {
            assert_eq!(plugin, "panicky");
            assert!(source.to_string().contains("index exploded"));
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(catalog.current_snapshot().len(), 1);
    assert!(catalog.refresh_plugin("panicky").is_err());
    assert!(catalog.object("alpha").is_some());

    catalog.spawn_refresh().join().unwrap();
    assert!(catalog.object("alpha").is_some());
}

#[test]
#[serial]
fn unreadable_learning_store_is_reported() {
    let dir = tempdir().unwrap();
    let store = dir.path().join(LEARNING_FILE);
    std::fs::write(&store, [0xff, 0xfe, 0x00, 0x7b]).unwrap();
    let log = dir.path().join("log.txt");

    let (dispatch, guard) = quick_launcher::logging::dispatch(false, Some(log.as_path()));
    let learner = tracing::dispatcher::with_default(&dispatch, || {
        Learner::open(&store, LearnerConfig::default())
    });
    drop(guard);

    assert!(learner.is_empty());
    let contents = std::fs::read_to_string(&log).unwrap();
    assert!(contents.contains("could not be read"));
}

#[test]
#[serial]
fn missing_learning_store_is_quiet() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("log.txt");

    let (dispatch, guard) = quick_launcher::logging::dispatch(false, Some(log.as_path()));
    let learner = tracing::dispatcher::with_default(&dispatch, || {
        Learner::open(dir.path().join(LEARNING_FILE), LearnerConfig::default())
    });
    drop(guard);

    assert!(learner.is_empty());
    let contents = std::fs::read_to_string(&log).unwrap_or_default();
    assert!(!contents.contains("empty learning table"));
}
