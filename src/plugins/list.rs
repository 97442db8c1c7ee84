use crate::objects::{CatalogAction, CatalogObject, TypeTag};
use crate::plugins::directory::file_actions;
use crate::plugin::{ChangeCallback, Plugin};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

pub fn load_objects(path: &Path) -> anyhow::Result<Vec<CatalogObject>> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let objects: Vec<CatalogObject> = serde_json::from_str(&content)?;
    Ok(objects)
}

pub fn save_objects(path: &Path, objects: &[CatalogObject]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(objects)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Actions for every kind of object a hand-written list usually holds.
pub fn default_actions() -> Vec<CatalogAction> {
    let mut actions = vec![
        CatalogAction::new("launch", "Launch")
            .for_types(&[TypeTag::Application])
            .with_accelerator('l'),
        CatalogAction::new("open_url", "Open URL")
            .for_types(&[TypeTag::Url, TypeTag::Bookmark])
            .with_accelerator('o'),
        CatalogAction::new("copy_text", "Copy")
            .for_types(&[TypeTag::Text, TypeTag::Url, TypeTag::Contact])
            .with_accelerator('c'),
    ];
    actions.extend(file_actions());
    actions
}

/// Plugin serving a fixed set of actions and a replaceable list of objects,
/// optionally read from a JSON file on every enumeration.
pub struct ListPlugin {
    name: String,
    objects: RwLock<Vec<CatalogObject>>,
    actions: Vec<CatalogAction>,
    path: Option<PathBuf>,
    on_change: Mutex<Option<ChangeCallback>>,
}

impl ListPlugin {
    pub fn new(name: impl Into<String>, objects: Vec<CatalogObject>, actions: Vec<CatalogAction>) -> Self {
        Self {
            name: name.into(),
            objects: RwLock::new(objects),
            actions,
            path: None,
            on_change: Mutex::new(None),
        }
    }

    /// Plugin whose objects are stored in `path`.
    pub fn from_file(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        actions: Vec<CatalogAction>,
    ) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new(name, Vec::new(), actions)
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace the objects, write them to the backing file if any, and
    /// notify the catalog when it is watching.
    pub fn replace_objects(&self, objects: Vec<CatalogObject>) -> anyhow::Result<()> {
        if let Some(path) = &self.path {
            save_objects(path, &objects)?;
        }
        *self.objects.write().unwrap_or_else(|e| e.into_inner()) = objects.clone();
        let callback = self
            .on_change
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(cb) = callback {
            tracing::debug!(plugin = %self.name, objects = objects.len(), "pushing object change");
            cb(objects);
        }
        Ok(())
    }
}

impl Plugin for ListPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Objects from a static list"
    }

    fn enumerate(&self) -> anyhow::Result<Vec<CatalogObject>> {
        if let Some(path) = &self.path {
            let objects = load_objects(path)?;
            *self.objects.write().unwrap_or_else(|e| e.into_inner()) = objects;
        }
        Ok(self.objects.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn actions_for(&self, object: &CatalogObject) -> Vec<CatalogAction> {
        self.actions
            .iter()
            .filter(|a| a.applies(object))
            .cloned()
            .collect()
    }

    fn watch(&self, on_change: ChangeCallback) -> bool {
        *self.on_change.lock().unwrap_or_else(|e| e.into_inner()) = Some(on_change);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn missing_file_fails_enumeration() {
        let dir = tempdir().unwrap();
        let plugin = ListPlugin::from_file("list", dir.path().join("none.json"), Vec::new());
        assert!(plugin.enumerate().is_err());
    }

    #[test]
    fn replace_writes_file_and_notifies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("objects.json");
        std::fs::write(&path, "").unwrap();
        let plugin = ListPlugin::from_file("list", &path, Vec::new());
        assert!(plugin.enumerate().unwrap().is_empty());

        let seen = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&seen);
        assert!(plugin.watch(Arc::new(move |objs| *counter.lock().unwrap() = objs.len())));
        plugin
            .replace_objects(vec![CatalogObject::new("a", "Alpha", TypeTag::Other)])
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), 1);
        assert_eq!(load_objects(&path).unwrap().len(), 1);
    }

    #[test]
    fn actions_filtered_by_applicability() {
        let plugin = ListPlugin::new(
            "list",
            Vec::new(),
            vec![
                CatalogAction::new("open", "Open").for_types(&[TypeTag::File]),
                CatalogAction::new("copy", "Copy"),
            ],
        );
        let obj = CatalogObject::new("t", "Text", TypeTag::Text);
        let ids: Vec<_> = plugin.actions_for(&obj).into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["copy"]);
    }

    #[test]
    fn default_actions_cover_listed_kinds() {
        let plugin = ListPlugin::new("list", Vec::new(), default_actions());
        let ids = |tag| -> Vec<String> {
            plugin
                .actions_for(&CatalogObject::new("x", "X", tag))
                .into_iter()
                .map(|a| a.id)
                .collect()
        };
        assert_eq!(ids(TypeTag::Application), vec!["launch"]);
        assert_eq!(ids(TypeTag::Url), vec!["open_url", "copy_text"]);
        assert!(ids(TypeTag::File).contains(&"open".to_string()));
        assert!(ids(TypeTag::Other).is_empty());
    }
}
