use crate::objects::{Applicability, CatalogAction, CatalogObject, TypeTag};
use crate::plugin::Plugin;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const PLUGIN_NAME: &str = "directory";

/// Catalog id of a filesystem entry.
pub fn file_id(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Index the provided filesystem roots.
///
/// Every file becomes a `File` object and every directory below a root a
/// `Folder` object. Traversal errors are logged and fail the whole walk.
pub fn index_paths(roots: &[PathBuf]) -> anyhow::Result<Vec<CatalogObject>> {
    let mut results = Vec::new();
    for root in roots {
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::error!(path = %root.display(), error = %e, "failed to read directory entry");
                    return Err(e.into());
                }
            };
            let type_tag = if entry.file_type().is_file() {
                TypeTag::File
            } else if entry.file_type().is_dir() && entry.depth() > 0 {
                TypeTag::Folder
            } else {
                continue;
            };
            let Some(name) = entry.path().file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let path = entry.path().display().to_string();
            results.push(
                CatalogObject::new(file_id(entry.path()), name, type_tag).with_content(path),
            );
        }
    }
    Ok(results)
}

/// Actions offered for files and folders.
pub fn file_actions() -> Vec<CatalogAction> {
    vec![
        CatalogAction::new("open", "Open")
            .for_types(&[TypeTag::File, TypeTag::Folder])
            .with_accelerator('o'),
        CatalogAction::new("reveal", "Show in Folder")
            .for_types(&[TypeTag::File])
            .with_aliases(["Reveal"]),
        CatalogAction::new("move_to", "Move To...")
            .for_types(&[TypeTag::File, TypeTag::Folder])
            .with_indirect(Applicability::types(&[TypeTag::Folder]))
            .with_accelerator('m'),
        CatalogAction::new("copy_to", "Copy To...")
            .for_types(&[TypeTag::File])
            .with_indirect(Applicability::types(&[TypeTag::Folder])),
    ]
}

/// Files and folders found under a set of roots.
pub struct DirectoryPlugin {
    roots: Vec<PathBuf>,
}

impl DirectoryPlugin {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn from_settings(index_paths: &[String]) -> Self {
        Self::new(index_paths.iter().map(PathBuf::from).collect())
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl Plugin for DirectoryPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn description(&self) -> &str {
        "Files and folders under the indexed paths"
    }

    fn enumerate(&self) -> anyhow::Result<Vec<CatalogObject>> {
        index_paths(&self.roots)
    }

    fn actions_for(&self, object: &CatalogObject) -> Vec<CatalogAction> {
        file_actions()
            .into_iter()
            .filter(|a| a.applies(object))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_actions_skip_file_only_entries() {
        let plugin = DirectoryPlugin::new(Vec::new());
        let folder = CatalogObject::new("file:///tmp", "tmp", TypeTag::Folder);
        let ids: Vec<_> = plugin.actions_for(&folder).into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["open", "move_to"]);
    }
}
