use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Capability tag consulted by action applicability predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Application,
    File,
    Folder,
    Contact,
    Bookmark,
    Url,
    Text,
    Other,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Application => "application",
            TypeTag::File => "file",
            TypeTag::Folder => "folder",
            TypeTag::Contact => "contact",
            TypeTag::Bookmark => "bookmark",
            TypeTag::Url => "url",
            TypeTag::Text => "text",
            TypeTag::Other => "other",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A launchable object published by a plugin.
///
/// `id` doubles as the identity key: two plugins publishing the same id
/// (for example the same file path) describe the same object and are merged
/// by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogObject {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub type_tag: TypeTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_ref: Option<String>,
    #[serde(default)]
    pub source_plugin_id: String,
    /// Payload such as the literal text or a filesystem path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl CatalogObject {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            aliases: Vec::new(),
            type_tag,
            icon_ref: None,
            source_plugin_id: String::new(),
            content: None,
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_icon(mut self, icon_ref: impl Into<String>) -> Self {
        self.icon_ref = Some(icon_ref.into());
        self
    }

    /// Object standing for literal text typed in free-text mode.
    ///
    /// Buffers starting with a rooted path prefix become `File` objects so
    /// that file actions apply to them.
    pub fn free_text(text: &str) -> Self {
        let type_tag = if text.starts_with('/') || text.starts_with('~') {
            TypeTag::File
        } else {
            TypeTag::Text
        };
        let mut obj = Self::new(format!("text:{text}"), text, type_tag).with_content(text);
        obj.source_plugin_id = FREE_TEXT_SOURCE.into();
        obj
    }
}

/// Source id stamped on objects created from free text.
pub const FREE_TEXT_SOURCE: &str = "free_text";

pub type ObjectPredicate = Arc<dyn Fn(&CatalogObject) -> bool + Send + Sync>;

/// Applicability rule for an action's direct or indirect object.
///
/// The rule accepts an object when its type is in `types` (an empty list
/// accepts every type) and the optional custom check passes. Checks must be
/// pure.
#[derive(Clone, Default)]
pub struct Applicability {
    types: Vec<TypeTag>,
    check: Option<ObjectPredicate>,
}

impl Applicability {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn types(types: &[TypeTag]) -> Self {
        Self {
            types: types.to_vec(),
            check: None,
        }
    }

    pub fn with_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&CatalogObject) -> bool + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(check));
        self
    }

    pub fn accepts(&self, obj: &CatalogObject) -> bool {
        (self.types.is_empty() || self.types.contains(&obj.type_tag))
            && self.check.as_ref().map_or(true, |check| check(obj))
    }
}

impl fmt::Debug for Applicability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Applicability")
            .field("types", &self.types)
            .field("check", &self.check.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CatalogAction {
    pub id: String,
    pub display_name: String,
    pub aliases: Vec<String>,
    pub applies_to: Applicability,
    pub requires_indirect: bool,
    pub indirect_applies_to: Applicability,
    pub accelerator: Option<char>,
}

impl CatalogAction {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            aliases: Vec::new(),
            applies_to: Applicability::any(),
            requires_indirect: false,
            indirect_applies_to: Applicability::any(),
            accelerator: None,
        }
    }

    pub fn for_types(mut self, types: &[TypeTag]) -> Self {
        self.applies_to = Applicability::types(types);
        self
    }

    pub fn applies_when(mut self, rule: Applicability) -> Self {
        self.applies_to = rule;
        self
    }

    pub fn with_indirect(mut self, rule: Applicability) -> Self {
        self.requires_indirect = true;
        self.indirect_applies_to = rule;
        self
    }

    pub fn with_accelerator(mut self, key: char) -> Self {
        self.accelerator = Some(key);
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn applies(&self, obj: &CatalogObject) -> bool {
        self.applies_to.accepts(obj)
    }

    pub fn accepts_indirect(&self, obj: &CatalogObject) -> bool {
        self.requires_indirect && self.indirect_applies_to.accepts(obj)
    }
}
