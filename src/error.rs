use crate::session::Pane;
use std::path::PathBuf;

/// Reason an activation request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unmet {
    NoObject,
    NoAction,
    /// The committed action no longer accepts the committed object.
    ActionNotApplicable,
    NoIndirectObject,
    IndirectNotApplicable,
}

impl std::fmt::Display for Unmet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Unmet::NoObject => "no object selected",
            Unmet::NoAction => "no action selected",
            Unmet::ActionNotApplicable => "action does not apply to the selected object",
            Unmet::NoIndirectObject => "action requires an indirect object",
            Unmet::IndirectNotApplicable => "indirect object is not accepted by the action",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    #[error("plugin '{plugin}' failed to enumerate: {source}")]
    PluginEnumeration {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("activation not available: {0}")]
    ActivationPreconditionUnmet(Unmet),
    #[error("learning store {path} is corrupt: {source}")]
    LearningStoreCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("learning store {path} could not be read: {source}")]
    LearningStoreUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no candidate with id '{0}' in the {1:?} pane")]
    UnknownCandidate(String, Pane),
    #[error("the {0:?} pane cannot be selected right now")]
    PaneUnavailable(Pane),
    #[error("free-text mode is not available in the {0:?} pane")]
    FreeTextUnavailable(Pane),
    #[error("no committed object to put on the stack")]
    NothingToStack,
    #[error("no trigger bound to '{0}'")]
    UnknownTrigger(String),
    #[error("no plugin named '{0}'")]
    UnknownPlugin(String),
}

pub type Result<T> = std::result::Result<T, LauncherError>;
