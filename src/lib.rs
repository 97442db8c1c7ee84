pub mod catalog;
pub mod error;
pub mod hotkey;
pub mod launcher;
pub mod learner;
pub mod logging;
pub mod matcher;
pub mod objects;
pub mod pipeline;
pub mod plugin;
pub mod plugins;
pub mod ranker;
pub mod session;
pub mod settings;
pub mod triggers;

pub use error::{LauncherError, Result};
pub use launcher::{ActionExecutor, KeyOutcome, Launcher};
