//! Pane and selection state machine.
//!
//! The session knows nothing about the catalog or the ranker: callers feed
//! it keystrokes and resolved selections, and it enforces which transitions
//! are legal. Every pane carries a generation counter that moves whenever the
//! pane's buffer or its candidate pool changes, so ranking results computed
//! for an older generation can be recognised as stale.

use crate::error::{LauncherError, Result, Unmet};
use crate::objects::{CatalogAction, CatalogObject};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pane {
    Object,
    Action,
    IndirectObject,
}

impl Pane {
    pub(crate) fn index(self) -> usize {
        match self {
            Pane::Object => 0,
            Pane::Action => 1,
            Pane::IndirectObject => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextMode {
    #[default]
    Normal,
    FreeText,
}

/// What the session does after a successful activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowUp {
    /// Clear buffers, selections and the stack.
    #[default]
    Reset,
    /// Keep the panes as they are, e.g. when the launcher stays open.
    Retain,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    buffer: String,
    mode: TextMode,
    /// Free-text mode was entered by a leading prefix char, not by a toggle.
    auto_free_text: bool,
    selection: Option<T>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            buffer: String::new(),
            mode: TextMode::Normal,
            auto_free_text: false,
            selection: None,
        }
    }
}

impl Slot<Arc<CatalogObject>> {
    /// Committed value: the typed text in free-text mode, else the selection.
    fn committed(&self) -> Option<Arc<CatalogObject>> {
        match self.mode {
            TextMode::FreeText if self.buffer.is_empty() => None,
            TextMode::FreeText => Some(Arc::new(CatalogObject::free_text(&self.buffer))),
            TextMode::Normal => self.selection.clone(),
        }
    }
}

/// Snapshot of the session returned by every transition.
#[derive(Debug, Clone)]
pub struct QueryState {
    pub pane: Pane,
    pub mode: TextMode,
    pub buffer: String,
    pub generation: u64,
    pub object: Option<Arc<CatalogObject>>,
    pub action: Option<CatalogAction>,
    pub indirect: Option<Arc<CatalogObject>>,
    pub stack: Vec<Arc<CatalogObject>>,
}

impl QueryState {
    pub fn stack_ids(&self) -> Vec<&str> {
        self.stack.iter().map(|o| o.id.as_str()).collect()
    }
}

/// The object/action (and indirect object) an activation committed.
#[derive(Debug, Clone)]
pub struct ActivationOutcome {
    pub object: Arc<CatalogObject>,
    pub action: CatalogAction,
    pub indirect: Option<Arc<CatalogObject>>,
    /// Set when the launcher should hide after running the action.
    pub hide_window: bool,
}

#[derive(Debug, Clone)]
pub struct Session {
    active: Pane,
    object: Slot<Arc<CatalogObject>>,
    action: Slot<CatalogAction>,
    indirect: Slot<Arc<CatalogObject>>,
    stack: Vec<Arc<CatalogObject>>,
    generations: [u64; 3],
    free_text_prefixes: Vec<char>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(vec!['/', '~'])
    }
}

impl Session {
    /// New session in the Object pane. Typing one of `free_text_prefixes`
    /// into an empty Object buffer enters free-text mode.
    pub fn new(free_text_prefixes: Vec<char>) -> Self {
        Self {
            active: Pane::Object,
            object: Slot::default(),
            action: Slot::default(),
            indirect: Slot::default(),
            stack: Vec::new(),
            generations: [0; 3],
            free_text_prefixes,
        }
    }

    pub fn active_pane(&self) -> Pane {
        self.active
    }

    pub fn buffer(&self, pane: Pane) -> &str {
        match pane {
            Pane::Object => &self.object.buffer,
            Pane::Action => &self.action.buffer,
            Pane::IndirectObject => &self.indirect.buffer,
        }
    }

    pub fn mode(&self, pane: Pane) -> TextMode {
        match pane {
            Pane::Object => self.object.mode,
            Pane::Action => self.action.mode,
            Pane::IndirectObject => self.indirect.mode,
        }
    }

    pub fn generation(&self, pane: Pane) -> u64 {
        self.generations[pane.index()]
    }

    pub fn committed_object(&self) -> Option<Arc<CatalogObject>> {
        self.object.committed()
    }

    pub fn committed_action(&self) -> Option<&CatalogAction> {
        self.action.selection.as_ref()
    }

    pub fn committed_indirect(&self) -> Option<Arc<CatalogObject>> {
        self.indirect.committed()
    }

    pub fn stack(&self) -> &[Arc<CatalogObject>] {
        &self.stack
    }

    pub fn state(&self) -> QueryState {
        QueryState {
            pane: self.active,
            mode: self.mode(self.active),
            buffer: self.buffer(self.active).to_string(),
            generation: self.generation(self.active),
            object: self.committed_object(),
            action: self.action.selection.clone(),
            indirect: self.committed_indirect(),
            stack: self.stack.clone(),
        }
    }

    /// Append `text` to the active pane's buffer.
    pub fn input(&mut self, text: &str) -> QueryState {
        for ch in text.chars() {
            self.push_char(ch);
        }
        self.state()
    }

    fn push_char(&mut self, ch: char) {
        let prefixes = &self.free_text_prefixes;
        let pane = self.active;
        match pane {
            Pane::Object => {
                let slot = &mut self.object;
                if slot.mode == TextMode::Normal && slot.buffer.is_empty() && prefixes.contains(&ch) {
                    tracing::debug!(prefix = %ch, "entering free-text mode");
                    slot.mode = TextMode::FreeText;
                    slot.auto_free_text = true;
                }
                slot.buffer.push(ch);
                slot.selection = None;
            }
            Pane::Action => {
                self.action.buffer.push(ch);
                self.action.selection = None;
            }
            Pane::IndirectObject => {
                self.indirect.buffer.push(ch);
                self.indirect.selection = None;
            }
        }
        self.invalidate_from(pane);
    }

    /// Delete the last char of the active buffer, or go up a level when the
    /// buffer is already empty.
    pub fn delete_last_char(&mut self) -> QueryState {
        let pane = self.active;
        let popped = match pane {
            Pane::Object => pop_char(&mut self.object),
            Pane::Action => pop_char(&mut self.action),
            Pane::IndirectObject => pop_char(&mut self.indirect),
        };
        if popped {
            self.invalidate_from(pane);
            self.state()
        } else {
            self.go_up_level()
        }
    }

    /// Move to the parent pane, clearing the pane being left.
    pub fn go_up_level(&mut self) -> QueryState {
        match self.active {
            Pane::Object => {}
            Pane::Action => {
                self.action = Slot::default();
                self.invalidate_from(Pane::Action);
                self.active = Pane::Object;
            }
            Pane::IndirectObject => {
                self.indirect = Slot::default();
                self.invalidate_from(Pane::IndirectObject);
                self.active = Pane::Action;
            }
        }
        tracing::debug!(pane = ?self.active, "went up a level");
        self.state()
    }

    pub fn select_pane(&mut self, pane: Pane) -> Result<QueryState> {
        let allowed = match pane {
            Pane::Object => true,
            Pane::Action => self.committed_object().is_some(),
            Pane::IndirectObject => self
                .action
                .selection
                .as_ref()
                .is_some_and(|a| a.requires_indirect),
        };
        if !allowed {
            return Err(LauncherError::PaneUnavailable(pane));
        }
        self.active = pane;
        Ok(self.state())
    }

    /// Switch the active pane between normal and free-text mode.
    pub fn toggle_free_text(&mut self) -> Result<QueryState> {
        let pane = self.active;
        let slot = match pane {
            Pane::Object => &mut self.object,
            Pane::IndirectObject => &mut self.indirect,
            Pane::Action => return Err(LauncherError::FreeTextUnavailable(pane)),
        };
        slot.mode = match slot.mode {
            TextMode::Normal => TextMode::FreeText,
            TextMode::FreeText => TextMode::Normal,
        };
        slot.auto_free_text = false;
        slot.selection = None;
        tracing::debug!(pane = ?pane, mode = ?slot.mode, "toggled free-text mode");
        self.invalidate_from(pane);
        Ok(self.state())
    }

    /// Commit a catalog object in the active Object or IndirectObject pane.
    pub fn commit_object(&mut self, object: Arc<CatalogObject>) -> Result<QueryState> {
        let pane = self.active;
        match pane {
            Pane::Object => set_selection(&mut self.object, object),
            Pane::IndirectObject => {
                let accepted = self
                    .action
                    .selection
                    .as_ref()
                    .is_some_and(|a| a.accepts_indirect(&object));
                if !accepted {
                    return Err(LauncherError::UnknownCandidate(object.id.clone(), pane));
                }
                set_selection(&mut self.indirect, object)
            }
            Pane::Action => return Err(LauncherError::UnknownCandidate(object.id.clone(), pane)),
        }
        self.invalidate_below(pane);
        Ok(self.state())
    }

    /// Commit `action` in the Action pane. The action must apply to the
    /// committed object.
    pub fn commit_action(&mut self, action: CatalogAction) -> Result<QueryState> {
        let applies = self.committed_object().is_some_and(|o| action.applies(&o));
        if self.active != Pane::Action || !applies {
            return Err(LauncherError::UnknownCandidate(action.id, Pane::Action));
        }
        self.action.selection = Some(action);
        self.invalidate_below(Pane::Action);
        Ok(self.state())
    }

    /// Push the committed object onto the stack and start a fresh search.
    pub fn put_on_stack(&mut self) -> Result<QueryState> {
        let object = self.committed_object().ok_or(LauncherError::NothingToStack)?;
        tracing::debug!(id = %object.id, depth = self.stack.len() + 1, "pushed object on stack");
        self.stack.push(object);
        self.object = Slot::default();
        self.active = Pane::Object;
        self.invalidate_from(Pane::Object);
        Ok(self.state())
    }

    /// Clear buffers, selections and the stack.
    pub fn reset_all(&mut self) -> QueryState {
        self.object = Slot::default();
        self.action = Slot::default();
        self.indirect = Slot::default();
        self.stack.clear();
        self.active = Pane::Object;
        self.invalidate_from(Pane::Object);
        self.state()
    }

    /// Escape: same as [`Session::reset_all`].
    pub fn cancel(&mut self) -> QueryState {
        self.reset_all()
    }

    /// Check the activation preconditions and, if they hold, return what to
    /// run and apply `follow_up`. On failure the session is unchanged.
    ///
    /// An action that needs an indirect object and finds the IndirectObject
    /// pane empty consumes the most recent stack entry if it qualifies.
    pub fn activate(&mut self, follow_up: FollowUp) -> Result<ActivationOutcome> {
        let unmet = |reason| Err(LauncherError::ActivationPreconditionUnmet(reason));
        let Some(object) = self.committed_object() else {
            return unmet(Unmet::NoObject);
        };
        let Some(action) = self.action.selection.clone() else {
            return unmet(Unmet::NoAction);
        };
        if !action.applies(&object) {
            return unmet(Unmet::ActionNotApplicable);
        }
        let mut consumed = false;
        let indirect = if action.requires_indirect {
            match self.committed_indirect() {
                Some(ind) if action.accepts_indirect(&ind) => Some(ind),
                Some(_) => return unmet(Unmet::IndirectNotApplicable),
                None => match self.stack.last() {
                    Some(top) if action.accepts_indirect(top) => {
                        consumed = true;
                        Some(Arc::clone(top))
                    }
                    _ => return unmet(Unmet::NoIndirectObject),
                },
            }
        } else {
            None
        };
        if consumed {
            self.stack.pop();
        }
        tracing::debug!(
            object = %object.id,
            action = %action.id,
            indirect = indirect.as_ref().map(|o| o.id.as_str()),
            "activation committed"
        );
        let outcome = ActivationOutcome {
            object,
            action,
            indirect,
            hide_window: false,
        };
        if follow_up == FollowUp::Reset {
            self.reset_all();
        }
        Ok(outcome)
    }

    /// Bump the generation of `pane` and of every pane that depends on it.
    fn invalidate_from(&mut self, pane: Pane) {
        self.generations[pane.index()] += 1;
        self.invalidate_below(pane);
    }

    /// Clear and bump the panes whose candidates depend on `pane`'s value.
    fn invalidate_below(&mut self, pane: Pane) {
        match pane {
            Pane::Object => {
                self.action = Slot::default();
                self.indirect = Slot::default();
                self.generations[Pane::Action.index()] += 1;
                self.generations[Pane::IndirectObject.index()] += 1;
            }
            Pane::Action => {
                self.indirect = Slot::default();
                self.generations[Pane::IndirectObject.index()] += 1;
            }
            Pane::IndirectObject => {}
        }
    }
}

fn pop_char<T>(slot: &mut Slot<T>) -> bool {
    if slot.buffer.pop().is_none() {
        return false;
    }
    if slot.auto_free_text && slot.buffer.is_empty() {
        slot.mode = TextMode::Normal;
        slot.auto_free_text = false;
    }
    slot.selection = None;
    true
}

fn set_selection(slot: &mut Slot<Arc<CatalogObject>>, object: Arc<CatalogObject>) {
    slot.mode = TextMode::Normal;
    slot.auto_free_text = false;
    slot.selection = Some(object);
}
