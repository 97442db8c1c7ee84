//! The launcher facade: one session wired to the catalog, the learner and
//! the off-thread ranking worker.
//!
//! Every transition re-derives the candidate pool of each pane and submits a
//! rank job for the panes whose buffer or pool changed. Batches come back
//! through [`Launcher::poll_results`] or [`Launcher::wait_for_results`] and
//! only batches matching the current pane generation are kept.

use crate::catalog::{Catalog, Snapshot};
use crate::error::{LauncherError, Result, Unmet};
use crate::hotkey::{Hotkey, Modifiers};
use crate::learner::Learner;
use crate::objects::{CatalogAction, CatalogObject, FREE_TEXT_SOURCE};
use crate::pipeline::{rank_once, CandidatePool, Delivery, QueryTicket, QueryWorker, RankJob, RankedBatch};
use crate::plugin::PluginManager;
use crate::ranker::{MatchResult, Ranker};
use crate::session::{ActivationOutcome, FollowUp, Pane, QueryState, Session, TextMode};
use crate::settings::Settings;
use crate::triggers::{TriggerBinding, TriggerTable};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Ranking slower than this is logged.
pub const INTERACTIVE_BUDGET: Duration = Duration::from_millis(50);

const PANES: [Pane; 3] = [Pane::Object, Pane::Action, Pane::IndirectObject];

/// Runs a committed object/action pair. Failures are logged by the launcher
/// and never surfaced to the session.
pub trait ActionExecutor: Send {
    fn execute(
        &self,
        object: &CatalogObject,
        action: &CatalogAction,
        indirect: Option<&CatalogObject>,
    ) -> anyhow::Result<()>;
}

/// Executor that only logs what it was asked to run.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogExecutor;

impl ActionExecutor for LogExecutor {
    fn execute(
        &self,
        object: &CatalogObject,
        action: &CatalogAction,
        indirect: Option<&CatalogObject>,
    ) -> anyhow::Result<()> {
        tracing::info!(
            object = %object.id,
            action = %action.id,
            indirect = indirect.map(|o| o.id.as_str()),
            "execute"
        );
        Ok(())
    }
}

/// What a key press ended up doing.
#[derive(Debug, Clone)]
pub enum KeyOutcome {
    Activated(ActivationOutcome),
    /// The action was committed but still needs an indirect object; the
    /// IndirectObject pane is now active.
    AwaitingIndirect(QueryState),
}

impl KeyOutcome {
    pub fn activated(self) -> Option<ActivationOutcome> {
        match self {
            KeyOutcome::Activated(outcome) => Some(outcome),
            KeyOutcome::AwaitingIndirect(_) => None,
        }
    }
}

/// Where a pane's candidates come from.
struct PoolSource {
    key: String,
    context: Option<String>,
    correlated: Option<String>,
}

#[derive(Default)]
struct PaneView {
    /// Pool the current results were ranked from.
    pool_key: Option<String>,
    /// Generation and pool of the last submitted job.
    dispatched: Option<(u64, String)>,
    pending: Option<QueryTicket>,
    results: Vec<MatchResult>,
}

impl PaneView {
    fn clear(&mut self) {
        *self = Self::default();
    }
}

pub struct Launcher {
    settings: Settings,
    catalog: Arc<Catalog>,
    learner: Arc<Learner>,
    ranker: Ranker,
    session: Session,
    worker: QueryWorker,
    executor: Box<dyn ActionExecutor>,
    triggers: TriggerTable,
    accelerators: HashMap<String, char>,
    accelerator_modifier: Modifiers,
    views: [PaneView; 3],
    object_pool: Option<(u64, Arc<Vec<Arc<CatalogObject>>>)>,
}

impl Launcher {
    /// Build a launcher over `plugins`. The learning store is opened from
    /// the settings; the catalog starts empty until
    /// [`Launcher::refresh_catalog`] runs.
    pub fn new(settings: Settings, plugins: PluginManager, executor: Box<dyn ActionExecutor>) -> Self {
        let learner = Arc::new(Learner::open(settings.learning_path(), settings.learner_config()));
        Self::with_learner(settings, plugins, learner, executor)
    }

    pub fn with_learner(
        settings: Settings,
        plugins: PluginManager,
        learner: Arc<Learner>,
        executor: Box<dyn ActionExecutor>,
    ) -> Self {
        let catalog = Arc::new(Catalog::new(plugins, settings.catalog_config()));
        let ranker = Ranker::new(settings.rank_config(), Arc::clone(&learner));
        let worker = QueryWorker::spawn(ranker.clone(), INTERACTIVE_BUDGET);
        let mut launcher = Self {
            session: Session::new(settings.free_text_prefixes.clone()),
            triggers: TriggerTable::new(settings.trigger_bindings()),
            accelerators: settings.accelerator_overrides(),
            accelerator_modifier: settings.accelerator_modifier(),
            settings,
            catalog,
            learner,
            ranker,
            worker,
            executor,
            views: Default::default(),
            object_pool: None,
        };
        launcher.sync();
        launcher
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn learner(&self) -> &Arc<Learner> {
        &self.learner
    }

    /// Re-enumerate every plugin and re-rank against the new snapshot.
    pub fn refresh_catalog(&mut self) -> Vec<LauncherError> {
        let failures = self.catalog.refresh_all();
        self.sync();
        failures
    }

    pub fn bind_trigger(&mut self, binding: TriggerBinding) {
        self.triggers.bind(binding);
    }

    /// Rank the active pane's candidates for `text` right away, without
    /// touching the session.
    pub fn query(&self, text: &str) -> Vec<MatchResult> {
        let pane = self.session.active_pane();
        let snapshot = self.catalog.current_snapshot();
        let Some(source) = self.source(pane, &snapshot) else {
            return Vec::new();
        };
        let Some(pool) = self.pool(pane, &snapshot) else {
            return Vec::new();
        };
        let job = RankJob {
            ticket: QueryTicket {
                pane,
                generation: self.session.generation(pane),
                text: text.to_string(),
            },
            pool_key: source.key,
            pool,
            context: source.context,
            correlated: source.correlated,
        };
        rank_once(&self.ranker, &job).results
    }

    pub fn input(&mut self, text: &str) -> QueryState {
        let state = self.session.input(text);
        self.sync();
        state
    }

    pub fn delete_last_char(&mut self) -> QueryState {
        let state = self.session.delete_last_char();
        self.sync();
        state
    }

    pub fn select_pane(&mut self, pane: Pane) -> Result<QueryState> {
        let state = self.session.select_pane(pane)?;
        self.sync();
        Ok(state)
    }

    /// Commit the candidate `candidate_id` in the active pane.
    pub fn commit(&mut self, candidate_id: &str) -> Result<QueryState> {
        let pane = self.session.active_pane();
        let unknown = || LauncherError::UnknownCandidate(candidate_id.to_string(), pane);
        let state = match pane {
            Pane::Object | Pane::IndirectObject => {
                let object = self.catalog.object(candidate_id).ok_or_else(unknown)?;
                self.session.commit_object(object)?
            }
            Pane::Action => {
                let object = self.session.committed_object().ok_or_else(unknown)?;
                let action = self
                    .catalog
                    .actions_for(&object)
                    .into_iter()
                    .find(|a| a.id == candidate_id)
                    .ok_or_else(unknown)?;
                self.session.commit_action(action)?
            }
        };
        self.sync();
        Ok(state)
    }

    pub fn put_on_stack(&mut self) -> Result<QueryState> {
        let state = self.session.put_on_stack()?;
        self.sync();
        Ok(state)
    }

    pub fn toggle_free_text(&mut self) -> Result<QueryState> {
        let state = self.session.toggle_free_text()?;
        self.sync();
        Ok(state)
    }

    pub fn reset_all(&mut self) -> QueryState {
        let state = self.session.reset_all();
        self.sync();
        state
    }

    pub fn cancel(&mut self) -> QueryState {
        let state = self.session.cancel();
        self.sync();
        state
    }

    pub fn go_up_level(&mut self) -> QueryState {
        let state = self.session.go_up_level();
        self.sync();
        state
    }

    pub fn state(&self) -> QueryState {
        self.session.state()
    }

    /// Latest results for the active pane.
    pub fn results(&self) -> &[MatchResult] {
        self.results_for(self.session.active_pane())
    }

    pub fn results_for(&self, pane: Pane) -> &[MatchResult] {
        &self.views[pane.index()].results
    }

    /// Take every finished batch without blocking. Returns `true` if any of
    /// them was fresh.
    pub fn poll_results(&mut self) -> bool {
        self.sync();
        let mut fresh = false;
        for batch in self.worker.try_batches() {
            fresh |= self.deliver(batch);
        }
        fresh
    }

    /// Block until every pane has results for its current buffer, or until
    /// `timeout` passes. Returns `true` when settled.
    pub fn wait_for_results(&mut self, timeout: Duration) -> bool {
        self.sync();
        let deadline = Instant::now() + timeout;
        loop {
            for batch in self.worker.try_batches() {
                self.deliver(batch);
            }
            if self.settled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.worker.recv_timeout(deadline - now) {
                Some(batch) => {
                    self.deliver(batch);
                }
                None => return self.settled(),
            }
        }
    }

    /// Run the committed object/action pair.
    pub fn activate(&mut self) -> Result<ActivationOutcome> {
        let mut outcome = self.session.activate(self.follow_up())?;
        outcome.hide_window = self.settings.hide_after_run;
        self.run(&outcome);
        self.sync();
        Ok(outcome)
    }

    /// Activate the best-ranked applicable action bound to `key` for the
    /// committed object. An action that needs an indirect object nobody has
    /// supplied yet is committed and the IndirectObject pane opens instead.
    /// On failure the session is left as it was.
    pub fn activate_accelerator(&mut self, key: char) -> Result<KeyOutcome> {
        let object = self
            .session
            .committed_object()
            .ok_or(LauncherError::ActivationPreconditionUnmet(Unmet::NoObject))?;
        let actions = self.catalog.actions_for(&object);
        let action = self
            .ranker
            .resolve_accelerator(
                key,
                &actions,
                &self.accelerators,
                Some(object.type_tag.as_str()),
                Some(object.id.as_str()),
                Utc::now(),
            )
            .cloned()
            .ok_or(LauncherError::ActivationPreconditionUnmet(Unmet::NoAction))?;

        let saved = self.session.clone();
        let attempt = self.activate_with(action);
        if attempt.is_err() {
            self.session = saved;
        }
        self.sync();
        attempt
    }

    fn activate_with(&mut self, action: CatalogAction) -> Result<KeyOutcome> {
        if self.session.active_pane() != Pane::Action {
            self.session.select_pane(Pane::Action)?;
        }
        let action_id = action.id.clone();
        self.session.commit_action(action)?;
        match self.session.activate(self.follow_up()) {
            Ok(mut outcome) => {
                outcome.hide_window = self.settings.hide_after_run;
                self.run(&outcome);
                Ok(KeyOutcome::Activated(outcome))
            }
            Err(LauncherError::ActivationPreconditionUnmet(Unmet::NoIndirectObject)) => {
                tracing::debug!(action = %action_id, "accelerator waiting for indirect object");
                let state = self.session.select_pane(Pane::IndirectObject)?;
                Ok(KeyOutcome::AwaitingIndirect(state))
            }
            Err(e) => Err(e),
        }
    }

    /// Route a key combination. Accelerators (the configured modifier plus a
    /// printable key) go to [`Launcher::activate_accelerator`], bound
    /// triggers to [`Launcher::run_trigger`]. Returns `Ok(None)` when the
    /// hotkey means nothing here.
    pub fn handle_hotkey(&mut self, hotkey: &Hotkey) -> Result<Option<KeyOutcome>> {
        if self.triggers.get(hotkey).is_some() {
            return self.run_trigger(hotkey).map(|o| Some(KeyOutcome::Activated(o)));
        }
        match hotkey.accelerator(self.accelerator_modifier) {
            Some(key) => self.activate_accelerator(key).map(Some),
            None => Ok(None),
        }
    }

    /// Run the object/action pair bound to `hotkey` without touching the
    /// panes.
    pub fn run_trigger(&mut self, hotkey: &Hotkey) -> Result<ActivationOutcome> {
        let binding = self
            .triggers
            .get(hotkey)
            .cloned()
            .ok_or_else(|| LauncherError::UnknownTrigger(hotkey.to_string()))?;
        let object = self
            .catalog
            .object(&binding.object_id)
            .ok_or_else(|| LauncherError::UnknownCandidate(binding.object_id.clone(), Pane::Object))?;
        let action = self
            .catalog
            .actions_for(&object)
            .into_iter()
            .find(|a| a.id == binding.action_id)
            .ok_or_else(|| LauncherError::UnknownCandidate(binding.action_id.clone(), Pane::Action))?;
        if action.requires_indirect {
            return Err(LauncherError::ActivationPreconditionUnmet(Unmet::NoIndirectObject));
        }
        tracing::debug!(hotkey = %hotkey, object = %object.id, action = %action.id, "running trigger");
        let outcome = ActivationOutcome {
            object,
            action,
            indirect: None,
            hide_window: self.settings.hide_after_run,
        };
        self.run(&outcome);
        Ok(outcome)
    }

    fn follow_up(&self) -> FollowUp {
        if self.settings.reset_after_run {
            FollowUp::Reset
        } else {
            FollowUp::Retain
        }
    }

    /// Learn from `outcome` and hand it to the executor.
    fn run(&self, outcome: &ActivationOutcome) {
        let object = &outcome.object;
        if object.source_plugin_id != FREE_TEXT_SOURCE {
            self.learner.record_use(&object.id, None);
            self.learner.set_correlation(&outcome.action.id, &object.id);
        }
        self.learner
            .record_use(&outcome.action.id, Some(object.type_tag.as_str()));
        if let Some(indirect) = outcome.indirect.as_ref().filter(|o| o.source_plugin_id != FREE_TEXT_SOURCE) {
            self.learner
                .record_use(&indirect.id, Some(outcome.action.id.as_str()));
        }
        if let Err(e) = self.learner.save() {
            tracing::warn!(error = %e, "failed to save learning store");
        }
        if let Err(e) = self
            .executor
            .execute(object, &outcome.action, outcome.indirect.as_deref())
        {
            tracing::warn!(action = %outcome.action.id, object = %object.id, error = %e, "action failed");
        }
    }

    /// Candidate pool identity and learning context for `pane`, or `None`
    /// when the pane has nothing to rank.
    fn source(&self, pane: Pane, snapshot: &Snapshot) -> Option<PoolSource> {
        if self.session.mode(pane) == TextMode::FreeText {
            return None;
        }
        let version = snapshot.version();
        match pane {
            Pane::Object => Some(PoolSource {
                key: format!("objects:v{version}"),
                context: None,
                correlated: None,
            }),
            Pane::Action => {
                let object = self.session.committed_object()?;
                Some(PoolSource {
                    key: format!("actions:v{version}:{}", object.id),
                    context: Some(object.type_tag.as_str().to_string()),
                    correlated: Some(object.id.clone()),
                })
            }
            Pane::IndirectObject => {
                let action = self
                    .session
                    .committed_action()
                    .filter(|a| a.requires_indirect)?;
                Some(PoolSource {
                    key: format!("indirect:v{version}:{}", action.id),
                    context: Some(action.id.clone()),
                    correlated: None,
                })
            }
        }
    }

    fn pool(&self, pane: Pane, snapshot: &Snapshot) -> Option<CandidatePool> {
        match pane {
            Pane::Object => Some(CandidatePool::Objects(Arc::new(snapshot.objects().to_vec()))),
            Pane::Action => {
                let object = self.session.committed_object()?;
                Some(CandidatePool::Actions(Arc::new(self.catalog.actions_for(&object))))
            }
            Pane::IndirectObject => {
                let action = self.session.committed_action()?;
                Some(CandidatePool::Objects(Arc::new(
                    snapshot.objects_matching(|o| action.accepts_indirect(o)),
                )))
            }
        }
    }

    fn object_pool(&mut self, snapshot: &Snapshot) -> CandidatePool {
        match &self.object_pool {
            Some((version, pool)) if *version == snapshot.version() => {
                CandidatePool::Objects(Arc::clone(pool))
            }
            _ => {
                let pool = Arc::new(snapshot.objects().to_vec());
                self.object_pool = Some((snapshot.version(), Arc::clone(&pool)));
                CandidatePool::Objects(pool)
            }
        }
    }

    /// Submit rank jobs for every pane whose buffer or pool changed since
    /// its last job, and clear panes that have nothing to rank.
    fn sync(&mut self) {
        let snapshot = self.catalog.current_snapshot();
        for pane in PANES {
            let Some(source) = self.source(pane, &snapshot) else {
                self.views[pane.index()].clear();
                continue;
            };
            let generation = self.session.generation(pane);
            let view = &self.views[pane.index()];
            if view.dispatched.as_ref() == Some(&(generation, source.key.clone())) {
                continue;
            }
            let pool = match pane {
                Pane::Object => Some(self.object_pool(&snapshot)),
                _ => self.pool(pane, &snapshot),
            };
            let Some(pool) = pool else {
                self.views[pane.index()].clear();
                continue;
            };
            let ticket = QueryTicket {
                pane,
                generation,
                text: self.session.buffer(pane).to_string(),
            };
            let view = &mut self.views[pane.index()];
            if view.pool_key.as_deref() != Some(source.key.as_str()) {
                view.results.clear();
                view.pool_key = Some(source.key.clone());
            }
            view.dispatched = Some((generation, source.key.clone()));
            view.pending = Some(ticket.clone());
            let job = RankJob {
                ticket,
                pool_key: source.key,
                pool,
                context: source.context,
                correlated: source.correlated,
            };
            if let Err(job) = self.worker.submit(job) {
                tracing::warn!("rank worker unavailable; ranking inline");
                let batch = rank_once(&self.ranker, &job);
                self.deliver(batch);
            }
        }
    }

    fn deliver(&mut self, batch: RankedBatch) -> bool {
        match Delivery::classify(batch, &self.session) {
            Delivery::Fresh(batch) => {
                let view = &mut self.views[batch.ticket.pane.index()];
                if view.pending.as_ref() == Some(&batch.ticket) {
                    view.pending = None;
                }
                view.results = batch.results;
                true
            }
            Delivery::Stale(_) => false,
        }
    }

    fn settled(&self) -> bool {
        self.views.iter().all(|v| {
            v.pending
                .as_ref()
                .map_or(true, |t| !t.is_current(&self.session))
        })
    }
}
