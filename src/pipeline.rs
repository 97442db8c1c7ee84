//! Off-thread ranking.
//!
//! A single worker thread runs rank jobs in the order they were submitted.
//! Every job carries the [`QueryTicket`] it was computed for; the caller
//! compares tickets against the session when batches come back and drops
//! the stale ones. Jobs that are already superseded by a newer queued job for
//! the same pane are skipped without running.

use crate::objects::{CatalogAction, CatalogObject};
use crate::ranker::{MatchResult, Ranker};
use crate::session::{Pane, Session};
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Identifies the buffer state a ranking was computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTicket {
    pub pane: Pane,
    pub generation: u64,
    pub text: String,
}

impl QueryTicket {
    pub fn is_current(&self, session: &Session) -> bool {
        session.generation(self.pane) == self.generation
    }
}

/// Candidates for one ranking job.
#[derive(Clone)]
pub enum CandidatePool {
    Objects(Arc<Vec<Arc<CatalogObject>>>),
    Actions(Arc<Vec<CatalogAction>>),
}

impl CandidatePool {
    pub fn len(&self) -> usize {
        match self {
            CandidatePool::Objects(o) => o.len(),
            CandidatePool::Actions(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct RankJob {
    pub ticket: QueryTicket,
    /// Identifies the candidate pool (snapshot version plus pane filter), so
    /// narrowing can reuse earlier matches only against the same pool.
    pub pool_key: String,
    pub pool: CandidatePool,
    pub context: Option<String>,
    /// Object whose last-used action gets the correlation bonus; only set
    /// for action pools.
    pub correlated: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RankedBatch {
    pub ticket: QueryTicket,
    pub results: Vec<MatchResult>,
    pub elapsed: Duration,
}

/// Result of offering a batch to the session.
#[derive(Debug)]
pub enum Delivery {
    Fresh(RankedBatch),
    /// Computed for a buffer state that no longer exists.
    Stale(QueryTicket),
}

impl Delivery {
    pub fn classify(batch: RankedBatch, session: &Session) -> Self {
        if batch.ticket.is_current(session) {
            Delivery::Fresh(batch)
        } else {
            tracing::trace!(ticket = ?batch.ticket, "discarding stale computation");
            Delivery::Stale(batch.ticket)
        }
    }
}

/// Matches of the last completed query for a pane. A longer query with the
/// same prefix can only match a subset of these.
struct Narrowing {
    pool_key: String,
    context: Option<String>,
    text: String,
    matched: HashSet<String>,
}

impl Narrowing {
    fn applies(&self, job: &RankJob) -> bool {
        !self.text.is_empty()
            && self.pool_key == job.pool_key
            && self.context == job.context
            && job.ticket.text.starts_with(&self.text)
    }
}

pub struct QueryWorker {
    jobs: Option<Sender<RankJob>>,
    batches: Receiver<RankedBatch>,
    handle: Option<JoinHandle<()>>,
}

impl QueryWorker {
    pub fn spawn(ranker: Ranker, budget: Duration) -> Self {
        let (job_tx, job_rx) = channel::<RankJob>();
        let (batch_tx, batch_rx) = channel::<RankedBatch>();
        let handle = std::thread::Builder::new()
            .name("rank-worker".into())
            .spawn(move || run(ranker, budget, job_rx, batch_tx))
            .map_err(|e| tracing::error!("failed to spawn rank worker: {e}"))
            .ok();
        Self {
            jobs: Some(job_tx),
            batches: batch_rx,
            handle,
        }
    }

    /// Queue `job`. The job is handed back when the worker is gone.
    pub fn submit(&self, job: RankJob) -> Result<(), RankJob> {
        match &self.jobs {
            Some(tx) if self.handle.is_some() => tx.send(job).map_err(|e| e.0),
            _ => Err(job),
        }
    }

    /// Batches that finished since the last call, in completion order.
    pub fn try_batches(&self) -> Vec<RankedBatch> {
        self.batches.try_iter().collect()
    }

    /// Wait up to `timeout` for the next batch.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RankedBatch> {
        match self.batches.recv_timeout(timeout) {
            Ok(batch) => Some(batch),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for QueryWorker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(ranker: Ranker, budget: Duration, jobs: Receiver<RankJob>, batches: Sender<RankedBatch>) {
    let mut narrowing: HashMap<Pane, Narrowing> = HashMap::new();
    let mut queue: VecDeque<RankJob> = VecDeque::new();
    loop {
        if queue.is_empty() {
            match jobs.recv() {
                Ok(job) => queue.push_back(job),
                Err(_) => break,
            }
        }
        queue.extend(jobs.try_iter());
        let Some(job) = queue.pop_front() else {
            continue;
        };
        if queue.iter().any(|later| later.ticket.pane == job.ticket.pane) {
            tracing::trace!(ticket = ?job.ticket, "skipping superseded job");
            continue;
        }
        let batch = rank_job(&ranker, &job, narrowing.get(&job.ticket.pane));
        if batch.elapsed > budget {
            tracing::debug!(
                elapsed_ms = batch.elapsed.as_millis() as u64,
                candidates = job.pool.len(),
                "ranking exceeded interactive budget"
            );
        }
        narrowing.insert(
            job.ticket.pane,
            Narrowing {
                pool_key: job.pool_key.clone(),
                context: job.context.clone(),
                text: job.ticket.text.clone(),
                matched: batch.results.iter().map(|r| r.id.clone()).collect(),
            },
        );
        if batches.send(batch).is_err() {
            break;
        }
    }
    tracing::debug!("rank worker stopped");
}

/// Rank `job` synchronously against its whole pool.
pub fn rank_once(ranker: &Ranker, job: &RankJob) -> RankedBatch {
    rank_job(ranker, job, None)
}

/// Rank one job, restricted to the previous matches when the query only
/// grew since then.
fn rank_job(ranker: &Ranker, job: &RankJob, previous: Option<&Narrowing>) -> RankedBatch {
    let started = Instant::now();
    let now = Utc::now();
    let keep = previous.filter(|p| p.applies(job)).map(|p| &p.matched);
    let text = job.ticket.text.as_str();
    let context = job.context.as_deref();
    let correlated = job.correlated.as_deref();
    let results = match &job.pool {
        CandidatePool::Objects(objects) => ranker.rank_iter(
            text,
            objects
                .iter()
                .filter(|o| keep.map_or(true, |k| k.contains(&o.id))),
            context,
            now,
        ),
        CandidatePool::Actions(actions) => ranker.rank_actions(
            text,
            actions
                .iter()
                .filter(|a| keep.map_or(true, |k| k.contains(&a.id))),
            context,
            correlated,
            now,
        ),
    };
    RankedBatch {
        ticket: job.ticket.clone(),
        results,
        elapsed: started.elapsed(),
    }
}
