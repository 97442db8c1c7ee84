use crate::learner::Learner;
use crate::matcher::{self, MatchedField};
use crate::objects::{CatalogAction, CatalogObject};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Anything the ranker can order: a stable id, a name and aliases.
pub trait Rankable {
    fn rank_id(&self) -> &str;
    fn rank_name(&self) -> &str;
    fn rank_aliases(&self) -> &[String];
}

impl Rankable for CatalogObject {
    fn rank_id(&self) -> &str {
        &self.id
    }

    fn rank_name(&self) -> &str {
        &self.display_name
    }

    fn rank_aliases(&self) -> &[String] {
        &self.aliases
    }
}

impl Rankable for CatalogAction {
    fn rank_id(&self) -> &str {
        &self.id
    }

    fn rank_name(&self) -> &str {
        &self.display_name
    }

    fn rank_aliases(&self) -> &[String] {
        &self.aliases
    }
}

impl<T: Rankable + ?Sized> Rankable for Arc<T> {
    fn rank_id(&self) -> &str {
        (**self).rank_id()
    }

    fn rank_name(&self) -> &str {
        (**self).rank_name()
    }

    fn rank_aliases(&self) -> &[String] {
        (**self).rank_aliases()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankConfig {
    pub match_weight: f64,
    pub learn_weight: f64,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            match_weight: 1.0,
            learn_weight: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub id: String,
    pub display_name: String,
    /// Matcher score; `0.0` when ranking an empty query.
    pub raw_score: f64,
    /// Affinity scaled by the learn weight.
    pub learned_bonus: f64,
    pub total: f64,
    pub position: usize,
    /// String that produced the match, `None` for an empty query.
    pub field: Option<MatchedField>,
    /// Char positions of the match within the matched string.
    pub highlight: Vec<usize>,
}

/// Combines matcher scores with learned affinity into a total order.
#[derive(Clone)]
pub struct Ranker {
    config: RankConfig,
    learner: Arc<Learner>,
}

impl Ranker {
    pub fn new(config: RankConfig, learner: Arc<Learner>) -> Self {
        Self { config, learner }
    }

    pub fn config(&self) -> &RankConfig {
        &self.config
    }

    pub fn learner(&self) -> &Arc<Learner> {
        &self.learner
    }

    /// Rank `candidates` for `query`.
    ///
    /// Candidates the query does not align with are left out. An empty query
    /// keeps every candidate and orders them by affinity alone.
    pub fn rank<T: Rankable>(
        &self,
        query: &str,
        candidates: &[T],
        context: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<MatchResult> {
        self.rank_iter(query, candidates.iter(), context, now)
    }

    pub fn rank_iter<'a, T, I>(
        &self,
        query: &str,
        candidates: I,
        context: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<MatchResult>
    where
        T: Rankable + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        self.rank_scored(query, candidates, context, None, now)
    }

    /// Rank actions offered for the object `correlated`. The action last
    /// used on that very object gets the correlation bonus on top of its
    /// affinity in `context`.
    pub fn rank_actions<'a, I>(
        &self,
        query: &str,
        actions: I,
        context: Option<&str>,
        correlated: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<MatchResult>
    where
        I: IntoIterator<Item = &'a CatalogAction>,
    {
        self.rank_scored(query, actions, context, correlated, now)
    }

    fn rank_scored<'a, T, I>(
        &self,
        query: &str,
        candidates: I,
        context: Option<&str>,
        correlated: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<MatchResult>
    where
        T: Rankable + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut scored: Vec<(usize, MatchResult)> = candidates
            .into_iter()
            .filter_map(|c| self.score_one(query, c, context, correlated, now))
            .map(|r| (r.display_name.chars().count(), r))
            .collect();
        scored.sort_by(|(la, a), (lb, b)| compare(a, *la, b, *lb));
        scored
            .into_iter()
            .enumerate()
            .map(|(position, (_, mut r))| {
                r.position = position;
                r
            })
            .collect()
    }

    fn score_one<T: Rankable>(
        &self,
        query: &str,
        candidate: &T,
        context: Option<&str>,
        correlated: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<MatchResult> {
        let (raw_score, field, highlight) = if query.is_empty() {
            (0.0, None, Vec::new())
        } else {
            let m = matcher::score(query, candidate.rank_name(), candidate.rank_aliases())?;
            (m.value, Some(m.field), m.positions)
        };
        let correlation = correlated.map_or(0.0, |object| {
            self.learner.correlation_bonus(candidate.rank_id(), object)
        });
        let learned_bonus = (self.learner.affinity(candidate.rank_id(), context, now) + correlation)
            * self.config.learn_weight;
        Some(MatchResult {
            id: candidate.rank_id().to_string(),
            display_name: candidate.rank_name().to_string(),
            raw_score,
            learned_bonus,
            total: raw_score * self.config.match_weight + learned_bonus,
            position: 0,
            field,
            highlight,
        })
    }

    /// Pick the action bound to accelerator `key` among `actions`.
    ///
    /// Every action whose effective accelerator equals `key` (ignoring case)
    /// is eligible; the one ranked highest by affinity (and correlation with
    /// `object`) wins, with the usual name-length and id tie-breaks.
    /// `actions` are expected to be already filtered for applicability.
    pub fn resolve_accelerator<'a>(
        &self,
        key: char,
        actions: &'a [CatalogAction],
        overrides: &HashMap<String, char>,
        context: Option<&str>,
        object: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<&'a CatalogAction> {
        let key = key.to_ascii_lowercase();
        let eligible: Vec<&CatalogAction> = actions
            .iter()
            .filter(|a| {
                effective_accelerator(a, overrides).map(|k| k.to_ascii_lowercase()) == Some(key)
            })
            .collect();
        let best = self.rank_actions("", eligible.iter().copied(), context, object, now);
        let winner = best.first()?;
        tracing::debug!(key = %key, action = %winner.id, eligible = eligible.len(), "resolved accelerator");
        eligible.into_iter().find(|a| a.id == winner.id)
    }
}

/// Accelerator for `action`, honouring user overrides keyed by action id.
pub fn effective_accelerator(action: &CatalogAction, overrides: &HashMap<String, char>) -> Option<char> {
    overrides.get(&action.id).copied().or(action.accelerator)
}

fn compare(a: &MatchResult, a_len: usize, b: &MatchResult, b_len: usize) -> Ordering {
    b.total
        .total_cmp(&a.total)
        .then(a_len.cmp(&b_len))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learner::LearnerConfig;
    use crate::objects::TypeTag;

    fn objects(names: &[(&str, &str)]) -> Vec<CatalogObject> {
        names
            .iter()
            .map(|(id, name)| CatalogObject::new(*id, *name, TypeTag::Application))
            .collect()
    }

    #[test]
    fn ties_break_by_name_length_then_id() {
        let ranker = Ranker::new(RankConfig::default(), Arc::new(Learner::new(LearnerConfig::default())));
        let objs = objects(&[("b", "abc"), ("a", "abc"), ("c", "ab")]);
        let ids: Vec<_> = ranker
            .rank("", &objs, None, Utc::now())
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn positions_follow_order() {
        let ranker = Ranker::new(RankConfig::default(), Arc::new(Learner::new(LearnerConfig::default())));
        let objs = objects(&[("1", "Terminal"), ("2", "Term"), ("3", "Text Editor")]);
        let res = ranker.rank("te", &objs, None, Utc::now());
        for (i, r) in res.iter().enumerate() {
            assert_eq!(r.position, i);
        }
        assert_eq!(res.len(), 3);
    }
}
