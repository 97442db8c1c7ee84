//! Subsequence matcher for short, name-like strings.
//!
//! The query is aligned against the candidate as an in-order subsequence,
//! ignoring case. Among all alignments the matcher keeps the one that trades
//! off skipped characters against alignment points landing on word starts,
//! then turns the features of that alignment into a score in `(0, 1]`.
//! Exact full-string matches always score `1.0`; every other match scores
//! strictly below [`MAX_PARTIAL_SCORE`].

/// Value of one alignment point landing on a word start, measured in
/// skipped characters.
const WORD_START_BONUS: f64 = 3.0;

const CONTIGUITY_WEIGHT: f64 = 0.35;
const WORD_START_WEIGHT: f64 = 0.2;
const PREFIX_WEIGHT: f64 = 0.2;
const WORD_COVER_WEIGHT: f64 = 0.15;
const CONCISENESS_WEIGHT: f64 = 0.05;

/// Upper bound (exclusive) for any match that is not an exact match.
pub const MAX_PARTIAL_SCORE: f64 = CONTIGUITY_WEIGHT
    + WORD_START_WEIGHT
    + PREFIX_WEIGHT
    + WORD_COVER_WEIGHT
    + CONCISENESS_WEIGHT;

/// Which string of a candidate produced the best alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedField {
    Name,
    Alias(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchScore {
    pub value: f64,
    pub field: MatchedField,
    /// Char indices of the matched string that the query aligned to.
    pub positions: Vec<usize>,
}

/// Score `query` against a candidate's display name and aliases.
///
/// Returns `None` when the query is not an in-order subsequence of the name
/// or of any alias. The best-scoring string wins; on equal scores the name
/// is preferred, then the earlier alias.
pub fn score(query: &str, name: &str, aliases: &[String]) -> Option<MatchScore> {
    let mut best = score_text(query, name).map(|(value, positions)| MatchScore {
        value,
        field: MatchedField::Name,
        positions,
    });
    for (idx, alias) in aliases.iter().enumerate() {
        if let Some((value, positions)) = score_text(query, alias) {
            if best.as_ref().map_or(true, |b| value > b.value) {
                best = Some(MatchScore {
                    value,
                    field: MatchedField::Alias(idx),
                    positions,
                });
            }
        }
    }
    best
}

/// Score `query` against a single string.
///
/// An empty query trivially aligns with everything and scores `1.0`.
pub fn score_text(query: &str, candidate: &str) -> Option<(f64, Vec<usize>)> {
    let q: Vec<char> = query.chars().map(fold).collect();
    let c: Vec<char> = candidate.chars().map(fold).collect();
    if q.is_empty() {
        return Some((1.0, Vec::new()));
    }
    if q.len() > c.len() {
        return None;
    }
    if q == c {
        return Some((1.0, (0..c.len()).collect()));
    }

    let word_start: Vec<bool> = (0..c.len())
        .map(|j| j == 0 || is_separator(c[j - 1]))
        .collect();
    let positions = align(&q, &c, &word_start)?;
    Some((partial_score(&positions, &c, &word_start), positions))
}

/// Split `text` into runs of highlighted and plain chars for display.
pub fn highlight_segments(text: &str, positions: &[usize]) -> Vec<(String, bool)> {
    let mut segments: Vec<(String, bool)> = Vec::new();
    let mut next = positions.iter().peekable();
    for (idx, ch) in text.chars().enumerate() {
        let hit = next.peek().is_some_and(|&&p| p == idx);
        if hit {
            next.next();
        }
        match segments.last_mut() {
            Some((run, flag)) if *flag == hit => run.push(ch),
            _ => segments.push((ch.to_string(), hit)),
        }
    }
    segments
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == '-' || c == '_'
}

/// Find the alignment maximizing `WORD_START_BONUS * word_starts - gaps`.
///
/// `best[j]` holds the value of the best alignment of the query prefix that
/// ends with the current query char on `c[j]`. Ties keep the earliest
/// predecessor and the earliest end so the result is deterministic.
fn align(q: &[char], c: &[char], word_start: &[bool]) -> Option<Vec<usize>> {
    let n = c.len();
    let bonus = |j: usize| if word_start[j] { WORD_START_BONUS } else { 0.0 };

    let mut back = vec![vec![usize::MAX; n]; q.len()];
    let mut best: Vec<Option<f64>> = (0..n)
        .map(|j| (c[j] == q[0]).then(|| bonus(j)))
        .collect();

    for (i, &qc) in q.iter().enumerate().skip(1) {
        let mut next = vec![None; n];
        // max over k < j of best[k] + k, and the k reaching it
        let mut running: Option<(f64, usize)> = None;
        for j in 0..n {
            if c[j] == qc {
                if let Some((value, k)) = running {
                    next[j] = Some(value - j as f64 + 1.0 + bonus(j));
                    back[i][j] = k;
                }
            }
            if let Some(v) = best[j] {
                let candidate = v + j as f64;
                if running.map_or(true, |(r, _)| candidate > r) {
                    running = Some((candidate, j));
                }
            }
        }
        best = next;
    }

    let mut end: Option<(f64, usize)> = None;
    for (j, v) in best.iter().enumerate() {
        if let Some(v) = *v {
            if end.map_or(true, |(e, _)| v > e) {
                end = Some((v, j));
            }
        }
    }
    let (_, mut j) = end?;

    let mut positions = vec![0; q.len()];
    for i in (0..q.len()).rev() {
        positions[i] = j;
        if i > 0 {
            j = back[i][j];
        }
    }
    Some(positions)
}

fn partial_score(positions: &[usize], c: &[char], word_start: &[bool]) -> f64 {
    let m = positions.len() as f64;
    let first = positions[0];
    let last = positions[positions.len() - 1];

    let contiguity = m / (last - first + 1) as f64;
    let word_starts = positions.iter().filter(|&&p| word_start[p]).count() as f64 / m;
    let prefix = if first == 0 { 1.0 } else { 0.0 };

    // span of the words touched by the match
    let mut span_start = first;
    while !word_start[span_start] {
        span_start -= 1;
    }
    let mut span_end = last + 1;
    while span_end < c.len() && !is_separator(c[span_end]) {
        span_end += 1;
    }
    let cover = m / (span_end - span_start) as f64;
    let concise = m / c.len() as f64;

    CONTIGUITY_WEIGHT * contiguity
        + WORD_START_WEIGHT * word_starts
        + PREFIX_WEIGHT * prefix
        + WORD_COVER_WEIGHT * cover
        + CONCISENESS_WEIGHT * concise
}
