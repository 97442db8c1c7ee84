use chrono::Utc;
use quick_launcher::learner::{Learner, LearnerConfig};
use quick_launcher::objects::{CatalogObject, TypeTag};
use quick_launcher::ranker::{RankConfig, Ranker};
use std::sync::Arc;

fn apps(names: &[&str]) -> Vec<CatalogObject> {
    names
        .iter()
        .map(|n| CatalogObject::new(n.to_lowercase().replace(' ', "-"), *n, TypeTag::Application))
        .collect()
}

fn ranker() -> Ranker {
    Ranker::new(
        RankConfig::default(),
        Arc::new(Learner::new(LearnerConfig::default())),
    )
}

fn names(ranker: &Ranker, query: &str, objects: &[CatalogObject]) -> Vec<String> {
    ranker
        .rank(query, objects, None, Utc::now())
        .into_iter()
        .map(|r| r.display_name)
        .collect()
}

#[test]
fn results_sorted_by_descending_total() {
    let ranker = ranker();
    let objects = apps(&["Terminal", "Text Editor", "Thunderbird", "Task Manager", "Tetris"]);
    let results = ranker.rank("te", &objects, None, Utc::now());
    assert!(!results.is_empty());
    for pair in results.windows(2) {
        assert!(pair[0].total >= pair[1].total);
    }
}

#[test]
fn non_aligning_candidates_never_appear() {
    let ranker = ranker();
    let objects = apps(&["Firefox", "Calculator", "Files"]);
    let found = names(&ranker, "fx", &objects);
    assert_eq!(found, vec!["Firefox"]);
    assert!(names(&ranker, "zzz", &objects).is_empty());
}

#[test]
fn narrowing_only_removes_candidates() {
    let ranker = ranker();
    let objects = apps(&[
        "Firefox",
        "File Manager",
        "Files",
        "Font Viewer",
        "Disk Usage",
        "Fish Shell",
    ]);
    let mut previous: Option<Vec<String>> = None;
    for query in ["f", "fi", "fil", "file", "files"] {
        let ids: Vec<String> = ranker
            .rank(query, &objects, None, Utc::now())
            .into_iter()
            .map(|r| r.id)
            .collect();
        if let Some(prev) = &previous {
            assert!(ids.iter().all(|id| prev.contains(id)), "{query} admitted new ids");
        }
        previous = Some(ids);
    }
}

#[test]
fn word_start_matches_rank_at_least_as_high() {
    let ranker = ranker();
    let objects = apps(&["Firefox", "File Manager", "Files"]);

    assert_eq!(names(&ranker, "f", &objects).len(), 3);

    let results = ranker.rank("fi", &objects, None, Utc::now());
    assert_eq!(results.len(), 3);
    let total = |name: &str| results.iter().find(|r| r.display_name == name).unwrap().total;
    assert!(total("File Manager") >= total("Firefox"));
    assert!(total("Files") >= total("Firefox"));
}

#[test]
fn repeated_use_promotes_firefox() {
    let learner = Arc::new(Learner::new(LearnerConfig::default()));
    let ranker = Ranker::new(RankConfig::default(), Arc::clone(&learner));
    let objects = apps(&["Firefox", "File Manager", "Files"]);
    assert_ne!(names(&ranker, "f", &objects)[0], "Firefox");

    for _ in 0..5 {
        learner.record_use("firefox", None);
    }
    assert_eq!(names(&ranker, "f", &objects)[0], "Firefox");
}

#[test]
fn exact_match_beats_heavy_usage() {
    let learner = Arc::new(Learner::new(LearnerConfig::default()));
    let ranker = Ranker::new(RankConfig::default(), Arc::clone(&learner));
    let objects = apps(&["Term", "Terminal"]);
    for _ in 0..50 {
        learner.record_use("terminal", None);
    }
    assert_eq!(names(&ranker, "term", &objects)[0], "Term");
}

#[test]
fn ranking_is_deterministic() {
    let ranker = ranker();
    let objects = apps(&["Alpha", "Alps", "Alpine", "Alpaca", "Apple"]);
    let first = ranker.rank("al", &objects, None, Utc::now());
    let second = ranker.rank("al", &objects, None, Utc::now());
    assert_eq!(first, second);
}

#[test]
fn alias_match_is_reported() {
    let ranker = ranker();
    let objects = vec![CatalogObject::new("browser", "Web Browser", TypeTag::Application)
        .with_aliases(["Firefox"])];
    let results = ranker.rank("ffx", &objects, None, Utc::now());
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].field,
        Some(quick_launcher::matcher::MatchedField::Alias(0))
    );
}

#[test]
fn empty_query_orders_by_affinity() {
    let learner = Arc::new(Learner::new(LearnerConfig::default()));
    let ranker = Ranker::new(RankConfig::default(), Arc::clone(&learner));
    let objects = apps(&["Zed", "Atom", "Vim"]);
    learner.record_use("vim", None);
    let results = ranker.rank("", &objects, None, Utc::now());
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].display_name, "Vim");
    assert_eq!(results[0].raw_score, 0.0);
    assert_eq!(results[1].display_name, "Zed");
}
