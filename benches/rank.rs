use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};
use quick_launcher::learner::{Learner, LearnerConfig};
use quick_launcher::objects::{CatalogObject, TypeTag};
use quick_launcher::ranker::{RankConfig, Ranker};
use std::sync::Arc;

fn bench_rank(c: &mut Criterion) {
    let objects: Vec<CatalogObject> = (0..10_000)
        .map(|i| CatalogObject::new(format!("item-{i}"), format!("Item {i}"), TypeTag::Application))
        .collect();
    let learner = Arc::new(Learner::new(LearnerConfig::default()));
    for i in (0..10_000).step_by(7) {
        learner.record_use(&format!("item-{i}"), None);
    }
    let ranker = Ranker::new(RankConfig::default(), learner);
    c.bench_function("rank_10k", |b| {
        b.iter(|| ranker.rank("item 9999", &objects, None, Utc::now()))
    });
    c.bench_function("rank_10k_short_query", |b| {
        b.iter(|| ranker.rank("i9", &objects, None, Utc::now()))
    });
}

criterion_group!(benches, bench_rank);
criterion_main!(benches);
