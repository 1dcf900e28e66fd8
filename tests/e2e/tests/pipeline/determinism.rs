//! Determinism properties from spec.md §8: the same batch, run twice
//! against independent databases, must produce byte-identical digests,
//! and the parallel path must match the sequential one.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use inboxsynth_core::adapters::{CannedLlmAdapter, FixtureMailAdapter};
use inboxsynth_core::classification::cascade::Cascade;
use inboxsynth_core::classification::llm::LlmClassifier;
use inboxsynth_core::classification::type_mapper::TypeMapper;
use inboxsynth_core::pipeline::{NeverCancel, PipelineCoordinator};
use inboxsynth_core::telemetry::TracingSink;
use inboxsynth_core::{Config, Pool};

use inboxsynth_e2e_tests::mocks::fixtures::{EmailFixtureFactory, LlmResponseFixtures};

fn coordinator(pool: &Pool, llm_response: String) -> PipelineCoordinator<'_, CannedLlmAdapter> {
    let telemetry = Arc::new(TracingSink);
    let llm = LlmClassifier::new(
        CannedLlmAdapter { response: llm_response },
        Config::default(),
        telemetry.clone(),
    );
    let cascade = Cascade::new(pool, TypeMapper::load(None), llm);
    PipelineCoordinator::new(pool, cascade, Config::default(), telemetry)
}

fn mixed_batch(received: chrono::DateTime<Utc>) -> Vec<inboxsynth_core::model::RawMessage> {
    let mut messages = vec![
        EmailFixtureFactory::calendar_invite("cal-1", received),
        EmailFixtureFactory::bill_due("bill-1", received),
        EmailFixtureFactory::fraud_alert("fraud-1", received),
    ];
    messages.extend(EmailFixtureFactory::batch_of_newsletters(4, received));
    messages
}

/// Running the identical batch against two independent in-memory
/// databases produces the same section assignment and noise summary.
#[test]
fn same_batch_twice_yields_the_same_digest() {
    let received = Utc.with_ymd_and_hms(2025, 11, 1, 9, 0, 0).unwrap();
    let now = received + chrono::Duration::hours(2);

    let pool_a = Pool::open_in_memory().unwrap();
    let pool_b = Pool::open_in_memory().unwrap();
    let coord_a = coordinator(&pool_a, LlmResponseFixtures::routine_message());
    let coord_b = coordinator(&pool_b, LlmResponseFixtures::routine_message());

    let mail_a = FixtureMailAdapter::new(mixed_batch(received));
    let mail_b = FixtureMailAdapter::new(mixed_batch(received));

    let digest_a = coord_a.run_batch(&mail_a, "user-1", 10, now, false, &NeverCancel).unwrap();
    let digest_b = coord_b.run_batch(&mail_b, "user-1", 10, now, false, &NeverCancel).unwrap();

    assert_eq!(digest_a.noise_summary, digest_b.noise_summary);
    assert_eq!(digest_a.items.len(), digest_b.items.len());
    let sections_a: Vec<_> = digest_a.items.iter().map(|i| i.section).collect();
    let sections_b: Vec<_> = digest_b.items.iter().map(|i| i.section).collect();
    assert_eq!(sections_a, sections_b);
}

/// The parallel classify/extract stage reassembles in fetch order, so a
/// mixed batch produces the same digest whether or not `parallel` is set
/// (spec.md §5, rayon worker pool).
#[test]
fn parallel_run_matches_sequential_run_for_a_mixed_batch() {
    let received = Utc.with_ymd_and_hms(2025, 11, 1, 9, 0, 0).unwrap();
    let now = received + chrono::Duration::hours(2);

    let pool_seq = Pool::open_in_memory().unwrap();
    let pool_par = Pool::open_in_memory().unwrap();
    let coord_seq = coordinator(&pool_seq, LlmResponseFixtures::routine_message());
    let coord_par = coordinator(&pool_par, LlmResponseFixtures::routine_message());

    let mail_seq = FixtureMailAdapter::new(mixed_batch(received));
    let mail_par = FixtureMailAdapter::new(mixed_batch(received));

    let digest_seq = coord_seq
        .run_batch(&mail_seq, "user-1", 10, now, false, &NeverCancel)
        .unwrap();
    let digest_par = coord_par
        .run_batch(&mail_par, "user-1", 10, now, true, &NeverCancel)
        .unwrap();

    assert_eq!(digest_seq.noise_summary, digest_par.noise_summary);
    let titles_seq: Vec<_> = digest_seq.items.iter().map(|i| i.title.clone()).collect();
    let titles_par: Vec<_> = digest_par.items.iter().map(|i| i.title.clone()).collect();
    assert_eq!(titles_seq, titles_par);
}
