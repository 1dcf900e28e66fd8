//! Idempotency and dedup (C1/C12, spec.md §9 open question): exact
//! duplicates within a batch collapse to one digest entry; messages that
//! only share a `message_id` but differ in body are distinct; dedup
//! state does not persist across separate `run_batch` calls.

use std::sync::Arc;

use chrono::Utc;
use inboxsynth_core::adapters::{CannedLlmAdapter, FixtureMailAdapter};
use inboxsynth_core::classification::cascade::Cascade;
use inboxsynth_core::classification::llm::LlmClassifier;
use inboxsynth_core::classification::type_mapper::TypeMapper;
use inboxsynth_core::pipeline::{NeverCancel, PipelineCoordinator};
use inboxsynth_core::telemetry::TracingSink;
use inboxsynth_core::{Config, Pool};

use inboxsynth_e2e_tests::mocks::fixtures::{EmailFixtureFactory, LlmResponseFixtures};

fn coordinator(pool: &Pool) -> PipelineCoordinator<'_, CannedLlmAdapter> {
    let telemetry = Arc::new(TracingSink);
    let llm = LlmClassifier::new(
        CannedLlmAdapter { response: LlmResponseFixtures::routine_message() },
        Config::default(),
        telemetry.clone(),
    );
    let cascade = Cascade::new(pool, TypeMapper::load(None), llm);
    PipelineCoordinator::new(pool, cascade, Config::default(), telemetry)
}

/// An exact repeat of the same message (same id, timestamp, and body)
/// fetched twice in one batch is counted only once.
#[test]
fn exact_duplicate_within_a_batch_counts_once() {
    let pool = Pool::open_in_memory().unwrap();
    let received = Utc::now();
    let raw = EmailFixtureFactory::newsletter("nl-dup", received);
    let mail = FixtureMailAdapter::new(vec![raw.clone(), raw]);
    let coordinator = coordinator(&pool);

    let digest = coordinator
        .run_batch(&mail, "user-1", 10, received + chrono::Duration::hours(1), false, &NeverCancel)
        .unwrap();

    let total: u32 = digest.noise_summary.values().sum();
    assert_eq!(total, 1);
}

/// Two messages sharing a `message_id` but with different bodies (e.g. a
/// provider resending an edited draft) are not collapsed: the
/// idempotency key is derived from `(message_id, received_ts, body)`,
/// not `message_id` alone.
#[test]
fn same_message_id_with_a_different_body_is_not_deduped() {
    let pool = Pool::open_in_memory().unwrap();
    let received = Utc::now();
    let first = EmailFixtureFactory::raw(
        "shared-id",
        "digest@newsletter.example.com",
        "This Week in Rust Tooling",
        "First draft of this week's links.",
        received,
    );
    let second = EmailFixtureFactory::raw(
        "shared-id",
        "digest@newsletter.example.com",
        "This Week in Rust Tooling",
        "Revised draft of this week's links.",
        received,
    );
    let mail = FixtureMailAdapter::new(vec![first, second]);
    let coordinator = coordinator(&pool);

    let digest = coordinator
        .run_batch(&mail, "user-1", 10, received + chrono::Duration::hours(1), false, &NeverCancel)
        .unwrap();

    let total: u32 = digest.noise_summary.values().sum();
    assert_eq!(total, 2);
}

/// Dedup is scoped to a single `run_batch` call: fetching the same
/// message again in a later, independent batch against the same pool is
/// not suppressed (cross-batch dedup is explicitly left to the mail
/// provider adapter's own fetch cursor, spec.md §9).
#[test]
fn dedup_does_not_persist_across_separate_batches() {
    let pool = Pool::open_in_memory().unwrap();
    let received = Utc::now();
    let raw = EmailFixtureFactory::newsletter("nl-repeat", received);
    let coordinator = coordinator(&pool);
    let now = received + chrono::Duration::hours(1);

    let mail_one = FixtureMailAdapter::new(vec![raw.clone()]);
    let digest_one = coordinator.run_batch(&mail_one, "user-1", 10, now, false, &NeverCancel).unwrap();
    assert_eq!(digest_one.noise_summary.values().sum::<u32>(), 1);

    let mail_two = FixtureMailAdapter::new(vec![raw]);
    let digest_two = coordinator.run_batch(&mail_two, "user-1", 10, now, false, &NeverCancel).unwrap();
    assert_eq!(digest_two.noise_summary.values().sum::<u32>(), 1);
}
