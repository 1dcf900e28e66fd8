//! Temporal decay boundary behaviors (C10, spec.md §4.10/§8): the exact
//! edges of the imminent/upcoming/distant/expired windows, and the
//! calendar-phrase parser feeding them real start/end instants.

use chrono::{Duration, TimeZone, Utc};
use inboxsynth_core::model::{DecayReason, ImportanceLevel};
use inboxsynth_core::temporal::{parse_calendar_phrase, resolve_importance};

/// An event ending more than an hour ago is expired and hidden,
/// regardless of its stored importance.
#[test]
fn event_finished_over_an_hour_ago_expires_even_if_stored_critical() {
    let now = Utc::now();
    let annotation = resolve_importance(
        ImportanceLevel::Critical,
        Some(now - Duration::hours(3)),
        Some(now - Duration::hours(2)),
        now,
    );
    assert_eq!(annotation.decay_reason, DecayReason::TemporalExpired);
    assert_eq!(annotation.resolved_importance, ImportanceLevel::Routine);
    assert!(annotation.hide_in_digest);
}

/// An event ending exactly one hour ago has just expired: the expiry
/// boundary is closed on the upper side (spec.md §8: "Event with
/// `temporal_end - now = -1h` exactly -> routine + hidden").
#[test]
fn event_ending_exactly_one_hour_ago_has_expired() {
    let now = Utc::now();
    let annotation = resolve_importance(
        ImportanceLevel::Routine,
        Some(now - Duration::hours(2)),
        Some(now - Duration::hours(1)),
        now,
    );
    assert_eq!(annotation.decay_reason, DecayReason::TemporalExpired);
    assert!(annotation.hide_in_digest);
}

/// A deadline with no end uses start - 30m as its imminence threshold
/// and start + 1h as its expiry threshold (spec.md §4.10).
#[test]
fn deadline_with_no_end_uses_the_thirty_minute_imminence_fallback() {
    let now = Utc::now();
    // 20 minutes before the deadline: within the 30m imminence window.
    let annotation = resolve_importance(ImportanceLevel::Routine, Some(now + Duration::minutes(20)), None, now);
    assert_eq!(annotation.decay_reason, DecayReason::TemporalActive);
    assert_eq!(annotation.resolved_importance, ImportanceLevel::Critical);
}

/// The same deadline, more than an hour past its nominal time (the 1h
/// fallback expiry), is expired.
#[test]
fn deadline_with_no_end_expires_one_hour_after_its_nominal_time() {
    let now = Utc::now();
    let annotation = resolve_importance(ImportanceLevel::Routine, Some(now - Duration::hours(2)), None, now);
    assert_eq!(annotation.decay_reason, DecayReason::TemporalExpired);
}

/// An event starting in exactly 7 days is still "upcoming"; one second
/// past that boundary falls to "distant".
#[test]
fn seven_day_upcoming_boundary_is_closed_on_the_near_side() {
    let now = Utc::now();
    let at_boundary = resolve_importance(
        ImportanceLevel::Routine,
        Some(now + Duration::days(7)),
        Some(now + Duration::days(7) + Duration::hours(1)),
        now,
    );
    assert_eq!(at_boundary.decay_reason, DecayReason::TemporalUpcoming);
    assert_eq!(at_boundary.resolved_importance, ImportanceLevel::TimeSensitive);

    let past_boundary = resolve_importance(
        ImportanceLevel::Routine,
        Some(now + Duration::days(7) + Duration::seconds(1)),
        Some(now + Duration::days(7) + Duration::hours(2)),
        now,
    );
    assert_eq!(past_boundary.decay_reason, DecayReason::TemporalDistant);
    assert_eq!(past_boundary.resolved_importance, ImportanceLevel::Routine);
}

/// A distant entity that was stored as critical keeps its critical
/// importance through decay; a routine one is downgraded to routine,
/// never upgraded (spec.md §4.10, "critical never decays below itself").
#[test]
fn distant_decay_never_upgrades_a_routine_entity_to_critical() {
    let now = Utc::now();
    let routine = resolve_importance(ImportanceLevel::Routine, Some(now + Duration::days(60)), None, now);
    assert_eq!(routine.resolved_importance, ImportanceLevel::Routine);

    let critical = resolve_importance(ImportanceLevel::Critical, Some(now + Duration::days(60)), None, now);
    assert_eq!(critical.resolved_importance, ImportanceLevel::Critical);
}

/// An entity with no temporal data at all passes its stored importance
/// through unchanged and is never hidden by decay.
#[test]
fn no_start_time_is_a_pure_passthrough() {
    let now = Utc::now();
    let annotation = resolve_importance(ImportanceLevel::TimeSensitive, None, None, now);
    assert_eq!(annotation.decay_reason, DecayReason::NoTemporalData);
    assert_eq!(annotation.resolved_importance, ImportanceLevel::TimeSensitive);
    assert!(!annotation.hide_in_digest);
}

/// The calendar-phrase parser resolves an unabbreviated timezone-free
/// phrase's missing year from the reference date, and an unrecognized
/// timezone abbreviation defaults to UTC rather than failing the parse.
#[test]
fn calendar_phrase_infers_year_and_defaults_unknown_timezone_to_utc() {
    let reference = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
    let (start, end) = parse_calendar_phrase("Reminder @ Apr 2, 10am - 11am (XYZ)", reference).unwrap();
    assert_eq!(start.to_string().starts_with("2026-04-02 10:00"), true);
    assert_eq!(end.unwrap().to_string().starts_with("2026-04-02 11:00"), true);
}

/// A phrase with no recognizable calendar fragment at all yields no
/// match rather than a spurious instant.
#[test]
fn non_calendar_text_does_not_produce_a_false_match() {
    let reference = Utc::now();
    assert!(parse_calendar_phrase("Just checking in, no rush.", reference).is_none());
}
