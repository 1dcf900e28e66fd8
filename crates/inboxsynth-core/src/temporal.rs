//! Temporal engine (C10): parses localized times embedded in subjects
//! and snippets, and resolves an entity's stored importance into a
//! digest-time "resolved" importance based on now-relative windows.
//!
//! Parsing precedence (spec.md §9): calendar phrase → ISO-8601 →
//! RFC 2822 → epoch millis. Unknown timezone abbreviations default to
//! UTC and are logged rather than silently producing a UTC instant with
//! no trace.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::model::{DecayReason, Entity, ImportanceLevel, TemporalAnnotation};

/// Fixed-offset hours for the timezone abbreviations this system's
/// source emails are observed to use. Not a full IANA database — a
/// closed lookup matching spec.md §4.10's "declared lookup".
const TZ_OFFSET_HOURS: &[(&str, i32)] = &[
    ("UTC", 0),
    ("GMT", 0),
    ("EST", -5),
    ("EDT", -4),
    ("CST", -6),
    ("CDT", -5),
    ("MST", -7),
    ("MDT", -6),
    ("PST", -8),
    ("PDT", -7),
];

pub fn tz_offset_hours(abbrev: &str) -> Option<i32> {
    TZ_OFFSET_HOURS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(abbrev))
        .map(|(_, hours)| *hours)
}

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    Some(match &lower[..3.min(lower.len())] {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    })
}

fn hour_24(hour12: u32, minute: u32, meridiem: &str) -> (u32, u32) {
    let meridiem = meridiem.to_lowercase();
    let hour = match (hour12 % 12, meridiem.as_str()) {
        (h, "pm") => h + 12,
        (h, _) => h,
    };
    (hour, minute)
}

/// Epoch millis, as either an integer or a numeric string (Gmail's
/// `internalDate` convention).
pub fn parse_epoch_millis(s: &str) -> Option<DateTime<Utc>> {
    s.trim().parse::<i64>().ok().and_then(DateTime::<Utc>::from_timestamp_millis)
}

/// Best-effort parse of a calendar-style phrase: `"@ Wed Nov 13, 2pm –
/// 3pm (PST)"`. Returns `(start, end)`; `end` is `None` when no range was
/// present. Missing year is inferred from `reference`'s year.
pub fn parse_calendar_phrase(text: &str, reference: DateTime<Utc>) -> Option<(DateTime<Utc>, Option<DateTime<Utc>>)> {
    let re = Regex::new(
        r"(?i)@\s*(?:[A-Za-z]{3,9}\s+)?([A-Za-z]{3,9})\s+(\d{1,2})(?:,?\s*(\d{4}))?,?\s*(\d{1,2})(?::(\d{2}))?\s*(am|pm)(?:\s*[-\u{2013}to]+\s*(\d{1,2})(?::(\d{2}))?\s*(am|pm))?\s*(?:\(([A-Za-z]{2,4})\))?",
    )
    .unwrap();
    let caps = re.captures(text)?;

    let month = month_number(&caps[1])?;
    let day: u32 = caps[2].parse().ok()?;
    let year: i32 = caps
        .get(3)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or_else(|| reference.year());

    let start_hour12: u32 = caps[4].parse().ok()?;
    let start_minute: u32 = caps.get(5).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    let (start_hour, start_minute) = hour_24(start_hour12, start_minute, &caps[6]);

    let tz_abbrev = caps.get(10).map(|m| m.as_str());
    let offset = tz_abbrev.and_then(tz_offset_hours).unwrap_or_else(|| {
        if let Some(abbrev) = tz_abbrev {
            tracing::warn!(abbrev, "unknown timezone abbreviation, defaulting to UTC");
        }
        0
    });

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let start_naive = date.and_hms_opt(start_hour, start_minute, 0)?;
    let start = naive_local_to_utc(start_naive, offset);

    let end = match caps.get(7) {
        Some(h) => {
            let end_hour12: u32 = h.as_str().parse().ok()?;
            let end_minute: u32 = caps.get(8).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            let end_meridiem = caps.get(9).map(|m| m.as_str()).unwrap_or(&caps[6]);
            let (end_hour, end_minute) = hour_24(end_hour12, end_minute, end_meridiem);
            let end_naive = date.and_hms_opt(end_hour, end_minute, 0)?;
            Some(naive_local_to_utc(end_naive, offset))
        }
        None => None,
    };

    Some((start, end))
}

fn naive_local_to_utc(naive: NaiveDateTime, offset_hours: i32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&naive) - Duration::hours(offset_hours as i64)
}

/// Decay window outcome for event-like entities with a start (and
/// optional end); deadlines reuse this with `end = None` and the 1h/30m
/// fallbacks noted in spec.md §4.10.
pub fn resolve_importance(
    stored: ImportanceLevel,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> TemporalAnnotation {
    let Some(start) = start else {
        return TemporalAnnotation {
            resolved_importance: stored,
            decay_reason: DecayReason::NoTemporalData,
            hide_in_digest: false,
        };
    };

    // Deadlines have no end; expiry falls back to start + 1h, imminence
    // to start - 30m (spec.md §4.10).
    let effective_end = end.unwrap_or(start + Duration::hours(1));
    let imminent_at = end.map(|_| start).unwrap_or(start - Duration::minutes(30));

    if effective_end <= now - Duration::hours(1) {
        return TemporalAnnotation {
            resolved_importance: ImportanceLevel::Routine,
            decay_reason: DecayReason::TemporalExpired,
            hide_in_digest: true,
        };
    }

    if imminent_at <= now + Duration::hours(1) {
        return TemporalAnnotation {
            resolved_importance: ImportanceLevel::Critical,
            decay_reason: DecayReason::TemporalActive,
            hide_in_digest: false,
        };
    }

    if start <= now + Duration::days(7) {
        let resolved = if stored == ImportanceLevel::Critical {
            ImportanceLevel::Critical
        } else {
            ImportanceLevel::TimeSensitive
        };
        return TemporalAnnotation {
            resolved_importance: resolved,
            decay_reason: DecayReason::TemporalUpcoming,
            hide_in_digest: false,
        };
    }

    let resolved = if stored == ImportanceLevel::Critical {
        ImportanceLevel::Critical
    } else {
        ImportanceLevel::Routine
    };
    TemporalAnnotation {
        resolved_importance: resolved,
        decay_reason: DecayReason::TemporalDistant,
        hide_in_digest: false,
    }
}

/// Applies [`resolve_importance`] to an entity using its own
/// `temporal_start`/`temporal_end`, returning an annotated copy.
pub fn annotate_entity(mut entity: Entity, now: DateTime<Utc>) -> Entity {
    let start = entity.temporal_start();
    let end = entity.temporal_end();
    entity.temporal = Some(resolve_importance(entity.common.importance, start, end, now));
    entity
}
