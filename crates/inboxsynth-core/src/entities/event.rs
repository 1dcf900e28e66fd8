//! Calendar event extraction (C9).

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::model::EventData;
use crate::temporal::parse_calendar_phrase;

const PREFIXES: &[&str] = &[
    "notification:",
    "updated invitation:",
    "accepted:",
    "declined:",
    "canceled:",
    "cancelled:",
];

pub struct EventPatterns {
    starts_soon: Regex,
    location_in: Regex,
    location_at: Regex,
}

impl EventPatterns {
    pub fn new() -> Self {
        EventPatterns {
            starts_soon: Regex::new(r"(?i)(?:starts?|begins?|coming up)\s+(?:in\s+)?(\d+\s+days?|tomorrow|today)").unwrap(),
            location_in: Regex::new(r"\bin\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)").unwrap(),
            location_at: Regex::new(r"\bat\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)?)").unwrap(),
        }
    }

    /// Requires a recognized calendar subject prefix (or a "starts in N"
    /// phrase) plus a parseable `@ <date> <time>(-<time>) (<tz>)` span;
    /// the subject prefix alone is not enough to admit an entity.
    pub fn try_extract(
        &self,
        subject: &str,
        snippet: &str,
        reference_time: DateTime<Utc>,
    ) -> Option<(EventData, f64)> {
        let subject_lower = subject.to_lowercase();
        let has_calendar_prefix = PREFIXES.iter().any(|p| subject_lower.starts_with(p));

        let text = format!("{subject}\n{snippet}");
        let (start, end) = parse_calendar_phrase(&text, reference_time).or_else(|| {
            self.starts_soon.captures(&text).map(|c| {
                let phrase = c[1].to_lowercase();
                let offset = if phrase.contains("tomorrow") {
                    Duration::days(1)
                } else if phrase.contains("today") {
                    Duration::hours(1)
                } else {
                    let days: i64 = phrase
                        .split_whitespace()
                        .next()
                        .and_then(|n| n.parse().ok())
                        .unwrap_or(1);
                    Duration::days(days)
                };
                (reference_time + offset, None)
            })
        })?;

        let location = self
            .location_at
            .captures(&text)
            .or_else(|| self.location_in.captures(&text))
            .map(|c| c[1].to_string());

        let confidence = if has_calendar_prefix { 0.9 } else { 0.7 };

        Some((EventData { start, end, location }, confidence))
    }
}

impl Default for EventPatterns {
    fn default() -> Self {
        Self::new()
    }
}
