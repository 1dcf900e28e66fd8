//! Bill/payment/invoice deadline extraction (C9).

use chrono::{DateTime, Datelike, TimeZone, Utc};
use regex::Regex;

use crate::model::DeadlineData;
use crate::temporal::parse_calendar_phrase;

const MONTHS: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

pub struct DeadlinePatterns {
    bill_due: Regex,
    amount: Regex,
    due_date: Regex,
}

impl DeadlinePatterns {
    pub fn new() -> Self {
        DeadlinePatterns {
            bill_due: Regex::new(r"(?i)(bill|payment|invoice)\s+(?:is\s+)?due\s+(\w+)").unwrap(),
            amount: Regex::new(r"\$(\d+(?:,\d{3})*(?:\.\d{2})?)").unwrap(),
            due_date: Regex::new(r"(?i)due\s+(?:on\s+)?(\w+\s+\d+|\w+|tomorrow|today)").unwrap(),
        }
    }

    /// A bill/payment/invoice "due <phrase>" mention is the admission
    /// gate; the amount is best-effort. `due <Month> <day>` is resolved
    /// against `reference_time`'s year; a bare weekday/relative phrase
    /// falls back to end-of-day on the reference date plus one day.
    pub fn try_extract(
        &self,
        subject: &str,
        snippet: &str,
        reference_time: DateTime<Utc>,
    ) -> Option<(DeadlineData, f64)> {
        let text = format!("{subject}\n{snippet}");
        self.bill_due.captures(&text)?;

        let amount = self.amount.captures(&text).map(|c| format!("${}", &c[1]));
        let due_phrase = self.due_date.captures(&text).map(|c| c[1].to_string());

        let due_at = due_phrase
            .as_deref()
            .and_then(|p| resolve_due_phrase(p, reference_time))
            .unwrap_or(reference_time + chrono::Duration::days(1));

        let confidence = if amount.is_some() { 0.85 } else { 0.65 };

        Some((DeadlineData { due_at, amount }, confidence))
    }
}

fn resolve_due_phrase(phrase: &str, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = phrase.to_lowercase();
    if lower == "today" {
        return Some(reference);
    }
    if lower == "tomorrow" {
        return Some(reference + chrono::Duration::days(1));
    }
    // "@ Nov 15" reuses the calendar-phrase parser's month/day grammar by
    // wrapping the bare phrase in a minimal "@ <phrase> 12:00am" shell.
    if let Some((start, _)) = parse_calendar_phrase(&format!("@ {phrase} 12:00am"), reference) {
        return Some(start);
    }
    let mut parts = lower.split_whitespace();
    let month_name = parts.next()?;
    let day: u32 = parts.next()?.parse().ok()?;
    let month = MONTHS
        .iter()
        .position(|m| m.starts_with(&month_name[..3.min(month_name.len())]))? as u32
        + 1;
    let year = reference.year();
    let date = chrono::NaiveDate::from_ymd_opt(year, month, day)?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(9, 0, 0)?))
}

impl Default for DeadlinePatterns {
    fn default() -> Self {
        Self::new()
    }
}
