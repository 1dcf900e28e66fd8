//! The synthesized output of a batch (C11): an ordered, sectioned digest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Timeline sections, always emitted in this order even when empty
/// (spec.md §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Section {
    Critical,
    Today,
    ComingUp,
    WorthKnowing,
    EverythingElse,
}

impl Section {
    pub const ORDER: [Section; 5] = [
        Section::Critical,
        Section::Today,
        Section::ComingUp,
        Section::WorthKnowing,
        Section::EverythingElse,
    ];

    pub fn heading(&self) -> &'static str {
        match self {
            Section::Critical => "CRITICAL",
            Section::Today => "TODAY",
            Section::ComingUp => "COMING UP",
            Section::WorthKnowing => "WORTH KNOWING",
            Section::EverythingElse => "EVERYTHING ELSE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestItem {
    pub section: Section,
    /// Descending within a section; used purely for sort stability, not
    /// rendered.
    pub priority: f64,
    pub title: String,
    pub snippet: String,
    pub source_thread_id: String,
    pub gmail_thread_link: String,
    pub timestamp: DateTime<Utc>,
    pub source_email_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    pub items: Vec<DigestItem>,
    /// section_name -> count of routine/orphaned threads grouped there.
    pub noise_summary: BTreeMap<String, u32>,
    pub generated_ts: DateTime<Utc>,
}

impl Digest {
    /// Count of featured items per section, including zero for sections
    /// with no items — every labeled section must appear (spec.md §4.11).
    pub fn section_counts(&self) -> BTreeMap<Section, usize> {
        let mut counts: BTreeMap<Section, usize> =
            Section::ORDER.iter().map(|s| (*s, 0)).collect();
        for item in &self.items {
            *counts.entry(item.section).or_insert(0) += 1;
        }
        counts
    }
}
