//! Reminder extraction (C9): "time to/schedule/renew ..." phrasing with
//! no attached date, as distinct from deadlines (which carry a due date).

use regex::Regex;

use crate::model::ReminderData;

pub struct ReminderPatterns {
    schedule: Regex,
    renew: Regex,
}

impl ReminderPatterns {
    pub fn new() -> Self {
        ReminderPatterns {
            schedule: Regex::new(r"(?i)(?:time to|schedule|book)\s+(?:a\s+)?(.+?)(?:\.|$)").unwrap(),
            renew: Regex::new(r"(?i)(?:renew|renewal)\s+(?:your\s+)?(.+?)(?:\.|$)").unwrap(),
        }
    }

    pub fn try_extract(&self, subject: &str, snippet: &str) -> Option<(ReminderData, f64)> {
        let text = format!("{subject}\n{snippet}");
        if let Some(c) = self.schedule.captures(&text) {
            return Some((
                ReminderData {
                    action: c[1].trim().to_string(),
                },
                0.7,
            ));
        }
        if let Some(c) = self.renew.captures(&text) {
            return Some((
                ReminderData {
                    action: format!("renew {}", c[1].trim()),
                },
                0.7,
            ));
        }
        None
    }
}

impl Default for ReminderPatterns {
    fn default() -> Self {
        Self::new()
    }
}
