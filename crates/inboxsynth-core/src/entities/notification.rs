//! Notification extraction (C9): category classification plus
//! structured fields (OTP expiry, shipping status, tracking number),
//! recovered verbatim from `extractor_patterns.py`'s phrase catalogues.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::model::{NotificationCategory, NotificationData, ShipStatus};

const FRAUD_WORDS: &[&str] = &["fraud", "suspicious", "unauthorized", "flagged"];
const DELIVERY_WORDS: &[&str] = &[
    "delivered", "delivery", "package", "shipped", "arriving", "on the way", "order", "shipment",
];
const BILL_WORDS: &[&str] = &["bill", "payment", "due"];
const JOB_WORDS: &[&str] = &["opportunity", "job", "hiring", "position", "manager", "engineer", "apply"];
const CLAIM_WORDS: &[&str] = &["claim", "insurance", "medical", "policy"];
const RESERVATION_WORDS: &[&str] = &["rental", "reservation", "booking", "extend", "return"];

/// Determines notification category from email content. Returns `None`
/// if nothing matches and the caller's classified type isn't already
/// `notification` (spec.md §4.9).
pub fn categorize_notification(text_lower: &str, is_notification_type: bool) -> Option<NotificationCategory> {
    if FRAUD_WORDS.iter().any(|w| text_lower.contains(w)) {
        return Some(NotificationCategory::FraudAlert);
    }
    if DELIVERY_WORDS.iter().any(|w| text_lower.contains(w)) {
        return Some(NotificationCategory::Delivery);
    }
    if BILL_WORDS.iter().any(|w| text_lower.contains(w)) {
        return Some(NotificationCategory::Bill);
    }
    if JOB_WORDS.iter().any(|w| text_lower.contains(w)) {
        return Some(NotificationCategory::JobOpportunity);
    }
    if CLAIM_WORDS.iter().any(|w| text_lower.contains(w)) {
        return Some(NotificationCategory::Claim);
    }
    if RESERVATION_WORDS.iter().any(|w| text_lower.contains(w)) {
        return Some(NotificationCategory::Reservation);
    }
    if is_notification_type {
        return Some(NotificationCategory::General);
    }
    None
}

pub struct NotificationPatterns {
    otp_trigger: Regex,
    otp_expiry: Regex,
    tracking: Regex,
}

impl NotificationPatterns {
    pub fn new() -> Self {
        NotificationPatterns {
            otp_trigger: Regex::new(r"(?i)otp|verification code|security code|one-time").unwrap(),
            otp_expiry: Regex::new(r"(?i)(?:expires?|valid)\s+(?:in\s+)?(\d+)\s+(minute|hour)s?").unwrap(),
            tracking: Regex::new(r"(?i)(?:tracking|track)\s*(?:number|#)?\s*[:\-]?\s*([A-Z0-9]{10,30})").unwrap(),
        }
    }

    fn extract_otp_expiry(&self, text_lower: &str, reference_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.otp_trigger.is_match(text_lower) {
            return None;
        }
        let c = self.otp_expiry.captures(text_lower)?;
        let duration: i64 = c[1].parse().ok()?;
        Some(match &c[2] {
            "minute" => reference_time + Duration::minutes(duration),
            _ => reference_time + Duration::hours(duration),
        })
    }

    fn extract_shipping_info(&self, text_lower: &str, text: &str) -> (Option<ShipStatus>, Option<String>) {
        let ship_status = if ["out for delivery", "arriving today", "deliver today"]
            .iter()
            .any(|w| text_lower.contains(w))
        {
            Some(ShipStatus::OutForDelivery)
        } else if text_lower.contains("delivered") {
            Some(ShipStatus::Delivered)
        } else if ["shipped", "on the way", "in transit"].iter().any(|w| text_lower.contains(w)) {
            Some(ShipStatus::InTransit)
        } else if text_lower.contains("processing") {
            Some(ShipStatus::Processing)
        } else {
            None
        };
        let tracking_number = self.tracking.captures(text).map(|c| c[1].to_string());
        (ship_status, tracking_number)
    }

    /// Requires a non-`None` [`categorize_notification`] result; every
    /// other field is best-effort on top of that.
    pub fn try_extract(
        &self,
        subject: &str,
        snippet: &str,
        reference_time: DateTime<Utc>,
        is_notification_type: bool,
    ) -> Option<(NotificationData, f64)> {
        let text = format!("{subject}\n{snippet}");
        let text_lower = text.to_lowercase();
        let category = categorize_notification(&text_lower, is_notification_type)?;

        let otp_expires_at = self.extract_otp_expiry(&text_lower, reference_time);
        let (ship_status, tracking_number) = self.extract_shipping_info(&text_lower, &text);

        let confidence = match category {
            NotificationCategory::FraudAlert => 0.9,
            NotificationCategory::Delivery if ship_status.is_some() => 0.85,
            _ => 0.7,
        };

        Some((
            NotificationData {
                category,
                otp_expires_at,
                ship_status,
                tracking_number,
            },
            confidence,
        ))
    }
}

impl Default for NotificationPatterns {
    fn default() -> Self {
        Self::new()
    }
}
