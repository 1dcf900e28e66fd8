//! Promotional offer extraction (C9): discount percentage, sale-window
//! phrasing, and merchant derived from the sender's domain.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::model::PromoData;
use crate::temporal::parse_calendar_phrase;

pub struct PromoPatterns {
    discount: Regex,
    ends: Regex,
    sale: Regex,
}

impl PromoPatterns {
    pub fn new() -> Self {
        PromoPatterns {
            discount: Regex::new(r"(?i)(\d+)%\s+off").unwrap(),
            ends: Regex::new(r"(?i)(?:ends?|expires?)\s+(\w+\s+\d+|\w+)").unwrap(),
            sale: Regex::new(r"(?i)(sale|deal|offer)").unwrap(),
        }
    }

    /// A discount percentage or sale/deal/offer phrase is the admission
    /// gate. Merchant is derived from the registrable domain of `from`.
    pub fn try_extract(
        &self,
        from: &str,
        subject: &str,
        snippet: &str,
        reference_time: DateTime<Utc>,
    ) -> Option<(PromoData, f64)> {
        let text = format!("{subject}\n{snippet}");
        let discount_percent = self.discount.captures(&text).and_then(|c| c[1].parse().ok());
        let has_sale_phrase = self.sale.is_match(&text);

        if discount_percent.is_none() && !has_sale_phrase {
            return None;
        }

        let offer = self.discount.find(&text).map(|m| m.as_str().to_string());
        let ends_phrase = self.ends.captures(&text).map(|c| c[1].to_string());
        let ends_at = ends_phrase
            .as_deref()
            .and_then(|p| parse_calendar_phrase(&format!("@ {p} 12:00am"), reference_time))
            .map(|(start, _)| start);
        let merchant = merchant_from_sender(from);

        let confidence = if discount_percent.is_some() { 0.8 } else { 0.6 };

        Some((
            PromoData {
                merchant,
                offer,
                discount_percent,
                ends_at,
            },
            confidence,
        ))
    }
}

fn merchant_from_sender(from: &str) -> Option<String> {
    let domain = from.split('@').nth(1)?;
    let label = domain.split('.').next()?;
    if label.is_empty() {
        return None;
    }
    let mut chars = label.chars();
    Some(match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => return None,
    })
}

impl Default for PromoPatterns {
    fn default() -> Self {
        Self::new()
    }
}
