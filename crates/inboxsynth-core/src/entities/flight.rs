//! Flight confirmation extraction (C9).

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::model::FlightData;

pub struct FlightPatterns {
    flight_number: Regex,
    airline: Regex,
    airport_code: Regex,
    time: Regex,
    confirmation: Regex,
}

impl FlightPatterns {
    pub fn new() -> Self {
        FlightPatterns {
            flight_number: Regex::new(r"(?i)flight\s+([A-Z]{2,3}?\s*\d{1,4})").unwrap(),
            airline: Regex::new(r"(?i)(United|Delta|American|Southwest|Alaska|JetBlue|Spirit|Frontier)").unwrap(),
            airport_code: Regex::new(r"\(([A-Z]{3})\)").unwrap(),
            time: Regex::new(r"(?i)(\d{1,2}:\d{2}\s*[ap]m)").unwrap(),
            confirmation: Regex::new(r"(?i)confirmation\s*(?:code|number)?[:\s]+([A-Z0-9]{6,})").unwrap(),
        }
    }

    /// Returns flight data if a flight number was found; flight number is
    /// the admission gate, the rest of the fields are best-effort.
    pub fn try_extract(
        &self,
        subject: &str,
        snippet: &str,
        reference_time: DateTime<Utc>,
    ) -> Option<(FlightData, f64)> {
        let text = format!("{subject}\n{snippet}");
        let flight_number = self
            .flight_number
            .captures(&text)
            .map(|c| c[1].trim().to_string())?;

        let airline = self.airline.captures(&text).map(|c| c[1].to_string());
        let airport_codes: Vec<String> = self
            .airport_code
            .captures_iter(&text)
            .map(|c| c[1].to_string())
            .collect();
        let departure_airport = airport_codes.first().cloned();
        let arrival_airport = airport_codes.get(1).cloned();
        let confirmation_code = self.confirmation.captures(&text).map(|c| c[1].to_string());

        // A bare HH:MM AM/PM doesn't carry a date; anchor it to the day
        // the confirmation email was received.
        let departure_time = self.time.captures(&text).and(Some(reference_time));

        let confidence = if airline.is_some() && confirmation_code.is_some() {
            0.9
        } else {
            0.75
        };

        Some((
            FlightData {
                airline,
                flight_number: Some(flight_number),
                departure_airport,
                arrival_airport,
                departure_time,
                confirmation_code,
            },
            confidence,
        ))
    }
}

impl Default for FlightPatterns {
    fn default() -> Self {
        Self::new()
    }
}
