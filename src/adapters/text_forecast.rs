//! Free-text forecast parsing.
//!
//! Picks the first line mentioning the marker and pulls every number in the
//! Kp domain (0-9) that appears after it. Anything unexpected yields an empty
//! sequence rather than an error.

use crate::domain::model::ForecastSequence;
use regex::Regex;
use std::sync::OnceLock;

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d+(?:\.\d+)?$")
            .unwrap_or_else(|e| panic!("invalid forecast number pattern: {}", e))
    })
}

/// Numeric tokens in [0, 9]. Fragments of dates or identifiers are not numbers.
pub fn extract_levels(line: &str) -> Vec<f64> {
    line.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .map(|token| token.trim_matches(|c: char| c == '(' || c == ')' || c == ':'))
        .filter(|token| number_pattern().is_match(token))
        .filter_map(|token| token.parse::<f64>().ok())
        .filter(|value| (0.0..=9.0).contains(value))
        .collect()
}

pub fn parse_forecast_text(body: &str, marker: &str) -> ForecastSequence {
    let marker_lower = marker.to_ascii_lowercase();
    let Some((line, offset)) = body.lines().find_map(|line| {
        line.to_ascii_lowercase()
            .find(&marker_lower)
            .map(|pos| (line, pos + marker_lower.len()))
    }) else {
        tracing::debug!("Forecast text has no line containing '{}'", marker);
        return ForecastSequence::empty();
    };

    let tail = line.get(offset..).unwrap_or("");
    let levels = extract_levels(tail);
    tracing::debug!("Parsed {} forecast values from text line", levels.len());

    ForecastSequence::from_levels(&levels).unwrap_or_default()
}
