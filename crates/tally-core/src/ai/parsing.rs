//! JSON parsing helpers for language backend responses
//!
//! These functions extract JSON from model responses, which often include
//! extra text before/after the JSON payload.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};

use super::types::RawDateRange;

/// Find the first balanced JSON object in a response
fn extract_json(response: &str) -> Result<&str> {
    let response = response.trim();

    if let Some(start) = response.find('{') {
        let mut depth = 0;
        for (i, c) in response[start..].char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(&response[start..=start + i]);
                    }
                }
                _ => {}
            }
        }
    }

    Err(Error::InvalidData(format!(
        "No JSON found in model response | Raw: {}",
        truncate(response)
    )))
}

fn truncate(s: &str) -> String {
    if s.len() > 200 {
        format!("{}...", &s[..200])
    } else {
        s.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct DateRangeResponse {
    date_range: Option<RawDateRange>,
}

/// Parse a date-range extraction response
///
/// `Ok(None)` means the model explicitly reported no date in the query.
pub fn parse_date_range(response: &str) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
    let json_str = extract_json(response)?;
    let parsed: DateRangeResponse = serde_json::from_str(json_str)
        .map_err(|e| Error::InvalidData(format!("Invalid date range JSON: {} | Raw: {}", e, truncate(json_str))))?;

    let Some(range) = parsed.date_range else {
        return Ok(None);
    };

    let start = parse_model_date(&range.start)?;
    let end = parse_model_date(&range.end)?;
    Ok(Some((start, end)))
}

fn parse_model_date(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidData(format!("Invalid date from model: {} ({})", raw, e)))
}

#[derive(Debug, Deserialize)]
struct MerchantsResponse {
    merchants: Vec<String>,
}

/// Parse a merchant extraction response
pub fn parse_merchants(response: &str) -> Result<Vec<String>> {
    let json_str = extract_json(response)?;
    let parsed: MerchantsResponse = serde_json::from_str(json_str)
        .map_err(|e| Error::InvalidData(format!("Invalid merchants JSON: {} | Raw: {}", e, truncate(json_str))))?;
    Ok(parsed.merchants)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_range() {
        let response = r#"{"date_range": {"start": "2023-12-01", "end": "2023-12-31"}}"#;
        let (start, end) = parse_date_range(response).unwrap().unwrap();
        assert_eq!(start.to_rfc3339(), "2023-12-01T00:00:00+00:00");
        assert_eq!(end.date_naive().to_string(), "2023-12-31");
    }

    #[test]
    fn test_parse_date_range_null() {
        let response = r#"{"date_range": null}"#;
        assert!(parse_date_range(response).unwrap().is_none());
    }

    #[test]
    fn test_parse_date_range_with_surrounding_text() {
        let response = "Here you go:\n{\"date_range\": {\"start\": \"2024-01-01\", \"end\": \"2024-01-07\"}}\nDone!";
        assert!(parse_date_range(response).unwrap().is_some());
    }

    #[test]
    fn test_parse_merchants() {
        let response = r#"{"merchants": ["Walmart", "Target"]}"#;
        assert_eq!(parse_merchants(response).unwrap(), vec!["Walmart", "Target"]);
    }

    #[test]
    fn test_parse_merchants_empty() {
        let response = r#"{"merchants": []}"#;
        assert!(parse_merchants(response).unwrap().is_empty());
    }

    #[test]
    fn test_no_json_is_an_error() {
        assert!(parse_merchants("I don't know").is_err());
        assert!(parse_date_range("no idea").is_err());
    }
}
