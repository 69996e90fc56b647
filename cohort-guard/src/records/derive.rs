//! Derived columns computed once per record after normalization.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::Record;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));
static DMY_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").expect("valid regex"));

/// Average month length in days used for program durations.
const DAYS_PER_MONTH: f64 = 30.4375;

/// Parses `YYYY-MM-DD` or `DD/MM/YYYY`. Anything else, including impossible
/// calendar dates, is `None`.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?.trim();
    if ISO_DATE.is_match(s) {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
    }
    let caps = DMY_DATE.captures(s)?;
    let day = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Maps yes/no-like tokens to `"Yes"` / `"No"`.
pub fn normalize_yes_no(value: &Value) -> Option<&'static str> {
    let token = match value {
        Value::String(s) => s.trim().to_lowercase(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    match token.as_str() {
        "yes" | "y" | "true" | "1" => Some("Yes"),
        "no" | "n" | "false" | "0" => Some("No"),
        _ => None,
    }
}

/// A Yes/No column derived from a free-form survey answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDerivation {
    /// Column holding the raw answer.
    pub source: String,
    /// Column receiving `"Yes"`, `"No"` or null.
    pub target: String,
}

impl FlagDerivation {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Which columns feed the derived intake, duration and flag fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivationConfig {
    pub start_field: String,
    pub finish_field: String,
    pub flags: Vec<FlagDerivation>,
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self {
            start_field: "startdate".to_string(),
            finish_field: "finishdate".to_string(),
            flags: vec![
                FlagDerivation::new(
                    "do_you_want_to_pay_more_than_50_upfront_fee",
                    "upfront_fee_preference",
                ),
                FlagDerivation::new(
                    "are_you_currently_or_planning_to_study_english_whilst_in_australia",
                    "study_english",
                ),
            ],
        }
    }
}

/// Adds `intake_year`, `intake_term`, `program_duration_months` and the
/// configured Yes/No flags. Unparseable inputs produce nulls.
pub fn derive_domain_fields(record: &mut Record, config: &DerivationConfig) {
    let start = record.get(&config.start_field).and_then(parse_date);
    let finish = record.get(&config.finish_field).and_then(parse_date);

    match start {
        Some(date) => {
            record.insert("intake_year", json!(date.year()));
            record.insert("intake_term", json!(format!("Q{}", date.month0() / 3 + 1)));
        }
        None => {
            record.insert("intake_year", Value::Null);
            record.insert("intake_term", Value::Null);
        }
    }

    let duration = match (start, finish) {
        (Some(start), Some(finish)) => {
            let months = (finish - start).num_days() as f64 / DAYS_PER_MONTH;
            json!(((months * 10.0).round() / 10.0).max(0.0))
        }
        _ => Value::Null,
    };
    record.insert("program_duration_months", duration);

    for flag in &config.flags {
        let value = record
            .get(&flag.source)
            .and_then(normalize_yes_no)
            .map_or(Value::Null, |v| json!(v));
        record.insert(flag.target.clone(), value);
    }
}

/// Outcome of the per-row sanity check applied at load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowCheck {
    Valid,
    Invalid(String),
}

impl RowCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, RowCheck::Valid)
    }
}

/// Rejects rows whose finish date precedes their start date.
pub fn validate_row(record: &Record, config: &DerivationConfig) -> RowCheck {
    let start = record.get(&config.start_field).and_then(parse_date);
    let finish = record.get(&config.finish_field).and_then(parse_date);
    match (start, finish) {
        (Some(s), Some(f)) if f < s => RowCheck::Invalid(format!(
            "{} before {}",
            config.finish_field, config.start_field
        )),
        _ => RowCheck::Valid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> Record {
        Record::from(value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(
            parse_date(&json!("2024-02-19")),
            NaiveDate::from_ymd_opt(2024, 2, 19)
        );
        assert_eq!(
            parse_date(&json!("19/02/2024")),
            NaiveDate::from_ymd_opt(2024, 2, 19)
        );
        assert_eq!(parse_date(&json!("31/02/2024")), None);
        assert_eq!(parse_date(&json!("Feb 19 2024")), None);
        assert_eq!(parse_date(&json!(20240219)), None);
    }

    #[test]
    fn test_intake_and_duration() {
        let mut rec = record(json!({"startdate": "2024-07-15", "finishdate": "2025-07-15"}));
        derive_domain_fields(&mut rec, &DerivationConfig::default());

        assert_eq!(rec.get("intake_year"), Some(&json!(2024)));
        assert_eq!(rec.get("intake_term"), Some(&json!("Q3")));
        assert_eq!(rec.number("program_duration_months"), Some(12.0));
    }

    #[test]
    fn test_missing_dates_produce_nulls() {
        let mut rec = record(json!({"startdate": "soon"}));
        derive_domain_fields(&mut rec, &DerivationConfig::default());

        assert_eq!(rec.get("intake_year"), Some(&Value::Null));
        assert_eq!(rec.get("intake_term"), Some(&Value::Null));
        assert_eq!(rec.get("program_duration_months"), Some(&Value::Null));
    }

    #[test]
    fn test_flag_normalization() {
        let mut rec = record(json!({
            "do_you_want_to_pay_more_than_50_upfront_fee": " YES ",
            "are_you_currently_or_planning_to_study_english_whilst_in_australia": "maybe"
        }));
        derive_domain_fields(&mut rec, &DerivationConfig::default());

        assert_eq!(rec.get("upfront_fee_preference"), Some(&json!("Yes")));
        assert_eq!(rec.get("study_english"), Some(&Value::Null));
    }

    #[test]
    fn test_normalize_yes_no_tokens() {
        assert_eq!(normalize_yes_no(&json!("n")), Some("No"));
        assert_eq!(normalize_yes_no(&json!(1)), Some("Yes"));
        assert_eq!(normalize_yes_no(&json!(false)), Some("No"));
        assert_eq!(normalize_yes_no(&json!("2")), None);
        assert_eq!(normalize_yes_no(&json!(null)), None);
    }

    #[test]
    fn test_validate_row() {
        let config = DerivationConfig::default();
        let ok = record(json!({"startdate": "01/02/2024", "finishdate": "2024-12-01"}));
        assert!(validate_row(&ok, &config).is_valid());

        let bad = record(json!({"startdate": "2024-12-01", "finishdate": "2024-01-01"}));
        assert_eq!(
            validate_row(&bad, &config),
            RowCheck::Invalid("finishdate before startdate".to_string())
        );

        let partial = record(json!({"startdate": "2024-12-01"}));
        assert!(validate_row(&partial, &config).is_valid());
    }
}
