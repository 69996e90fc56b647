//! Enrollment-shaped fixtures for tests and benchmarks.
//!
//! Values cycle with co-prime periods so that no two columns besides the
//! course code/name pair (and the identifiers and derived dates) encode the
//! same attribute.

use serde_json::{json, Value};

use crate::records::derive::{derive_domain_fields, DerivationConfig};
use crate::records::{HeaderAliases, RawRow, Record};

const NATIONALITIES: &[&str] = &["Indian", "Chinese", "Nepalese", "Vietnamese"];
const CAMPUSES: &[&str] = &["Sydney", "Melbourne", "Brisbane"];
const COURSES: &[(&str, &str)] = &[
    ("BUS101", "Bachelor of Business"),
    ("IT200", "Diploma of Information Technology"),
    ("NUR300", "Bachelor of Nursing"),
];
const START_DATES: &[(&str, &str)] = &[
    ("2024-02-19", "2025-02-18"),
    ("15/07/2024", "15/07/2026"),
    ("2025-02-17", "2026-08-17"),
];
const FEE_ANSWERS: &[&str] = &["Yes", "no", "Not sure"];

/// One raw API row with the dashboard's friendly headers.
pub fn enrollment_raw_row(i: usize) -> RawRow {
    let (course_id, course_name) = COURSES[(i / 2) % COURSES.len()];
    let (start, finish) = START_DATES[(i / 3) % START_DATES.len()];
    let value = json!({
        "StudentId": format!("S{}", 1000 + i),
        "FirstName": format!("Student{i}"),
        "Age": 18 + (i % 5) * 3,
        "Nationality": NATIONALITIES[i % NATIONALITIES.len()],
        "Campus_Name": CAMPUSES[i % CAMPUSES.len()],
        "Visa Status": if (i / 3) % 2 == 0 { "Student" } else { "Graduate" },
        "CourseId": course_id,
        "CourseName": course_name,
        "CourseAttempt": 1 + (i / 4) % 3,
        "StartDate": start,
        "FinishDate": finish,
        "Do you want to pay more than 50% upfront fee?": FEE_ANSWERS[i % FEE_ANSWERS.len()],
        "Are you currently or planning to study English whilst in Australia?":
            if (i / 2) % 2 == 0 { "Yes" } else { "No" },
    });
    match value {
        Value::Object(map) => map,
        _ => RawRow::new(),
    }
}

/// `n` raw rows.
pub fn enrollment_raw_rows(n: usize) -> Vec<RawRow> {
    (0..n).map(enrollment_raw_row).collect()
}

/// Normalizes and derives raw rows with the default configuration.
pub fn normalize_rows(raw: &[RawRow]) -> Vec<Record> {
    let headers = HeaderAliases::default();
    let derivation = DerivationConfig::default();
    raw.iter()
        .map(|row| {
            let mut record = headers.normalize_row(row);
            derive_domain_fields(&mut record, &derivation);
            record
        })
        .collect()
}

/// 24 normalized enrollment records.
pub fn enrollment_records() -> Vec<Record> {
    normalize_rows(&enrollment_raw_rows(24))
}

/// Records from literal JSON objects, without normalization.
pub fn records(values: Vec<Value>) -> Vec<Record> {
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(map) => Some(Record::from(map)),
            _ => None,
        })
        .collect()
}

/// Records whose `key` column cycles through `categories` distinct values.
pub fn categorical_records(key: &str, categories: usize, rows: usize) -> Vec<Record> {
    (0..rows)
        .map(|i| {
            let mut record = Record::new();
            record.insert(key, json!(format!("C{}", i % categories.max(1))));
            record.insert("age", json!(20 + i % 7));
            record
        })
        .collect()
}
