//! Shared row builders for the integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};

pub const NATIONALITIES: &[&str] = &["Indian", "Chinese", "Nepalese", "Vietnamese"];
pub const CAMPUSES: &[(&str, u32)] = &[("Sydney", 110), ("Melbourne", 220), ("Brisbane", 330)];
const START_DATES: &[&str] = &["2024-02-19", "2024-07-15", "2025-02-17"];

/// `n` API-shaped enrollment rows. Campus name and campus code encode the
/// same attribute; the remaining columns cycle independently.
pub fn enrollment_rows(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            let (campus, code) = CAMPUSES[i % CAMPUSES.len()];
            json!({
                "StudentId": format!("S{}", 2000 + i),
                "Nationality": NATIONALITIES[i % NATIONALITIES.len()],
                "Campus_Name": campus,
                "Campus_Code": code,
                "Age": 18 + (i % 5) * 3,
                "Visa Status": if (i / 2) % 2 == 0 { "Student" } else { "Graduate" },
                "StartDate": START_DATES[(i / 3) % START_DATES.len()],
            })
        })
        .collect()
}

/// `rows` rows whose `Study Reason` takes `categories` distinct values.
pub fn reason_rows(categories: usize, rows: usize) -> Vec<Value> {
    (0..rows)
        .map(|i| {
            json!({
                "StudentId": format!("S{i}"),
                "Study Reason": format!("Reason {}", i % categories),
            })
        })
        .collect()
}
