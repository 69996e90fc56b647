//! Detection of column pairs that encode the same attribute.
//!
//! A course code and a course name, or a campus id and a campus name, map
//! near-bijectively onto each other. Grouping by one while measuring the
//! other says nothing, so such pairs are recorded as mutually exclusive and
//! the selection guard refuses them.
//!
//! For every pair of columns the rows where both values are present are
//! scanned. The first value seen for each `a` fixes the expected `b` (and
//! vice versa); a pair is consistent when later rows agree. If at least
//! `min_pairs` rows were compared and the consistent fraction in either
//! direction reaches `consistency_threshold`, the columns are mutex.
//! Constant columns are never paired.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::records::{is_blank, Record};

/// Thresholds for mutex inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutexConfig {
    /// Minimum number of co-present value pairs before a verdict is made.
    pub min_pairs: usize,
    /// Fraction of consistent pairs, in either direction, that marks a mutex.
    pub consistency_threshold: f64,
}

impl Default for MutexConfig {
    fn default() -> Self {
        Self {
            min_pairs: 20,
            consistency_threshold: 0.97,
        }
    }
}

/// Symmetric relation between redundant columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutexPairs {
    pairs: HashMap<String, BTreeSet<String>>,
}

impl MutexPairs {
    /// An empty relation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `a` and `b` as mutually exclusive.
    pub fn insert(&mut self, a: &str, b: &str) {
        self.pairs
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        self.pairs
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
    }

    /// Whether `a` and `b` were inferred to be redundant.
    pub fn is_mutex(&self, a: &str, b: &str) -> bool {
        self.pairs.get(a).map_or(false, |set| set.contains(b))
    }

    /// Columns exclusive with `key`, sorted.
    pub fn partners(&self, key: &str) -> impl Iterator<Item = &str> {
        self.pairs
            .get(key)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Number of unordered pairs.
    pub fn len(&self) -> usize {
        self.pairs.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Infers mutex pairs among `keys` from every row of the dataset.
    #[instrument(skip_all, fields(rows = rows.len(), columns = keys.len()))]
    pub fn infer(rows: &[Record], keys: &[&str], config: &MutexConfig) -> Self {
        let mut mutex = Self::new();
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                if let Some(ratio) = consistency(rows, a, b, config.min_pairs) {
                    if ratio >= config.consistency_threshold {
                        debug!(a = %a, b = %b, ratio, "Columns are mutually exclusive");
                        mutex.insert(a, b);
                    }
                }
            }
        }
        mutex
    }
}

/// Identity of a value for pairing: strings and numbers never compare equal.
fn value_identity(value: &Value) -> String {
    value.to_string()
}

/// Best consistency ratio over both directions, or `None` when fewer than
/// `min_pairs` rows hold both values or either column is constant.
fn consistency(rows: &[Record], a: &str, b: &str, min_pairs: usize) -> Option<f64> {
    let mut a_to_b: HashMap<String, String> = HashMap::new();
    let mut b_to_a: HashMap<String, String> = HashMap::new();
    let (mut pairs, mut consistent_ab, mut consistent_ba) = (0usize, 0usize, 0usize);

    for row in rows {
        let (Some(va), Some(vb)) = (row.get(a), row.get(b)) else {
            continue;
        };
        if is_blank(va) || is_blank(vb) {
            continue;
        }
        let (va, vb) = (value_identity(va), value_identity(vb));
        pairs += 1;

        if *a_to_b.entry(va.clone()).or_insert_with(|| vb.clone()) == vb {
            consistent_ab += 1;
        }
        if *b_to_a.entry(vb).or_insert_with(|| va.clone()) == va {
            consistent_ba += 1;
        }
    }

    if pairs == 0 || pairs < min_pairs {
        return None;
    }
    // A column holding a single value maps consistently onto anything.
    if a_to_b.len() < 2 || b_to_a.len() < 2 {
        return None;
    }
    let best = consistent_ab.max(consistent_ba);
    Some(best as f64 / pairs as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn course_rows(n: usize) -> Vec<Record> {
        let courses = [("BUS101", "Business"), ("IT200", "Information Technology")];
        (0..n)
            .map(|i| {
                let (code, name) = courses[i % 2];
                Record::from(
                    json!({
                        "courseid": code,
                        "coursename": name,
                        "gender": if i % 3 == 0 { "F" } else { "M" }
                    })
                    .as_object()
                    .cloned()
                    .unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_code_name_pair_detected() {
        let rows = course_rows(40);
        let mutex = MutexPairs::infer(
            &rows,
            &["courseid", "coursename", "gender"],
            &MutexConfig::default(),
        );

        assert!(mutex.is_mutex("courseid", "coursename"));
        assert!(mutex.is_mutex("coursename", "courseid"));
        assert!(!mutex.is_mutex("courseid", "gender"));
        assert_eq!(mutex.len(), 1);
    }

    #[test]
    fn test_too_few_pairs_means_no_verdict() {
        let rows = course_rows(19);
        let mutex = MutexPairs::infer(&rows, &["courseid", "coursename"], &MutexConfig::default());
        assert!(mutex.is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let config = MutexConfig {
            min_pairs: 20,
            consistency_threshold: 0.95,
        };
        // 1 of 20 rows disagrees in both directions: 19/20 = 0.95
        let mut rows = course_rows(20);
        rows[19].insert("courseid", json!("BUS101"));
        rows[19].insert("coursename", json!("Information Technology"));

        let mutex = MutexPairs::infer(&rows, &["courseid", "coursename"], &config);
        assert!(mutex.is_mutex("courseid", "coursename"));

        let strict = MutexPairs::infer(&rows, &["courseid", "coursename"], &MutexConfig::default());
        assert!(!strict.is_mutex("courseid", "coursename"));
    }

    #[test]
    fn test_default_threshold_boundary() {
        let mislabel = |rows: &mut Vec<Record>, n: usize| {
            for row in rows.iter_mut().rev().take(n) {
                row.insert("courseid", json!("BUS101"));
                row.insert("coursename", json!("Information Technology"));
            }
        };
        let keys = ["courseid", "coursename"];

        // 97 of 100 consistent in both directions
        let mut rows = course_rows(100);
        mislabel(&mut rows, 3);
        assert!(MutexPairs::infer(&rows, &keys, &MutexConfig::default())
            .is_mutex("courseid", "coursename"));

        let mut rows = course_rows(100);
        mislabel(&mut rows, 4);
        assert!(MutexPairs::infer(&rows, &keys, &MutexConfig::default()).is_empty());
    }

    #[test]
    fn test_constant_column_never_paired() {
        let mut rows = course_rows(30);
        for row in &mut rows {
            row.insert("study_english", json!("Yes"));
        }
        let mutex = MutexPairs::infer(
            &rows,
            &["courseid", "coursename", "study_english"],
            &MutexConfig::default(),
        );
        assert!(mutex.is_mutex("courseid", "coursename"));
        assert_eq!(mutex.partners("study_english").count(), 0);
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let mut rows = course_rows(30);
        for row in rows.iter_mut().take(5) {
            row.insert("coursename", json!(""));
        }
        let mutex = MutexPairs::infer(&rows, &["courseid", "coursename"], &MutexConfig::default());
        assert!(mutex.is_mutex("courseid", "coursename"));
    }

    #[test]
    fn test_partners_sorted() {
        let mut mutex = MutexPairs::new();
        mutex.insert("campus_id", "campus_name");
        mutex.insert("campus_id", "campus_code");

        let partners: Vec<&str> = mutex.partners("campus_id").collect();
        assert_eq!(partners, vec!["campus_code", "campus_name"]);
        assert_eq!(mutex.partners("gender").count(), 0);
    }
}
