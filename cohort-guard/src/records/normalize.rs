//! Header normalization: friendly API headers to canonical column keys.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{RawRow, Record};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("valid regex"));
static UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").expect("valid regex"));

/// Generic snake-casing for headers missing from the alias table.
///
/// ```rust
/// use cohort_guard::records::snake_case;
///
/// assert_eq!(snake_case(" Mode of Study "), "mode_of_study");
/// assert_eq!(snake_case("Fee (AUD)"), "fee_aud_");
/// ```
pub fn snake_case(header: &str) -> String {
    let s = WHITESPACE.replace_all(header.trim(), "_");
    let s = NON_WORD.replace_all(&s, "_");
    let s = UNDERSCORES.replace_all(&s, "_");
    s.to_lowercase()
}

const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("StudentId", "studentid"),
    ("FirstName", "firstname"),
    ("LastName", "lastname"),
    ("Nickname", "nickname"),
    ("Age", "age"),
    ("Age Group", "age_group"),
    ("Statement Count", "statement_count"),
    ("Number of Study Periods", "number_of_study_periods"),
    ("CourseAttempt", "courseattempt"),
    ("Campus_Name", "campus_name"),
    ("Region", "region"),
    ("Nationality", "nationality"),
    ("Visa Status", "visa_status"),
    ("CourseType", "coursetype"),
    ("CourseId", "courseid"),
    ("CourseName", "coursename"),
    ("Study Reason", "study_reason"),
    ("Mode of Study", "mode_of_study"),
    ("Gender", "gender"),
    ("AgentName", "agentname"),
    ("Agent Name", "agentname"),
    ("Education Agent Name (if any)", "education_agent_name_if_any"),
    ("CourseManager", "coursemanager"),
    ("Course Manager", "coursemanager"),
    ("OfferId", "offerid"),
    ("Stage", "stage"),
    ("Status", "status"),
    ("Application Status", "application_status"),
    ("CoENo", "coeno"),
    ("DOB", "dob"),
    ("StartDate", "startdate"),
    ("FinishDate", "finishdate"),
    ("Offer Expiry Date", "offer_expiry_date"),
    ("Application Date", "application_date"),
    ("Previous Offer Intake", "previous_offer_intake"),
    ("Previous Offer Year", "previous_offer_year"),
    ("Is the offer deferred?", "is_the_offer_deferred"),
    (
        "Do you want to pay more than 50% upfront fee?",
        "do_you_want_to_pay_more_than_50_upfront_fee",
    ),
    (
        "Are you currently or planning to study English whilst in Australia?",
        "are_you_currently_or_planning_to_study_english_whilst_in_australia",
    ),
];

const DEFAULT_SKIP_FIELDS: &[&str] = &["_rowid_", "rowid", "__rowid__"];

/// Alias table plus the set of canonical keys that are dropped entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderAliases {
    /// Friendly header to canonical key.
    pub aliases: HashMap<String, String>,
    /// Canonical keys removed from every row (SQLite row ids and the like).
    pub skip_fields: HashSet<String>,
}

impl Default for HeaderAliases {
    fn default() -> Self {
        Self {
            aliases: DEFAULT_ALIASES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            skip_fields: DEFAULT_SKIP_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl HeaderAliases {
    /// An empty table: every header is snake-cased, nothing is skipped.
    pub fn empty() -> Self {
        Self {
            aliases: HashMap::new(),
            skip_fields: HashSet::new(),
        }
    }

    /// Adds or replaces an alias.
    pub fn with_alias(mut self, header: impl Into<String>, key: impl Into<String>) -> Self {
        self.aliases.insert(header.into(), key.into());
        self
    }

    /// Marks a canonical key as skipped.
    pub fn with_skip_field(mut self, key: impl Into<String>) -> Self {
        self.skip_fields.insert(key.into());
        self
    }

    /// Canonical key for a header.
    pub fn canonical_key(&self, header: &str) -> String {
        match self.aliases.get(header) {
            Some(key) => key.clone(),
            None => snake_case(header),
        }
    }

    /// Whether a canonical key is dropped.
    pub fn is_skipped(&self, key: &str) -> bool {
        self.skip_fields.contains(key)
    }

    /// Rewrites a raw row's headers into canonical keys.
    ///
    /// When two headers map to the same key the later one wins.
    pub fn normalize_row(&self, raw: &RawRow) -> Record {
        raw.iter()
            .filter_map(|(header, value)| {
                let key = self.canonical_key(header);
                (!self.is_skipped(&key)).then(|| (key, value.clone()))
            })
            .collect()
    }

    /// Canonical key to original header, taken from one representative row.
    ///
    /// The original headers become the default display labels.
    pub fn original_labels(&self, raw: &RawRow) -> HashMap<String, String> {
        raw.keys()
            .filter_map(|header| {
                let key = self.canonical_key(header);
                (!self.is_skipped(&key)).then(|| (key, header.clone()))
            })
            .collect()
    }
}
