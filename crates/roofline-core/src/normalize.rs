//! Geographic canonicalization: states, counties, ZIP codes, and the
//! deterministic hierarchical IDs that link the four entity streams.
//!
//! Hierarchical IDs follow one rule everywhere:
//! `lower(strip_non_alnum(child)) + "_" + lower(strip_non_alnum(parent))`.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Full state name → USPS two-letter code. The table is bidirectional via
/// [`state_full_name`].
pub const STATE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Alabama", "AL"),
    ("Alaska", "AK"),
    ("Arizona", "AZ"),
    ("Arkansas", "AR"),
    ("California", "CA"),
    ("Colorado", "CO"),
    ("Connecticut", "CT"),
    ("Delaware", "DE"),
    ("Florida", "FL"),
    ("Georgia", "GA"),
    ("Hawaii", "HI"),
    ("Idaho", "ID"),
    ("Illinois", "IL"),
    ("Indiana", "IN"),
    ("Iowa", "IA"),
    ("Kansas", "KS"),
    ("Kentucky", "KY"),
    ("Louisiana", "LA"),
    ("Maine", "ME"),
    ("Maryland", "MD"),
    ("Massachusetts", "MA"),
    ("Michigan", "MI"),
    ("Minnesota", "MN"),
    ("Mississippi", "MS"),
    ("Missouri", "MO"),
    ("Montana", "MT"),
    ("Nebraska", "NE"),
    ("Nevada", "NV"),
    ("New Hampshire", "NH"),
    ("New Jersey", "NJ"),
    ("New Mexico", "NM"),
    ("New York", "NY"),
    ("North Carolina", "NC"),
    ("North Dakota", "ND"),
    ("Ohio", "OH"),
    ("Oklahoma", "OK"),
    ("Oregon", "OR"),
    ("Pennsylvania", "PA"),
    ("Rhode Island", "RI"),
    ("South Carolina", "SC"),
    ("South Dakota", "SD"),
    ("Tennessee", "TN"),
    ("Texas", "TX"),
    ("Utah", "UT"),
    ("Vermont", "VT"),
    ("Virginia", "VA"),
    ("Washington", "WA"),
    ("West Virginia", "WV"),
    ("Wisconsin", "WI"),
    ("Wyoming", "WY"),
    ("District of Columbia", "DC"),
    ("Washington D.C.", "DC"),
    ("D.C.", "DC"),
    ("Washington DC", "DC"),
];

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]").unwrap_or_else(|_| unreachable!()));

static COUNTY_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+County$").unwrap_or_else(|_| unreachable!()));

static ZIP_FIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{5}$").unwrap_or_else(|_| unreachable!()));

/// ZIP code that upstream feeds use as a stand-in for "unknown".
pub const PLACEHOLDER_ZIP: &str = "90001";

/// Convert a state name or abbreviation to its two-letter code.
///
/// Already-abbreviated inputs are uppercased; unknown long names fall back
/// to their first two characters uppercased, matching the SQL CASE fallback.
#[must_use]
pub fn standardize_state(state: &str) -> String {
    if state.is_empty() {
        return String::new();
    }
    if state.chars().count() == 2 {
        return state.to_uppercase();
    }
    for (full, abbr) in STATE_ABBREVIATIONS {
        if *full == state {
            return (*abbr).to_string();
        }
    }
    state.chars().take(2).collect::<String>().to_uppercase()
}

/// Look up the full name for a two-letter code. Variants map to their
/// canonical name (first table entry wins).
#[must_use]
pub fn state_full_name(abbr: &str) -> Option<&'static str> {
    let upper = abbr.to_uppercase();
    STATE_ABBREVIATIONS
        .iter()
        .find(|(_, code)| *code == upper)
        .map(|(full, _)| *full)
}

/// Remove a trailing `" County"` (any case), then trim.
#[must_use]
pub fn strip_county_suffix(county: &str) -> String {
    COUNTY_SUFFIX.replace(county, "").trim().to_string()
}

/// Lowercase with every non-alphanumeric character removed.
#[must_use]
pub fn lower_alnum(value: &str) -> String {
    NON_ALNUM.replace_all(value, "").to_lowercase()
}

/// Validation status of a 5-digit ZIP code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ZipStatus {
    Valid,
    Invalid,
    Placeholder,
    Missing,
}

impl ZipStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Placeholder => "placeholder",
            Self::Missing => "missing",
        }
    }
}

/// Classify a ZIP code the same way the Silver SQL does.
#[must_use]
pub fn zip_status(zip: Option<&str>) -> ZipStatus {
    match zip {
        None => ZipStatus::Missing,
        Some(z) if z.chars().count() != 5 => ZipStatus::Invalid,
        Some(PLACEHOLDER_ZIP) => ZipStatus::Placeholder,
        Some(z) if ZIP_FIVE.is_match(z) => ZipStatus::Valid,
        Some(_) => ZipStatus::Invalid,
    }
}

/// `state_<lower_alnum(state)>`.
#[must_use]
pub fn state_id(state: &str) -> String {
    format!("state_{}", lower_alnum(state))
}

/// `<lower_alnum(strip_county_suffix(county))>_<lower_alnum(state)>`.
#[must_use]
pub fn county_id(county: &str, state: &str) -> String {
    format!(
        "{}_{}",
        lower_alnum(&strip_county_suffix(county)),
        lower_alnum(state)
    )
}

/// `<lower_alnum(city)>_<lower_alnum(state)>`.
#[must_use]
pub fn city_id(city: &str, state: &str) -> String {
    format!("{}_{}", lower_alnum(city), lower_alnum(state))
}

/// `<lower_alnum(neighborhood)>_<lower_alnum(city)>`.
#[must_use]
pub fn neighborhood_id(neighborhood: &str, city: &str) -> String {
    format!("{}_{}", lower_alnum(neighborhood), lower_alnum(city))
}

/// SQL CASE expression mapping full state names in `field` to two-letter
/// codes, with the `UPPER(LEFT(field, 2))` fallback, aliased as `alias`.
///
/// Used by the Silver Wikipedia projection so the SQL and the Rust
/// [`standardize_state`] stay one table.
#[must_use]
pub fn state_case_sql(field: &str, alias: &str) -> String {
    let mut case = format!("CASE {field}\n");
    for (full, abbr) in STATE_ABBREVIATIONS {
        let escaped = full.replace('\'', "''");
        case.push_str(&format!("    WHEN '{escaped}' THEN '{abbr}'\n"));
    }
    case.push_str(&format!("    ELSE UPPER(LEFT({field}, 2))\nEND AS {alias}"));
    case
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn standardize_state_handles_names_codes_and_fallback() {
        assert_eq!(standardize_state("California"), "CA");
        assert_eq!(standardize_state("Utah"), "UT");
        assert_eq!(standardize_state("ca"), "CA");
        assert_eq!(standardize_state("Washington D.C."), "DC");
        // Unknown long name falls back to the first two characters.
        assert_eq!(standardize_state("Atlantis"), "AT");
        assert_eq!(standardize_state(""), "");
    }

    #[test]
    fn state_table_is_bidirectional() {
        assert_eq!(state_full_name("CA"), Some("California"));
        assert_eq!(state_full_name("ut"), Some("Utah"));
        assert_eq!(state_full_name("ZZ"), None);
    }

    #[test]
    fn strip_county_suffix_variants() {
        assert_eq!(strip_county_suffix("Salt Lake County"), "Salt Lake");
        assert_eq!(strip_county_suffix("Marin county"), "Marin");
        assert_eq!(strip_county_suffix("San Francisco"), "San Francisco");
    }

    #[test]
    fn zip_status_classification() {
        assert_eq!(zip_status(Some("94110")), ZipStatus::Valid);
        assert_eq!(zip_status(Some("90001")), ZipStatus::Placeholder);
        assert_eq!(zip_status(Some("ABC")), ZipStatus::Invalid);
        assert_eq!(zip_status(Some("9411A")), ZipStatus::Invalid);
        assert_eq!(zip_status(None), ZipStatus::Missing);
    }

    #[test]
    fn hierarchical_ids_follow_child_parent_rule() {
        assert_eq!(
            neighborhood_id("Noe Valley", "San Francisco"),
            "noevalley_sanfrancisco"
        );
        assert_eq!(city_id("Salt Lake City", "Utah"), "saltlakecity_utah");
        assert_eq!(county_id("Marin County", "California"), "marin_california");
        assert_eq!(state_id("California"), "state_california");
    }

    #[test]
    fn state_case_sql_covers_table_and_fallback() {
        let sql = state_case_sql("best_state", "state");
        assert!(sql.starts_with("CASE best_state"));
        assert!(sql.contains("WHEN 'California' THEN 'CA'"));
        assert!(sql.contains("ELSE UPPER(LEFT(best_state, 2))"));
        assert!(sql.ends_with("END AS state"));
    }

    proptest! {
        #[test]
        fn standardize_state_is_idempotent(s in "[A-Za-z .]{0,20}") {
            let once = standardize_state(&s);
            prop_assert_eq!(standardize_state(&once), once.clone());
        }

        #[test]
        fn strip_county_suffix_is_idempotent(s in "[A-Za-z ]{0,30}") {
            let once = strip_county_suffix(&s);
            prop_assert_eq!(strip_county_suffix(&once), once.clone());
        }

        #[test]
        fn lower_alnum_output_is_clean(s in ".{0,40}") {
            let cleaned = lower_alnum(&s);
            prop_assert!(cleaned.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }
}
