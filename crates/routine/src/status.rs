//! Parsing of `SHOW ROUTINE LOAD` row-sets into job summaries.
//!
//! Column names drift between store versions. Each row is treated as a
//! column → text map and every column is offered to [`COLUMN_RULES`] in
//! order; the first rule that claims a column extracts from it. Canonical
//! names are matched exactly before any substring heuristic is consulted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::RowSet;

/// Summary of one routine-load job as reported by the store.
///
/// `processed` and `errors` are `None` when the store did not report a
/// usable count. Unknown is not zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionJob {
    pub name: String,
    pub state: String,
    pub table: String,
    pub processed: Option<i64>,
    pub errors: Option<i64>,
}

impl IngestionJob {
    pub fn normalized_state(&self) -> String {
        normalize_state(&self.state)
    }
}

/// Uppercased, trimmed state; empty becomes `UNKNOWN`.
pub fn normalize_state(state: &str) -> String {
    let s = state.trim();
    if s.is_empty() {
        "UNKNOWN".to_string()
    } else {
        s.to_uppercase()
    }
}

// ── Column rules ─────────────────────────────────────────────────

/// A named way of extracting job fields from one column.
pub struct ColumnRule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub apply: fn(&str, &mut IngestionJob),
}

pub const COLUMN_RULES: &[ColumnRule] = &[
    ColumnRule {
        name: "name",
        matches: |c| c == "Name",
        apply: |v, job| job.name = v.to_string(),
    },
    ColumnRule {
        name: "state",
        matches: |c| c == "State",
        apply: |v, job| job.state = v.to_string(),
    },
    ColumnRule {
        name: "table",
        matches: |c| c == "TableName",
        apply: |v, job| job.table = v.to_string(),
    },
    ColumnRule {
        name: "statistic",
        matches: |c| c == "Statistic" || c == "STATISTIC",
        apply: |v, job| {
            let counts = parse_statistic(v);
            if counts.processed.is_some() {
                job.processed = counts.processed;
            }
            if counts.errors.is_some() {
                job.errors = counts.errors;
            }
        },
    },
    ColumnRule {
        name: "processed_column",
        matches: |c| {
            let up = c.to_uppercase();
            up.contains("SUCCESS") || up.contains("LOADED") || up.contains("PROCESSED")
        },
        apply: |v, job| {
            if let Ok(n) = v.trim().parse() {
                job.processed = Some(n);
            }
        },
    },
    ColumnRule {
        name: "error_column",
        matches: |c| {
            let up = c.to_uppercase();
            up.contains("ERROR") && up.contains("ROW")
        },
        apply: |v, job| {
            if let Ok(n) = v.trim().parse() {
                job.errors = Some(n);
            }
        },
    },
];

/// Turn a `SHOW ROUTINE LOAD` row-set into jobs, in row order.
///
/// Malformed cells never fail the parse; the affected fields stay blank.
pub fn parse_job_list(rows: &RowSet) -> Vec<IngestionJob> {
    rows.rows
        .iter()
        .map(|row| {
            let mut job = IngestionJob::default();
            for (i, column) in rows.columns.iter().enumerate() {
                let column = column.trim();
                let value = row.get(i).and_then(|v| v.as_deref()).unwrap_or("");
                if let Some(rule) = COLUMN_RULES.iter().find(|r| (r.matches)(column)) {
                    (rule.apply)(value, &mut job);
                }
            }
            job
        })
        .collect()
}

// ── Statistic blob ───────────────────────────────────────────────

/// Row counts extracted from a `Statistic` blob.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatisticCounts {
    pub processed: Option<i64>,
    pub errors: Option<i64>,
}

/// A named way of reading a statistic blob. Returns `None` when it does not apply.
pub struct StatisticStrategy {
    pub name: &'static str,
    pub extract: fn(&str) -> Option<StatisticCounts>,
}

pub const STATISTIC_STRATEGIES: &[StatisticStrategy] = &[
    StatisticStrategy { name: "structured", extract: structured_statistic },
    StatisticStrategy { name: "text", extract: text_statistic },
];

/// Processed-count keys, most specific first.
const PROCESSED_KEYS: &[&str] = &[
    "loadedRows", "successRows", "processedRows",
    "LoadedRows", "SuccessRows", "ProcessedRows",
];

/// Only consulted when no processed key matched.
const TOTAL_KEYS: &[&str] = &["totalRows", "TotalRows"];

const ERROR_KEYS: &[&str] = &["errorRows", "ErrorRows"];

pub fn parse_statistic(text: &str) -> StatisticCounts {
    if text.is_empty() {
        return StatisticCounts::default();
    }
    STATISTIC_STRATEGIES
        .iter()
        .find_map(|s| (s.extract)(text))
        .unwrap_or_default()
}

/// JSON object with one of the known key variants.
pub fn structured_statistic(text: &str) -> Option<StatisticCounts> {
    if !text.trim_start().starts_with('{') {
        return None;
    }
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(text) else {
        return None;
    };
    let first = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| obj.get(*k).and_then(count_value))
    };
    Some(StatisticCounts {
        processed: first(PROCESSED_KEYS).or_else(|| first(TOTAL_KEYS)),
        errors: first(ERROR_KEYS),
    })
}

static LOADED_RE: Lazy<Regex> = Lazy::new(|| count_regex("loaded"));
static SUCCESS_RE: Lazy<Regex> = Lazy::new(|| count_regex("success"));
static PROCESSED_RE: Lazy<Regex> = Lazy::new(|| count_regex("processed"));
static ERROR_RE: Lazy<Regex> = Lazy::new(|| count_regex("error"));
static TOTAL_RE: Lazy<Regex> = Lazy::new(|| count_regex("total"));

fn count_regex(word: &str) -> Regex {
    Regex::new(&format!(r"(?i){word}\s*rows\s*[:=]\s*(\d+)")).unwrap()
}

/// Free text such as `loaded rows: 123, error rows: 4`.
///
/// Later processed patterns override earlier ones; `total rows` only fills
/// a processed count that is still unknown.
pub fn text_statistic(text: &str) -> Option<StatisticCounts> {
    let capture = |re: &Regex| -> Option<i64> {
        re.captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
    };
    let mut counts = StatisticCounts::default();
    for re in [&*LOADED_RE, &*SUCCESS_RE, &*PROCESSED_RE] {
        if let Some(n) = capture(re) {
            counts.processed = Some(n);
        }
    }
    counts.errors = capture(&*ERROR_RE);
    if counts.processed.is_none() {
        counts.processed = capture(&*TOTAL_RE);
    }
    Some(counts)
}

/// Non-negative integer from a JSON number or numeric string.
fn count_value(v: &Value) -> Option<i64> {
    let n = match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (n >= 0).then_some(n)
}
