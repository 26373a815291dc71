//! Assembly of routine-load statements.
//!
//! Builders here are pure: they return statement text and never touch the
//! store. Property maps are filtered through an explicit [`PropertyWhitelist`]
//! and emitted in key order so generated text is stable and diffable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RoutineError;
use crate::whitelist::PropertyWhitelist;

/// Property subject to a floor on creation.
pub const BATCH_ROWS_KEY: &str = "max_batch_rows";

/// Smallest `max_batch_rows` sent on creation.
pub const MIN_BATCH_ROWS: i64 = 200_000;

/// Kafka connection parameters for a new job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaSource {
    #[serde(default)]
    pub broker_list: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub group_id: String,
}

/// Request to create a routine-load job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub kafka: KafkaSource,
    /// Explicit column list; empty means `*`.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Column → expression overrides, only honoured with an explicit column list.
    #[serde(default)]
    pub set: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl CreateRequest {
    /// Trim required fields and reject the request if any is blank or not a
    /// plain identifier. Must run before [`build_create_statement`].
    pub fn validate(&mut self) -> Result<(), RoutineError> {
        self.name = self.name.trim().to_string();
        self.table = self.table.trim().to_string();
        self.kafka.broker_list = self.kafka.broker_list.trim().to_string();
        self.kafka.topic = self.kafka.topic.trim().to_string();
        self.kafka.group_id = self.kafka.group_id.trim().to_string();

        let required = [
            &self.name,
            &self.table,
            &self.kafka.broker_list,
            &self.kafka.topic,
            &self.kafka.group_id,
        ];
        if required.iter().any(|f| f.is_empty()) {
            return Err(RoutineError::Validation("missing required fields".into()));
        }

        validate_job_name(&self.name)?;
        validate_table_name(&self.table)?;
        for col in self.columns.iter().chain(self.set.keys()) {
            if !is_identifier(col.trim()) {
                return Err(RoutineError::Validation(format!("invalid column: {}", col)));
            }
        }
        for (col, expr) in &self.set {
            if !is_contained_expression(expr) {
                return Err(RoutineError::Validation(format!("invalid expression for {}", col)));
            }
        }
        Ok(())
    }
}

// ── Identifiers & escaping ───────────────────────────────────────

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A column expression is emitted verbatim inside `COLUMNS ( .. )`, so it
/// must not be able to close that clause, start another list item, end the
/// statement or open a comment. Quoted text is skipped.
fn is_contained_expression(expr: &str) -> bool {
    let mut chars = expr.trim().chars().peekable();
    if chars.peek().is_none() {
        return false;
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            match c {
                '\\' if q != '`' => {
                    chars.next();
                }
                c if c == q => quote = None,
                _ => {}
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            ',' if depth == 0 => return false,
            ';' => return false,
            '-' if chars.peek() == Some(&'-') => return false,
            '/' if chars.peek() == Some(&'*') => return false,
            _ => {}
        }
    }
    quote.is_none() && depth == 0
}

/// Job names are interpolated unquoted, so only `[A-Za-z0-9_]` is accepted.
pub fn validate_job_name(name: &str) -> Result<(), RoutineError> {
    if name.trim().is_empty() {
        return Err(RoutineError::Validation("missing name".into()));
    }
    if !is_identifier(name) {
        return Err(RoutineError::Validation(format!("invalid name: {}", name)));
    }
    Ok(())
}

/// `table` or `db.table`.
pub fn validate_table_name(table: &str) -> Result<(), RoutineError> {
    let mut parts = table.split('.');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(t), None, None) => is_identifier(t),
        (Some(db), Some(t), None) => is_identifier(db) && is_identifier(t),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(RoutineError::Validation(format!("invalid table: {}", table)))
    }
}

/// Escape for a double-quoted literal.
pub fn escape_double_quoted(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Escape for a single-quoted literal.
pub fn escape_single_quoted(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\'', "''")
}

// ── CREATE ───────────────────────────────────────────────────────

/// Whitelisted creation properties with the batch-rows floor applied.
///
/// The floor is only enforced when the whitelist admits the key.
pub fn creation_properties(
    properties: &BTreeMap<String, String>,
    whitelist: &PropertyWhitelist,
) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = properties
        .iter()
        .filter(|(k, _)| whitelist.contains(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    if whitelist.contains(BATCH_ROWS_KEY) {
        let keep = out
            .get(BATCH_ROWS_KEY)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .is_some_and(|n| n >= MIN_BATCH_ROWS);
        if !keep {
            out.insert(BATCH_ROWS_KEY.to_string(), MIN_BATCH_ROWS.to_string());
        }
    }
    out
}

/// Assemble `CREATE ROUTINE LOAD` for an already validated request.
pub fn build_create_statement(req: &CreateRequest, whitelist: &PropertyWhitelist) -> String {
    let mut columns: Vec<String> = if req.columns.is_empty() {
        vec!["*".to_string()]
    } else {
        req.columns.iter().map(|c| c.trim().to_string()).collect()
    };
    if !req.columns.is_empty() {
        // `set` is a BTreeMap, so inline assignments come out sorted.
        columns.extend(req.set.iter().map(|(col, expr)| format!("{} = {}", col.trim(), expr)));
    }

    let props: Vec<String> = creation_properties(&req.properties, whitelist)
        .iter()
        .map(|(k, v)| format!("\"{}\" = \"{}\"", k, escape_double_quoted(v)))
        .collect();
    let prop_clause = if props.is_empty() {
        String::new()
    } else {
        format!("\nPROPERTIES (\n  {}\n)", props.join(",\n  "))
    };

    format!(
        "CREATE ROUTINE LOAD {}\nON {}\nCOLUMNS({}){}\nFROM KAFKA (\n  \"kafka_broker_list\" = \"{}\",\n  \"kafka_topic\" = \"{}\",\n  \"property.group.id\" = \"{}\"\n)",
        req.name,
        req.table,
        columns.join(", "),
        prop_clause,
        escape_double_quoted(&req.kafka.broker_list),
        escape_double_quoted(&req.kafka.topic),
        escape_double_quoted(&req.kafka.group_id),
    )
}

// ── ALTER ────────────────────────────────────────────────────────

/// Assemble `ALTER ROUTINE LOAD` covering every whitelisted key.
///
/// Fails with a validation error when nothing survives the whitelist.
pub fn build_alter_statement(
    name: &str,
    properties: &BTreeMap<String, String>,
    whitelist: &PropertyWhitelist,
) -> Result<String, RoutineError> {
    let pairs: Vec<String> = properties
        .iter()
        .filter(|(k, _)| whitelist.contains(k))
        .map(|(k, v)| format!("'{}' = '{}'", k, escape_single_quoted(v.trim())))
        .collect();
    if pairs.is_empty() {
        return Err(RoutineError::Validation("no valid properties".into()));
    }
    Ok(format!(
        "ALTER ROUTINE LOAD FOR {} PROPERTIES ( {} )",
        name,
        pairs.join(", ")
    ))
}

// ── Control & inspection ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Pause,
    Resume,
    Stop,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Stop => "stop",
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            ControlAction::Pause => "PAUSE",
            ControlAction::Resume => "RESUME",
            ControlAction::Stop => "STOP",
        }
    }
}

pub fn control_statement(action: ControlAction, name: &str) -> String {
    format!("{} ROUTINE LOAD FOR {}", action.keyword(), name)
}

pub fn show_jobs_statement(database: &str) -> String {
    format!("SHOW ROUTINE LOAD FROM {}", database)
}

pub fn show_create_statement(name: &str) -> String {
    format!("SHOW CREATE ROUTINE LOAD FOR {}", name)
}
