//! Property keys that may be forwarded into generated statements.
//!
//! Anything not listed is dropped before a statement is assembled.

/// An immutable, named set of property keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyWhitelist {
    pub name: &'static str,
    keys: &'static [&'static str],
}

impl PropertyWhitelist {
    pub const fn new(name: &'static str, keys: &'static [&'static str]) -> Self {
        Self { name, keys }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(&key)
    }
}

/// Keys accepted by `CREATE ROUTINE LOAD ... PROPERTIES (...)`.
pub const CREATE_WHITELIST: PropertyWhitelist = PropertyWhitelist::new(
    "create",
    &[
        "desired_concurrent_number",
        "max_batch_interval",
        "max_batch_rows",
        "max_batch_size",
        "strict_mode",
        "format",
        "jsonpaths",
    ],
);

/// Keys accepted by `ALTER ROUTINE LOAD ... PROPERTIES (...)`.
pub const UPDATE_WHITELIST: PropertyWhitelist = PropertyWhitelist::new(
    "update",
    &[
        "desired_concurrent_number",
        "max_error_number",
        "max_batch_interval",
        "max_batch_rows",
        "max_batch_size",
        "jsonpaths",
        "json_root",
        "strip_outer_array",
        "strict_mode",
        "timezone",
    ],
);
