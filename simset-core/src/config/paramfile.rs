//! Line-oriented `key=value` parameter file reader.
//!
//! Format: one `key=value` pair per line, `#` starts a trailing
//! comment, blank lines are ignored. A `LIST N` line starting a section
//! introduces `N` subsequent lines of whitespace-separated reals
//! collected under the preceding key. Unknown keys are retained
//! verbatim and surfaced for the caller to warn about — the parser
//! itself never rejects a key it doesn't recognise, only a value it
//! cannot parse as the type requested by `get_*`/`require_*`.

use std::collections::HashMap;

use super::ConfigError;

/// A single parsed value, before being interpreted as a specific type
/// by [`ParsedParams::get_real`] and friends.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(String),
    List(Vec<f64>),
}

/// The full set of key/value pairs read from a parameter file, plus any
/// keys the caller never asked about (useful for an "unknown parameter"
/// warning pass).
#[derive(Debug, Clone, Default)]
pub struct ParsedParams {
    values: HashMap<String, ParamValue>,
}

impl ParsedParams {
    /// All keys that were present in the source text, in no particular
    /// order. Combine with a known-keys set to warn about typos.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    fn scalar(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParamValue::Scalar(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Reads a real-valued scalar, if present.
    pub fn get_real(&self, name: &str) -> Option<f64> {
        self.scalar(name)?.parse().ok()
    }

    /// Reads a real-valued scalar, erroring if absent or malformed.
    pub fn require_real(&self, name: &'static str) -> Result<f64, ConfigError> {
        let raw = self.scalar(name).ok_or(ConfigError::MissingParameter(name))?;
        raw.parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw.to_string(),
            detail: "expected a real number".to_string(),
        })
    }

    /// Reads an integer-valued scalar, if present.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.scalar(name)?.parse().ok()
    }

    /// Reads an integer-valued scalar, erroring if absent or malformed.
    pub fn require_int(&self, name: &'static str) -> Result<i64, ConfigError> {
        let raw = self.scalar(name).ok_or(ConfigError::MissingParameter(name))?;
        raw.parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw.to_string(),
            detail: "expected an integer".to_string(),
        })
    }

    /// Reads a boolean scalar (`true`/`false`/`1`/`0`/`yes`/`no`), if
    /// present.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.scalar(name)?.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        }
    }

    /// Reads a string scalar, if present.
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.scalar(name).map(str::to_string)
    }

    /// Reads a string scalar, erroring if absent.
    pub fn require_string(&self, name: &'static str) -> Result<String, ConfigError> {
        self.scalar(name)
            .map(str::to_string)
            .ok_or(ConfigError::MissingParameter(name))
    }

    /// Reads a `LIST`-section value as a slice of reals, if present.
    pub fn get_list(&self, name: &str) -> Option<&[f64]> {
        match self.values.get(name) {
            Some(ParamValue::List(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Inserts a scalar value, overwriting any prior entry for `name`.
    /// Exposed for tests and for CLI overrides (`--set key=value`).
    pub fn insert_scalar(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_string(), ParamValue::Scalar(value.into()));
    }

    /// Convenience wrapper over [`ParsedParams::insert_scalar`] for
    /// booleans.
    pub fn insert_bool(&mut self, name: &str, value: bool) {
        self.insert_scalar(name, if value { "true" } else { "false" });
    }
}

/// Parses parameter-file text into a [`ParsedParams`].
///
/// Returns a [`ConfigError::InvalidValue`] only for structurally
/// malformed input (a line with no `=`, or a `LIST` header with a
/// non-integer count, or fewer list lines than declared).
pub fn parse(text: &str) -> Result<ParsedParams, ConfigError> {
    let mut params = ParsedParams::default();
    let mut lines = text.lines().enumerate().peekable();

    while let Some((line_no, raw_line)) = lines.next() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
            name: format!("line {}", line_no + 1),
            value: line.to_string(),
            detail: "expected `key=value`".to_string(),
        })?;
        let key = key.trim();
        let value = value.trim();

        if let Some(count_str) = value.strip_prefix("LIST ").map(str::trim) {
            let count: usize = count_str.parse().map_err(|_| ConfigError::InvalidValue {
                name: key.to_string(),
                value: value.to_string(),
                detail: "LIST count must be an integer".to_string(),
            })?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                let (_, item_line) = lines.next().ok_or_else(|| ConfigError::InvalidValue {
                    name: key.to_string(),
                    value: value.to_string(),
                    detail: "LIST section truncated before declared count".to_string(),
                })?;
                let item_line = strip_comment(item_line).trim();
                for token in item_line.split_whitespace() {
                    let v: f64 = token.parse().map_err(|_| ConfigError::InvalidValue {
                        name: key.to_string(),
                        value: token.to_string(),
                        detail: "expected a real number in LIST section".to_string(),
                    })?;
                    items.push(v);
                }
            }
            params.values.insert(key.to_string(), ParamValue::List(items));
        } else {
            params.values.insert(key.to_string(), ParamValue::Scalar(value.to_string()));
        }
    }

    Ok(params)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}
