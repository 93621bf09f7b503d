//! Workflow variables and `{{name}}` substitution.

use std::fmt;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::warn;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}")
        .expect("placeholder pattern is a valid regex");
}

/// A variable value: text or a list of texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Text(String),
    List(Vec<String>),
}

/// Variable map in insertion order.
pub type Variables = IndexMap<String, Value>;

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Value::Text(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
        }
    }

    /// Text form used in substitution. Lists render as a JSON array.
    pub fn render(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::List(items) => serde_json::to_string(items).unwrap_or_default(),
        }
    }

    /// Items for iteration: a list as-is, or text holding a JSON array of
    /// strings.
    pub fn as_items(&self) -> Option<Vec<String>> {
        match self {
            Value::List(items) => Some(items.clone()),
            Value::Text(s) => serde_json::from_str::<Vec<String>>(s.trim()).ok(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value as Json;
        match value {
            Json::String(s) => Ok(Value::Text(s)),
            Json::Number(n) => Ok(Value::Text(n.to_string())),
            Json::Bool(b) => Ok(Value::Text(b.to_string())),
            Json::Null => Ok(Value::Text(String::new())),
            Json::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Json::String(s) => Ok(s),
                    Json::Number(n) => Ok(n.to_string()),
                    Json::Bool(b) => Ok(b.to_string()),
                    other => Err(format!("list items must be scalars, found {other}")),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Json::Object(_) => Err("variables must be text or a list of texts".to_string()),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Text(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::String).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items)
    }
}

/// Replace every `{{name}}` in `text` in one pass. Undefined names become
/// the empty string. Substituted text is never scanned again.
pub fn substitute(text: &str, vars: &Variables) -> String {
    substitute_with(text, |name| vars.get(name).map(Value::render))
}

/// Like [`substitute`], with a custom lookup.
pub fn substitute_with(text: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            lookup(name).unwrap_or_else(|| {
                warn!(variable = name, "undefined variable, substituting empty string");
                String::new()
            })
        })
        .into_owned()
}

/// Names referenced by `{{name}}` placeholders, in order of appearance.
pub fn placeholders(text: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}
