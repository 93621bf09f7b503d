//! Conditional step expressions: `{{var}} OP literal`.
//!
//! | op         | meaning                                      |
//! |------------|----------------------------------------------|
//! | `==`, `!=` | text equality (numeric when both are numbers) |
//! | `contains` | substring, or membership for lists           |
//! | `exists`   | defined and non-empty; takes no literal      |
//! | `>=`, `<=` | numeric comparison                           |

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use super::vars::{Value, Variables};

lazy_static! {
    static ref CONDITION: Regex = Regex::new(
        r"^\s*\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}\s*(==|!=|>=|<=|contains\b|exists\b)\s*(.*?)\s*$"
    )
    .expect("condition pattern is a valid regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Contains,
    Exists,
    Ge,
    Le,
}

impl Operator {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "==" => Some(Operator::Eq),
            "!=" => Some(Operator::Ne),
            "contains" => Some(Operator::Contains),
            "exists" => Some(Operator::Exists),
            ">=" => Some(Operator::Ge),
            "<=" => Some(Operator::Le),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Contains => "contains",
            Operator::Exists => "exists",
            Operator::Ge => ">=",
            Operator::Le => "<=",
        })
    }
}

/// A parsed condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub variable: String,
    pub op: Operator,
    pub literal: String,
}

impl Condition {
    pub fn parse(text: &str) -> Result<Self, String> {
        let caps = CONDITION.captures(text).ok_or_else(|| {
            format!("cannot parse condition '{text}' (expected '{{{{var}}}} OP value')")
        })?;
        let op = Operator::parse(&caps[2])
            .ok_or_else(|| format!("unknown operator '{}'", &caps[2]))?;
        let literal = unquote(&caps[3]).to_string();

        match op {
            Operator::Exists if !literal.is_empty() => {
                return Err(format!("'exists' takes no value, found '{literal}'"))
            }
            Operator::Ge | Operator::Le if literal.parse::<f64>().is_err() => {
                return Err(format!("'{op}' needs a number, found '{literal}'"))
            }
            _ => {}
        }

        Ok(Self {
            variable: caps[1].to_string(),
            op,
            literal,
        })
    }

    /// Evaluate against the current variables.
    pub fn evaluate(&self, vars: &Variables) -> Result<bool, String> {
        let value = vars.get(&self.variable);
        if self.op == Operator::Exists {
            return Ok(value.is_some_and(|v| !v.is_empty()));
        }

        let text = value.map(Value::render).unwrap_or_default();
        match self.op {
            Operator::Eq => Ok(loosely_equal(&text, &self.literal)),
            Operator::Ne => Ok(!loosely_equal(&text, &self.literal)),
            Operator::Contains => Ok(match value {
                Some(Value::List(items)) => items.iter().any(|i| *i == self.literal),
                _ => text.contains(&self.literal),
            }),
            Operator::Ge | Operator::Le => {
                let left: f64 = text.trim().parse().map_err(|_| {
                    format!("'{}' is not a number: '{}'", self.variable, text)
                })?;
                let right: f64 = self
                    .literal
                    .parse()
                    .map_err(|_| format!("'{}' is not a number", self.literal))?;
                Ok(if self.op == Operator::Ge {
                    left >= right
                } else {
                    left <= right
                })
            }
            Operator::Exists => Ok(false),
        }
    }
}

fn unquote(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn loosely_equal(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}
