use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// How a field of an absorbed record is folded into the survivor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Keep the survivor's value; only fill it in when the survivor has none.
    #[default]
    First,
    /// Take the absorbed record's value whenever it has one.
    Last,
    Sum,
    Max,
    Min,
    /// Boolean OR. Integer flags (0/1) are accepted too.
    Any,
    /// Boolean AND.
    All,
    /// Array of distinct values in first-seen order.
    Union,
    /// Number of input records folded into the survivor.
    Count,
}

impl MergeStrategy {
    pub const ALL: [MergeStrategy; 9] = [
        MergeStrategy::First,
        MergeStrategy::Last,
        MergeStrategy::Sum,
        MergeStrategy::Max,
        MergeStrategy::Min,
        MergeStrategy::Any,
        MergeStrategy::All,
        MergeStrategy::Union,
        MergeStrategy::Count,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MergeStrategy::First => "first",
            MergeStrategy::Last => "last",
            MergeStrategy::Sum => "sum",
            MergeStrategy::Max => "max",
            MergeStrategy::Min => "min",
            MergeStrategy::Any => "any",
            MergeStrategy::All => "all",
            MergeStrategy::Union => "union",
            MergeStrategy::Count => "count",
        }
    }

    /// Fold `incoming` into `current`.
    ///
    /// Returns `false` when the values cannot be combined under this strategy;
    /// `current` is left as it was in that case. A null on either side counts
    /// as "no value". `Count` is driven by the rules, not by field values, and
    /// is a no-op here.
    pub fn merge_value(self, current: &mut Value, incoming: Value) -> bool {
        if incoming.is_null() {
            return true;
        }
        if current.is_null() {
            *current = incoming;
            return true;
        }
        match self {
            MergeStrategy::First | MergeStrategy::Count => true,
            MergeStrategy::Last => {
                *current = incoming;
                true
            }
            MergeStrategy::Sum => match add_numbers(current, &incoming) {
                Some(total) => {
                    *current = total;
                    true
                }
                None => false,
            },
            MergeStrategy::Max => replace_when(current, incoming, Ordering::Less),
            MergeStrategy::Min => replace_when(current, incoming, Ordering::Greater),
            MergeStrategy::Any => combine_flags(current, &incoming, |a, b| a || b),
            MergeStrategy::All => combine_flags(current, &incoming, |a, b| a && b),
            MergeStrategy::Union => {
                union_into(current, incoming);
                true
            }
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MergeStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if let Some(strategy) = Self::ALL.into_iter().find(|m| m.name() == wanted) {
            return Ok(strategy);
        }
        let names: Vec<&str> = Self::ALL.iter().map(|m| m.name()).collect();
        bail!(
            "unknown merge strategy '{s}' (expected one of: {})",
            names.join(", ")
        )
    }
}

fn add_numbers(a: &Value, b: &Value) -> Option<Value> {
    let (Value::Number(x), Value::Number(y)) = (a, b) else {
        return None;
    };
    if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
        if let Some(total) = x.checked_add(y) {
            return Some(Value::from(total));
        }
    }
    let total = x.as_f64()? + y.as_f64()?;
    Number::from_f64(total).map(Value::Number)
}

/// Numbers compare numerically, strings lexically (ISO timestamps sort
/// correctly); anything else is incomparable.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn replace_when(current: &mut Value, incoming: Value, ordering: Ordering) -> bool {
    match compare(current, &incoming) {
        Some(found) => {
            if found == ordering {
                *current = incoming;
            }
            true
        }
        None => false,
    }
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

fn combine_flags(current: &mut Value, incoming: &Value, op: fn(bool, bool) -> bool) -> bool {
    let (Some(a), Some(b)) = (as_flag(current), as_flag(incoming)) else {
        return false;
    };
    let merged = op(a, b);
    // Keep the survivor's representation.
    *current = match current {
        Value::Bool(_) => Value::Bool(merged),
        _ => Value::from(u8::from(merged)),
    };
    true
}

fn union_into(current: &mut Value, incoming: Value) {
    let mut items = match std::mem::take(current) {
        Value::Array(items) => items,
        other => vec![other],
    };
    let extra = match incoming {
        Value::Array(extra) => extra,
        other => vec![other],
    };
    for item in extra {
        if !items.contains(&item) {
            items.push(item);
        }
    }
    *current = Value::Array(items);
}
