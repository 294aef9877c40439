use anyhow::{bail, Context, Result};
use serde_json::Value;

use super::Record;

/// Parse one JSON object per line. Blank lines are skipped.
pub fn parse_json_lines(input: &str) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for (n, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value =
            serde_json::from_str(line).with_context(|| format!("line {}: invalid JSON", n + 1))?;
        match value {
            Value::Object(map) => records.push(map),
            other => bail!(
                "line {}: expected a JSON object, found {}",
                n + 1,
                kind(&other)
            ),
        }
    }
    Ok(records)
}

/// Parse a single JSON array of objects.
pub fn parse_json_array(input: &str) -> Result<Vec<Record>> {
    let value: Value = serde_json::from_str(input).context("invalid JSON document")?;
    let items = match value {
        Value::Array(items) => items,
        other => bail!("expected a JSON array of objects, found {}", kind(&other)),
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map),
            other => bail!("element {i}: expected a JSON object, found {}", kind(&other)),
        })
        .collect()
}

pub fn to_json_lines(records: &[Record]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

pub fn to_json_array(records: &[Record]) -> Result<String> {
    let mut out = serde_json::to_string_pretty(records)?;
    out.push('\n');
    Ok(out)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
