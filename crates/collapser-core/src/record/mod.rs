//! JSON records collapsed under configurable rules.

pub mod json;
pub mod rules;
pub mod strategy;

use anyhow::{bail, Result};
use serde_json::{Map, Value};

use crate::collapse::{self, CollapseReport, Collapsible, TryCollapsible};

pub use rules::{CollapseRules, KeyNormalization};
pub use strategy::MergeStrategy;

/// A flat JSON object. Field order is preserved.
pub type Record = Map<String, Value>;

/// A record bound to the rules that decide its key and how it merges.
#[derive(Debug, Clone)]
pub struct RuleRecord<'r> {
    rules: &'r CollapseRules,
    index: usize,
    record: Record,
}

impl<'r> RuleRecord<'r> {
    /// `index` is the record's position in the input, used in diagnostics.
    pub fn new(rules: &'r CollapseRules, index: usize, record: Record) -> Self {
        Self {
            rules,
            index,
            record,
        }
    }

    pub fn into_record(self) -> Record {
        self.record
    }
}

impl Collapsible for RuleRecord<'_> {
    type Key = Vec<Option<String>>;

    fn collapse_key(&self) -> Self::Key {
        self.rules.key_of(&self.record)
    }

    fn collapse_with(&mut self, other: Self) -> bool {
        self.rules.merge_into(&mut self.record, other.record)
    }
}

/// Turns a rejected merge into an error.
struct Strict<'r>(RuleRecord<'r>);

impl TryCollapsible for Strict<'_> {
    type Key = Vec<Option<String>>;
    type Error = anyhow::Error;

    fn try_collapse_key(&self) -> Result<Self::Key> {
        Ok(self.0.collapse_key())
    }

    fn try_collapse_with(&mut self, other: Self) -> Result<bool> {
        let absorbed = other.0.index;
        if self.0.collapse_with(other.0) {
            return Ok(true);
        }
        bail!(
            "record {absorbed} conflicts with record {} (key {})",
            self.0.index,
            describe_key(&self.0.collapse_key())
        )
    }
}

/// Collapse `records` under `rules`. Rejected merges are absorbed and counted.
pub fn collapse_records(
    rules: &CollapseRules,
    records: Vec<Record>,
) -> (Vec<Record>, CollapseReport) {
    let mut bound = bind(rules, records);
    let report = collapse::collapse(&mut bound);
    (finish(rules, bound.into_iter().map(RuleRecord::into_record)), report)
}

/// Like [`collapse_records`], but the first rejected merge is an error.
pub fn try_collapse_records(
    rules: &CollapseRules,
    records: Vec<Record>,
) -> Result<(Vec<Record>, CollapseReport)> {
    let mut bound: Vec<Strict<'_>> = bind(rules, records).into_iter().map(Strict).collect();
    let report = collapse::try_collapse(&mut bound)?;
    let records = bound.into_iter().map(|strict| strict.0.into_record());
    Ok((finish(rules, records), report))
}

fn bind(rules: &CollapseRules, records: Vec<Record>) -> Vec<RuleRecord<'_>> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| RuleRecord::new(rules, index, record))
        .collect()
}

/// Records that never absorbed anything still get their count fields.
fn finish(rules: &CollapseRules, records: impl Iterator<Item = Record>) -> Vec<Record> {
    records
        .map(|mut record| {
            for field in rules.count_fields() {
                record.entry(field).or_insert_with(|| Value::from(1));
            }
            record
        })
        .collect()
}

fn describe_key(key: &[Option<String>]) -> String {
    let parts: Vec<&str> = key.iter().map(|k| k.as_deref().unwrap_or("null")).collect();
    format!("[{}]", parts.join(", "))
}
