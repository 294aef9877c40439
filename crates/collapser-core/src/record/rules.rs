use std::borrow::Cow;
use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;

use super::{MergeStrategy, Record};

/// Text normalisation applied to each key field before records are compared.
#[derive(Debug, Clone, Default)]
pub struct KeyNormalization {
    pub ignore_case: bool,
    pub trim: bool,
    /// Matches are removed from the key text, e.g. `[^0-9+]` for phone numbers.
    pub strip: Option<Regex>,
}

impl KeyNormalization {
    pub fn apply(&self, text: &str) -> String {
        let text = if self.trim { text.trim() } else { text };
        // Fold case before stripping so a lowercase strip class sees every letter.
        let text = if self.ignore_case {
            Cow::Owned(text.to_lowercase())
        } else {
            Cow::Borrowed(text)
        };
        match &self.strip {
            Some(re) => re.replace_all(&text, "").into_owned(),
            None => text.into_owned(),
        }
    }

    pub fn is_identity(&self) -> bool {
        !self.ignore_case && !self.trim && self.strip.is_none()
    }
}

/// Which fields identify a record and how the other fields are merged.
#[derive(Debug, Clone, Default)]
pub struct CollapseRules {
    key: Vec<String>,
    normalize: KeyNormalization,
    merge: BTreeMap<String, MergeStrategy>,
    default_merge: MergeStrategy,
}

impl CollapseRules {
    pub fn new<I, S>(key: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_merge(mut self, field: impl Into<String>, strategy: MergeStrategy) -> Self {
        self.merge.insert(field.into(), strategy);
        self
    }

    pub fn with_default_merge(mut self, strategy: MergeStrategy) -> Self {
        self.default_merge = strategy;
        self
    }

    pub fn with_normalization(mut self, normalize: KeyNormalization) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key
    }

    pub fn normalization(&self) -> &KeyNormalization {
        &self.normalize
    }

    pub fn strategies(&self) -> &BTreeMap<String, MergeStrategy> {
        &self.merge
    }

    pub fn default_merge(&self) -> MergeStrategy {
        self.default_merge
    }

    pub fn strategy_for(&self, field: &str) -> MergeStrategy {
        self.merge.get(field).copied().unwrap_or(self.default_merge)
    }

    /// Fields whose value counts the records folded into a survivor.
    pub(crate) fn count_fields(&self) -> impl Iterator<Item = &str> {
        self.merge
            .iter()
            .filter(|(_, strategy)| **strategy == MergeStrategy::Count)
            .map(|(field, _)| field.as_str())
    }

    /// One normalised entry per key field; missing and null fields are `None`.
    pub fn key_of(&self, record: &Record) -> Vec<Option<String>> {
        self.key
            .iter()
            .map(|field| {
                let text = match record.get(field)? {
                    Value::Null => return None,
                    Value::String(s) => Cow::Borrowed(s.as_str()),
                    other => Cow::Owned(other.to_string()),
                };
                Some(self.normalize.apply(&text))
            })
            .collect()
    }

    /// Fold `other` into `survivor`. Key fields keep the survivor's value.
    ///
    /// Returns `false` if any field could not be merged under its strategy.
    pub fn merge_into(&self, survivor: &mut Record, other: Record) -> bool {
        let mut accepted = true;

        for field in self.count_fields() {
            match (count_of(survivor.get(field)), count_of(other.get(field))) {
                (Some(mine), Some(theirs)) => {
                    survivor.insert(field.to_string(), Value::from(mine + theirs));
                }
                _ => {
                    log::trace!("field '{field}': count is not a non-negative integer");
                    accepted = false;
                }
            }
        }

        for (field, incoming) in other {
            if self.key.contains(&field) {
                continue;
            }
            let strategy = self.strategy_for(&field);
            if strategy == MergeStrategy::Count {
                continue;
            }
            match survivor.get_mut(&field) {
                Some(current) => {
                    if !strategy.merge_value(current, incoming) {
                        log::trace!("field '{field}': values do not combine under '{strategy}'");
                        accepted = false;
                    }
                }
                None => {
                    survivor.insert(field, incoming);
                }
            }
        }

        accepted
    }
}

/// A record that was never merged counts as one.
fn count_of(value: Option<&Value>) -> Option<u64> {
    match value {
        None | Some(Value::Null) => Some(1),
        Some(v) => v.as_u64(),
    }
}
