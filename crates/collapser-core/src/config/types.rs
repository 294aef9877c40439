use std::collections::BTreeMap;

use anyhow::{ensure, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::record::{CollapseRules, KeyNormalization, MergeStrategy};

/// Collapse rules as written in a `collapser` TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CollapseConfig {
    #[serde(default)]
    pub description: Option<String>,

    /// Fields that together identify a record.
    #[serde(default)]
    pub key: Vec<String>,

    /// Strategy for fields without an entry in `merge`.
    #[serde(default)]
    pub default_merge: MergeStrategy,

    /// Fail instead of absorbing a record whose merge is rejected.
    #[serde(default)]
    pub strict: bool,

    #[serde(default)]
    pub normalize: NormalizeConfig,

    /// Per-field merge strategies.
    #[serde(default)]
    pub merge: BTreeMap<String, MergeStrategy>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NormalizeConfig {
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default)]
    pub trim: bool,
    /// Regex; matches are removed from key text.
    #[serde(default)]
    pub strip: Option<String>,
}

impl NormalizeConfig {
    pub fn compile(&self) -> Result<KeyNormalization> {
        let strip = self
            .strip
            .as_deref()
            .map(Regex::new)
            .transpose()
            .context("invalid normalize.strip pattern")?;
        Ok(KeyNormalization {
            ignore_case: self.ignore_case,
            trim: self.trim,
            strip,
        })
    }
}

impl CollapseConfig {
    /// Validate and build the rules used by the engine.
    pub fn rules(&self) -> Result<CollapseRules> {
        ensure!(
            !self.key.is_empty(),
            "no key fields configured (set `key` in the config or pass --key)"
        );
        self.build_rules()
    }

    /// Build the rules without requiring key fields, for display.
    pub fn build_rules(&self) -> Result<CollapseRules> {
        let mut rules = CollapseRules::new(self.key.iter().cloned())
            .with_default_merge(self.default_merge)
            .with_normalization(self.normalize.compile()?);
        for (field, strategy) in &self.merge {
            rules = rules.with_merge(field.clone(), *strategy);
        }
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config: CollapseConfig = toml::from_str(r#"key = ["email"]"#).unwrap();
        assert_eq!(config.key, vec!["email"]);
        assert_eq!(config.default_merge, MergeStrategy::First);
        assert!(!config.strict);
        assert!(config.merge.is_empty());
        assert!(config.normalize.strip.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
description = "Merge duplicate phone entries"
key = ["number"]
default_merge = "last"
strict = true

[normalize]
ignore_case = true
trim = true
strip = "[^0-9+]"

[merge]
times_used = "sum"
last_used = "max"
primary = "any"
labels = "union"
"#;
        let config: CollapseConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.description.as_deref(),
            Some("Merge duplicate phone entries")
        );
        assert_eq!(config.default_merge, MergeStrategy::Last);
        assert!(config.strict);
        assert!(config.normalize.ignore_case);
        assert_eq!(config.merge.len(), 4);
        assert_eq!(config.merge["labels"], MergeStrategy::Union);

        let rules = config.rules().unwrap();
        assert_eq!(rules.key_fields(), ["number"]);
        assert_eq!(rules.strategy_for("times_used"), MergeStrategy::Sum);
        assert_eq!(rules.strategy_for("label"), MergeStrategy::Last);
        assert_eq!(rules.normalization().apply(" +1 (555) 0100"), "+15550100");
    }

    #[test]
    fn unknown_strategy_is_a_parse_error() {
        let err = toml::from_str::<CollapseConfig>("key = [\"id\"]\n[merge]\nn = \"avg\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("avg"));
    }

    #[test]
    fn rules_require_a_key() {
        let err = CollapseConfig::default().rules().unwrap_err();
        assert!(err.to_string().contains("no key fields configured"));
    }

    #[test]
    fn build_rules_allows_empty_key() {
        let config: CollapseConfig =
            toml::from_str("default_merge = \"max\"\n[merge]\nn = \"sum\"\n").unwrap();
        let rules = config.build_rules().unwrap();
        assert!(rules.key_fields().is_empty());
        assert_eq!(rules.default_merge(), MergeStrategy::Max);
        assert_eq!(rules.strategies().get("n"), Some(&MergeStrategy::Sum));
        assert!(rules.normalization().is_identity());
    }

    #[test]
    fn rules_reject_bad_strip_pattern() {
        let config = CollapseConfig {
            key: vec!["id".to_string()],
            normalize: NormalizeConfig {
                strip: Some("[".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.rules().unwrap_err();
        assert_eq!(err.to_string(), "invalid normalize.strip pattern");
    }
}
