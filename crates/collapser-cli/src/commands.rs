//! Subcommand implementations for the collapser CLI.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use collapser_core::config::{resolve_config, ResolvedConfig};
use collapser_core::record::{self, json, MergeStrategy, Record};

/// Rule selection shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct RuleArgs {
    /// Config file (default: .collapser.toml, then ~/.config/collapser/config.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Key field; repeat for a compound key. Replaces the configured key.
    #[arg(short, long = "key", value_name = "FIELD")]
    pub key: Vec<String>,

    /// Per-field merge strategy, e.g. `times_used=sum`
    #[arg(short, long = "merge", value_name = "FIELD=STRATEGY", value_parser = parse_merge)]
    pub merge: Vec<(String, MergeStrategy)>,

    /// Strategy for fields without a merge rule
    #[arg(long, value_name = "STRATEGY")]
    pub default_merge: Option<MergeStrategy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// One JSON object per line
    Jsonl,
    /// A single JSON array of objects
    Json,
}

fn parse_merge(s: &str) -> Result<(String, MergeStrategy), String> {
    let (field, strategy) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=STRATEGY, got '{s}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{s}'"));
    }
    let strategy = strategy.parse::<MergeStrategy>().map_err(|e| e.to_string())?;
    Ok((field.to_string(), strategy))
}

/// Resolve the config file and apply command-line overrides on top.
fn effective_config(args: &RuleArgs) -> Result<ResolvedConfig> {
    let mut resolved = resolve_config(args.config.as_deref())?;
    let config = &mut resolved.config;
    if !args.key.is_empty() {
        config.key = args.key.clone();
    }
    if let Some(strategy) = args.default_merge {
        config.default_merge = strategy;
    }
    for (field, strategy) in &args.merge {
        config.merge.insert(field.clone(), *strategy);
    }
    Ok(resolved)
}

// ---------------------------------------------------------------------------
// Run — collapse records
// ---------------------------------------------------------------------------

pub fn cmd_run(
    file: Option<&Path>,
    args: &RuleArgs,
    format: Format,
    strict: bool,
    report: bool,
) -> Result<()> {
    let resolved = effective_config(args)?;
    let rules = resolved.config.rules()?;
    log::debug!("using rules from {}", resolved.source);

    let (input, origin) = read_input(file)?;
    let records = parse_records(&input, format)
        .with_context(|| format!("reading records from {origin}"))?;

    let (records, summary) = if strict || resolved.config.strict {
        record::try_collapse_records(&rules, records)?
    } else {
        record::collapse_records(&rules, records)
    };

    let output = match format {
        Format::Jsonl => json::to_json_lines(&records)?,
        Format::Json => json::to_json_array(&records)?,
    };
    std::io::stdout()
        .lock()
        .write_all(output.as_bytes())
        .context("writing output")?;

    if report {
        eprintln!("collapser: {summary}");
    }
    Ok(())
}

fn read_input(file: Option<&Path>) -> Result<(String, String)> {
    match file {
        Some(path) if path != Path::new("-") => {
            let input = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok((input, path.display().to_string()))
        }
        _ => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("reading stdin")?;
            Ok((input, "stdin".to_string()))
        }
    }
}

fn parse_records(input: &str, format: Format) -> Result<Vec<Record>> {
    match format {
        Format::Jsonl => json::parse_json_lines(input),
        Format::Json => json::parse_json_array(input),
    }
}

// ---------------------------------------------------------------------------
// Show — display effective rules
// ---------------------------------------------------------------------------

pub fn cmd_show(args: &RuleArgs) -> Result<()> {
    let resolved = effective_config(args)?;
    let config = &resolved.config;
    // Surfaces invalid strip patterns here rather than on the first run.
    let rules = config.build_rules()?;

    println!("Source:      {}", resolved.source);
    if let Some(desc) = &config.description {
        println!("Description: {desc}");
    }
    if rules.key_fields().is_empty() {
        println!("Key:         (none, pass --key or set `key`)");
    } else {
        println!("Key:         {}", rules.key_fields().join(", "));
    }

    let normalization = rules.normalization();
    if normalization.is_identity() {
        println!("Normalize:   none");
    } else {
        let mut steps = Vec::new();
        if normalization.trim {
            steps.push("trim".to_string());
        }
        if normalization.ignore_case {
            steps.push("ignore_case".to_string());
        }
        if let Some(strip) = &normalization.strip {
            steps.push(format!("strip /{}/", strip.as_str()));
        }
        println!("Normalize:   {}", steps.join(", "));
    }

    println!("Default:     {}", rules.default_merge());
    println!("Strict:      {}", config.strict);
    let strategies = rules.strategies();
    if !strategies.is_empty() {
        println!("Merge rules: {}", strategies.len());
        let width = strategies.keys().map(String::len).max().unwrap_or(0);
        for (field, strategy) in strategies {
            println!("  {field:<width$}  →  {strategy}");
        }
    }
    Ok(())
}
