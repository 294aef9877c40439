mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{Format, RuleArgs};

#[derive(Parser)]
#[command(name = "collapser", version, about = "Merge records that share a key")]
struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Collapse records from FILE (or stdin) and print the survivors
    Run {
        /// Input file; reads stdin when omitted or "-"
        file: Option<PathBuf>,

        #[command(flatten)]
        rules: RuleArgs,

        /// Input and output format
        #[arg(long, value_enum, default_value_t = Format::Jsonl)]
        format: Format,

        /// Fail on the first merge a record rejects
        #[arg(long)]
        strict: bool,

        /// Print a summary line to stderr
        #[arg(long)]
        report: bool,
    },
    /// Print the effective collapse rules
    Show {
        #[command(flatten)]
        rules: RuleArgs,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Command::Run {
            file,
            rules,
            format,
            strict,
            report,
        } => commands::cmd_run(file.as_deref(), rules, *format, *strict, *report),
        Command::Show { rules } => commands::cmd_show(rules),
    };

    if let Err(e) = result {
        eprintln!("collapser: {e:#}");
        std::process::exit(1);
    }
}
