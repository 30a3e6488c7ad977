//! CLI definitions and entry point

use clap::{Args, Parser, Subcommand};

use crate::commands;
use mus::output::OutputMode;

/// mus - expand command templates and run them incrementally
#[derive(Parser, Debug)]
#[command(
    name = "mus",
    version,
    about = "Expand command templates and run them incrementally",
    long_about = "Expand a command template over files, ranges and lists, skip the jobs\n\
                  whose outputs are already up to date, and run the rest in parallel.\n\n\
                  Slots are written :expression: (input) and :>pattern: (output), e.g.\n\n    \
                  mus run gzip -c :*.txt: \\> :>*.txt.gz:"
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output in JSON format (machine-readable)
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Expand a macro and run its jobs
    Run(RunArgs),

    /// List saved macros
    List,

    /// Show a saved macro
    Show {
        /// Macro name
        name: String,
    },

    /// Delete a saved macro
    Delete {
        /// Macro name
        name: String,
    },

    /// Show version
    Version,
}

/// Options of `mus run`
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Number of jobs to run at once (default: configured, else CPU count)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Run at most this many jobs (zero or negative: no limit)
    #[arg(short = 'n', long = "max-jobs", allow_negative_numbers = true)]
    pub max_jobs: Option<i64>,

    /// Run jobs even when their outputs are up to date
    #[arg(short, long)]
    pub force: bool,

    /// Print the jobs that would run without running them
    #[arg(short = 'd', long)]
    pub dry_run: bool,

    /// Like --dry-run, also showing slot values and tracked files
    #[arg(short = 'D', long)]
    pub dry_run_extra: bool,

    /// Save the macro under this name before running it
    #[arg(short, long, value_name = "NAME")]
    pub save: Option<String>,

    /// Load a saved macro instead of giving one
    #[arg(short, long, value_name = "NAME", conflicts_with = "raw")]
    pub load: Option<String>,

    /// Describe how the macro is parsed, then stop
    #[arg(short = 'e', long)]
    pub explain: bool,

    /// The macro; `!<id prefix>` recalls one from history
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "MACRO")]
    pub raw: Vec<String>,
}

/// Run the CLI
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match cli.command {
        Some(Command::Run(args)) => commands::run(&args, output_mode),
        Some(Command::List) => commands::list(output_mode),
        Some(Command::Show { name }) => commands::show(&name, output_mode),
        Some(Command::Delete { name }) => commands::delete(&name, output_mode),
        Some(Command::Version) => {
            if output_mode == OutputMode::Json {
                println!(
                    "{}",
                    serde_json::json!({
                        "version": mus::VERSION
                    })
                );
            } else {
                println!("mus v{}", mus::VERSION);
            }
            Ok(())
        },
        None => {
            if output_mode == OutputMode::Json {
                println!(
                    "{}",
                    serde_json::json!({
                        "version": mus::VERSION,
                        "hint": "Use --help for usage"
                    })
                );
            } else {
                println!("mus v{}", mus::VERSION);
                println!("\nRun 'mus --help' for usage");
                println!("Run 'mus run echo :*:' to get started");
            }
            Ok(())
        },
    }
}
