//! callstack-trie CLI
//!
//! Replays recorded allocation samples through the callstack deduplication
//! engine and writes id-keyed dumps of the stacks that remain retained.

use anyhow::Result;
use callstack_trie::commands::{
    display_version, execute_replay, validate_args, validate_dump_file, ReplayArgs,
};
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

/// callstack-trie - call-stack deduplication for heap profilers
#[derive(Parser, Debug)]
#[command(name = "callstack-trie")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay an allocation event log through a profiling session
    Replay {
        /// Path to the JSON event log
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the JSON callstack dump
        #[arg(short, long, default_value = "callstacks.json")]
        output: PathBuf,

        /// Skip writing the dump
        #[arg(long)]
        no_output: bool,

        /// Drop samples while the trie holds this many nodes
        #[arg(long, env = "CALLSTACK_TRIE_MAX_NODES")]
        max_nodes: Option<usize>,

        /// Number of largest stacks to list in the summary
        #[arg(long, default_value = "10")]
        top_stacks: usize,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// Validate a callstack dump JSON file
    Validate {
        /// Path to dump JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Replay {
            input,
            output,
            no_output,
            max_nodes,
            top_stacks,
            summary,
        } => {
            let args = ReplayArgs {
                input,
                output_json: (!no_output).then_some(output),
                max_live_nodes: max_nodes,
                top_stacks,
                print_summary: summary,
            };

            validate_args(&args)?;
            let result = execute_replay(args)?;

            if result.nodes_after_teardown != 0 {
                anyhow::bail!(
                    "{} trie nodes leaked after teardown",
                    result.nodes_after_teardown
                );
            }
        }

        Commands::Validate { file } => {
            validate_dump_file(file)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
