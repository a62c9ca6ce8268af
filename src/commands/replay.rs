//! Replay command implementation.
//!
//! The replay command:
//! 1. Reads a JSON event log of allocation/free samples
//! 2. Feeds it through a profiling session
//! 3. Builds a dump of the stacks still retained
//! 4. Writes the dump and optionally prints a summary
//! 5. Tears the session down

use crate::output::{build_dump, write_dump};
use crate::parser::{read_events, EventLog, SampleEvent};
use crate::session::{ProfilingSession, SessionConfig};
use crate::trie::TrieStats;
use crate::utils::error::SessionError;
use anyhow::{bail, Context, Result};
use log::{debug, info};
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the replay command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct ReplayArgs {
    /// Path to the JSON event log
    pub input: PathBuf,

    /// Output path for the JSON dump (optional)
    pub output_json: Option<PathBuf>,

    /// Drop samples while the trie holds this many nodes
    pub max_live_nodes: Option<usize>,

    /// Number of largest stacks to print in the summary
    pub top_stacks: usize,

    /// Print text summary to stdout
    pub print_summary: bool,
}

impl Default for ReplayArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::from("events.json"),
            output_json: Some(PathBuf::from("callstacks.json")),
            max_live_nodes: None,
            top_stacks: 10,
            print_summary: false,
        }
    }
}

/// What a replay did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub allocations: usize,
    pub frees: usize,
    /// Frees of addresses with no live recorded allocation
    pub unmatched_frees: usize,
    /// Trie size after the log, before teardown
    pub peak_stats: TrieStats,
    /// Nodes left after teardown; anything but zero is a leak
    pub nodes_after_teardown: usize,
}

/// Feed every event of a log through a session
///
/// **Public** - the replay core, usable without touching the filesystem
pub fn replay_events(
    log: &EventLog,
    session: &mut ProfilingSession,
) -> Result<ReplaySummary, SessionError> {
    let mut summary = ReplaySummary {
        events: log.events.len(),
        ..ReplaySummary::default()
    };

    for event in &log.events {
        match event {
            SampleEvent::Alloc {
                address,
                size,
                frames,
                build_ids,
            } => {
                session.record_allocation(*address, *size, frames, build_ids)?;
                summary.allocations += 1;
            }
            SampleEvent::Free { address } => {
                if session.record_free(*address)? {
                    summary.frees += 1;
                } else {
                    summary.unmatched_frees += 1;
                }
            }
        }
    }

    summary.peak_stats = session.trie().stats();
    Ok(summary)
}

/// Validate replay arguments before doing any work
pub fn validate_args(args: &ReplayArgs) -> Result<()> {
    if !args.input.exists() {
        bail!("Input event log does not exist: {}", args.input.display());
    }
    if args.max_live_nodes == Some(0) {
        bail!("--max-nodes must be at least 1");
    }
    Ok(())
}

/// Execute the replay command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Unreadable or malformed event log
/// * Broken session bookkeeping
/// * File write errors
pub fn execute_replay(args: ReplayArgs) -> Result<ReplaySummary> {
    let start_time = Instant::now();

    info!("Step 1/4: Reading event log...");
    let log = read_events(&args.input)
        .with_context(|| format!("Failed to read event log {}", args.input.display()))?;

    let mut config = SessionConfig::new();
    if let Some(max) = args.max_live_nodes {
        config = config.with_max_live_nodes(max);
    }
    let mut session = ProfilingSession::new(config);

    info!("Step 2/4: Replaying {} events...", log.events.len());
    let mut summary = replay_events(&log, &mut session).context("Failed to replay events")?;

    debug!(
        "After replay: {} live nodes, {} frames, {} mappings, {} strings",
        summary.peak_stats.live_nodes,
        summary.peak_stats.interners.frames,
        summary.peak_stats.interners.mappings,
        summary.peak_stats.interners.strings
    );

    info!("Step 3/4: Building callstack dump...");
    let dump = build_dump(&session).context("Failed to build callstack dump")?;

    if let Some(path) = &args.output_json {
        write_dump(&dump, path).context("Failed to write callstack dump")?;
        info!("✓ Dump written to: {}", path.display());
    }

    if args.print_summary {
        print_summary(&session, &summary, args.top_stacks);
    }

    info!("Step 4/4: Tearing down session...");
    session.teardown().context("Failed to tear down session")?;
    summary.nodes_after_teardown = session.trie().node_count();

    info!(
        "Replay completed in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(summary)
}

/// Print a text summary of the replay to stdout
///
/// **Private** - internal helper for execute_replay
fn print_summary(session: &ProfilingSession, summary: &ReplaySummary, top_stacks: usize) {
    let counters = session.counters();

    println!("\n{}", "=".repeat(80));
    println!("REPLAY SUMMARY");
    println!("{}", "=".repeat(80));
    println!("Events:            {}", summary.events);
    println!("Allocations:       {}", summary.allocations);
    println!("Frees:             {}", summary.frees);
    println!("Unmatched frees:   {}", summary.unmatched_frees);
    println!("Dropped samples:   {}", counters.dropped);
    println!("Live allocations:  {}", session.live_allocations());
    println!("Live trie nodes:   {}", summary.peak_stats.live_nodes);
    println!("Interned frames:   {}", summary.peak_stats.interners.frames);
    println!("Interned mappings: {}", summary.peak_stats.interners.mappings);
    println!("Interned strings:  {}", summary.peak_stats.interners.strings);

    let totals = session.callsite_totals();
    if !totals.is_empty() {
        println!("\nTop {} retained stacks:", top_stacks.min(totals.len()));
    }
    for (i, callsite) in totals.iter().take(top_stacks).enumerate() {
        let stack = session
            .trie()
            .resolve_callstack(callsite.node)
            .map(|frames| {
                frames
                    .iter()
                    .rev()
                    .map(|frame| frame.function_name.as_str())
                    .collect::<Vec<_>>()
                    .join(";")
            })
            .unwrap_or_else(|e| format!("<{}>", e));

        println!(
            "  {}. {} bytes in {} allocations: {}",
            i + 1,
            callsite.live_bytes,
            callsite.live_allocations,
            stack
        );
    }
    println!("{}", "=".repeat(80));
}
