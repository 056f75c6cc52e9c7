//! Resolve a scheduled prompt and print its segments.
//!
//! # Examples
//!
//! ```sh
//! # Show which text is active over a 20-step schedule
//! prompt-schedule --prompt "a photo of a [cat:dog:0.5]"
//!
//! # Alternation over 6 steps, as JSON
//! prompt-schedule --prompt "[red|blue] car" --steps 6 --json
//!
//! # Run the hash encoder as well and report sequence lengths
//! prompt-schedule --prompt "castle<break>[day:night:12]" --steps 24 --encode
//!
//! # Read the prompt from stdin
//! cat prompt.txt | prompt-schedule --stdin --steps 30
//! ```

use std::io::{self, Read};
use std::process;

use clap::Parser;
use prompt_schedule::prelude::*;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Resolve a scheduled prompt and print its segments.
#[derive(Parser)]
#[command(name = "prompt-schedule")]
struct Cli {
    // ── Input ──────────────────────────────────────────────────
    /// Prompt text with bracket directives
    #[arg(long)]
    prompt: Option<String>,

    /// Read the prompt from stdin
    #[arg(long)]
    stdin: bool,

    /// Number of sampling steps the schedule covers
    #[arg(long, default_value_t = 20)]
    steps: usize,

    // ── Parsing ────────────────────────────────────────────────
    /// Token that splits a text into separately encoded parts
    #[arg(long, default_value = DEFAULT_BREAK_TOKEN)]
    break_token: String,

    /// Do not split on a break token
    #[arg(long)]
    no_break: bool,

    /// Only allow escaping of \, [ and ]
    #[arg(long)]
    basic_escapes: bool,

    /// Maximum nesting depth of directives
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    // ── Encoding ───────────────────────────────────────────────
    /// Encode each segment with the hash encoder
    #[arg(long)]
    encode: bool,

    /// Row width of the hash encoder (with --encode)
    #[arg(long, default_value_t = 8)]
    dim: usize,

    /// Encode distinct texts one after another (with --encode)
    #[arg(long)]
    sequential: bool,

    // ── Output ─────────────────────────────────────────────────
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Log compile events to stderr
    #[arg(long, short)]
    verbose: bool,
}

/// One row of encoded output.
#[derive(Serialize)]
struct EncodedRow<'a> {
    text: &'a str,
    start_percent: f64,
    end_percent: f64,
    sequence_len: usize,
    pooled: &'a [f32],
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn read_prompt(cli: &Cli) -> Result<String, String> {
    match (&cli.prompt, cli.stdin) {
        (Some(p), false) => Ok(p.clone()),
        (None, true) => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("failed to read stdin: {e}"))?;
            Ok(buf.trim_end_matches(['\r', '\n']).to_string())
        }
        (Some(_), true) => Err("use either --prompt or --stdin, not both".to_string()),
        (None, false) => Err("provide --prompt or --stdin".to_string()),
    }
}

fn build_config(cli: &Cli) -> CompileConfig {
    let break_token = (!cli.no_break).then(|| cli.break_token.clone());
    let dialect = if cli.basic_escapes {
        EscapeDialect::Basic
    } else {
        EscapeDialect::Extended
    };
    CompileConfig::default()
        .with_dialect(dialect)
        .with_break_token(break_token)
        .with_max_depth(cli.max_depth)
        .with_parallel_encode(!cli.sequential)
}

fn print_schedule(schedule: &Schedule, json: bool) -> Result<(), String> {
    if json {
        let out = serde_json::to_string_pretty(schedule)
            .map_err(|e| format!("failed to serialize schedule: {e}"))?;
        println!("{out}");
        return Ok(());
    }
    println!(
        "{} step(s), {} directive(s), {} segment(s){}",
        schedule.steps,
        schedule.directives,
        schedule.segments.len(),
        if schedule.unterminated {
            " (unclosed bracket kept as text)"
        } else {
            ""
        }
    );
    for segment in &schedule.segments {
        println!(
            "  [{:>6.3} .. {:>6.3}]  steps {:>3}..{:<3}  {:?}",
            segment.start_percent,
            segment.end_percent,
            segment.start_step,
            segment.end_step,
            segment.text
        );
    }
    Ok(())
}

fn print_encoded(records: &[ConditioningRecord<SequenceEmbedding>], json: bool) -> Result<(), String> {
    let rows: Vec<EncodedRow<'_>> = records
        .iter()
        .map(|r| EncodedRow {
            text: &r.text,
            start_percent: r.start_percent,
            end_percent: r.end_percent,
            sequence_len: r.conditioning.len(),
            pooled: &r.conditioning.pooled,
        })
        .collect();

    if json {
        let out = serde_json::to_string_pretty(&rows)
            .map_err(|e| format!("failed to serialize records: {e}"))?;
        println!("{out}");
        return Ok(());
    }
    for row in &rows {
        println!(
            "  [{:>6.3} .. {:>6.3}]  {:>3} row(s)  {:?}",
            row.start_percent, row.end_percent, row.sequence_len, row.text
        );
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), String> {
    let prompt = read_prompt(&cli)?;
    let config = build_config(&cli);
    debug!("compiling {} chars over {} steps", prompt.len(), cli.steps);

    let encoder = HashEncoder::new(cli.dim);
    let compiler = ScheduleCompiler::new(&encoder, config).with_event_handler(&LoggingHandler);

    if !cli.encode {
        let schedule = compiler.plan(&prompt, cli.steps).map_err(|e| e.to_string())?;
        return print_schedule(&schedule, cli.json);
    }

    let records = compiler
        .compile_async(&prompt, cli.steps)
        .await
        .map_err(|e| e.to_string())?;
    print_encoded(&records, cli.json)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
