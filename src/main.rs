//! oftrace CLI entry point.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use oftrace::cli::{write_backlog, Args, OutputFormatter};
use oftrace_core::io::{FilePacketSource, PacketSource, StreamPacketSource};
use oftrace_core::OfTrace;

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    if args.reads_stdin() {
        let source = StreamPacketSource::new(io::stdin().lock())
            .context("Failed to read capture from stdin")?;
        run(source, &args)
    } else {
        let source = FilePacketSource::open(&args.file)
            .with_context(|| format!("Failed to open capture file: {}", args.file.display()))?;
        run(source, &args)
    }
}

fn run<S: PacketSource>(source: S, args: &Args) -> Result<()> {
    let mut trace = OfTrace::with_source(source, args.filter(), args.stream_config())
        .context("Failed to start trace")?;

    let progress = args.progress.then(|| progress_bar(trace.progress().is_some()));
    let mut formatter = OutputFormatter::new(args.format);
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let mut count: u64 = 0;

    loop {
        match trace.next_message() {
            Ok(Some(msg)) => {
                formatter.write_message(&msg, &mut out)?;
                count += 1;
            }
            Ok(None) => break,
            Err(e) if e.is_recoverable() => warn!(error = %e, "Dropped session"),
            Err(e) => return Err(e).context("Failed reading capture"),
        }

        if let Some(pb) = &progress {
            match trace.progress() {
                Some(fraction) => pb.set_position((fraction * 1000.0) as u64),
                None => pb.set_message(format!("{count} messages")),
            }
        }
    }

    formatter.finish(&mut out)?;
    out.flush()?;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    info!(stats = ?trace.stats(), "Trace complete");
    eprintln!("Total OpenFlow Messages: {count}");

    if args.backlog {
        write_backlog(&trace.session_backlog(), &mut io::stderr())?;
    }
    Ok(())
}

/// Bar when the fraction consumed is knowable, spinner otherwise.
fn progress_bar(known: bool) -> ProgressBar {
    if known {
        let pb = ProgressBar::new(1000);
        if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {percent:>3}% [{elapsed_precise}]") {
            pb.set_style(style);
        }
        pb
    } else {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}") {
            pb.set_style(style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
        }
        pb
    }
}
