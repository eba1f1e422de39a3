//! Offline replay harness for the input pipeline.
//!
//! Feeds a capture file of wire lines (`<code>;<0|1>` per line) through a
//! scripted link, the signal listener, and the note resolver, printing
//! every resolved note as JSON. Useful for checking tolerances and
//! binding tables against a recorded session without the controller
//! plugged in.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use fretline::config::InputConfig;
use fretline::link::ScriptedLink;
use fretline::listener::SignalListener;
use fretline::resolver::NoteResolver;

#[derive(Parser, Debug)]
#[command(
    name = "fretline-diag",
    about = "Replay captured guitar telemetry through the input pipeline"
)]
struct Cli {
    /// Capture file with one wire line per row
    capture: PathBuf,

    /// JSON config file (tolerances and note bindings)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listener's edge-detection tolerance
    #[arg(long)]
    listener_tolerance: Option<f64>,

    /// Override the resolver's classification tolerance
    #[arg(long)]
    resolver_tolerance: Option<f64>,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mut config = cli
        .config
        .as_ref()
        .map(InputConfig::load_from_file)
        .unwrap_or_default();
    if let Some(tolerance) = cli.resolver_tolerance {
        config.resolver.tolerance = tolerance;
    }
    let listener_tolerance = cli
        .listener_tolerance
        .unwrap_or(config.listener.tolerance);

    let capture = fs::read_to_string(&cli.capture)
        .with_context(|| format!("reading capture file {}", cli.capture.display()))?;

    let (link, feed) = ScriptedLink::new("replay");
    let listener = SignalListener::with_read_timeout(Duration::from_millis(20));
    listener.set_tolerance(listener_tolerance);
    listener.set_port(Box::new(link))?;

    let (note_tx, note_rx) = mpsc::channel();
    let mut resolver = NoteResolver::from_settings(listener, &config.resolver, move |note| {
        let _ = note_tx.send(note);
    })?;
    resolver.start()?;

    let mut line_count = 0;
    for line in capture.lines() {
        feed.push_line(line);
        line_count += 1;
    }
    // Queued lines drain before the link reports the hang-up, so the
    // worker exits once the replay is done.
    feed.disconnect();

    let mut note_count = 0;
    while let Ok(note) = note_rx.recv_timeout(Duration::from_millis(500)) {
        println!("{}", serde_json::to_string(&note)?);
        note_count += 1;
    }
    resolver.stop();

    eprintln!("{line_count} lines replayed, {note_count} notes resolved");
    Ok(())
}
