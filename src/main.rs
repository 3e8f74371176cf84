//! Sessiontap CLI

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};
use sessiontap::config::RecorderConfig;
use sessiontap::event::{Event, EventSummary};
use sessiontap::replay::{format_time, ReplayCorrelator};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "inspect" => match args.get(2) {
            Some(path) => inspect(Path::new(path)),
            None => {
                eprintln!("Usage: sessiontap inspect <events.json>");
                process::exit(1);
            }
        },
        "replay" => match (args.get(2), args.get(3)) {
            (Some(path), Some(position)) => replay(Path::new(path), position),
            _ => {
                eprintln!("Usage: sessiontap replay <events.json> <seconds>");
                process::exit(1);
            }
        },
        "config" => match args.get(2) {
            Some(path) => show_config(&PathBuf::from(path)),
            None => {
                eprintln!("Usage: sessiontap config <file.toml>");
                process::exit(1);
            }
        },
        command => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'sessiontap' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn usage() {
    eprintln!("Sessiontap v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: sessiontap <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  inspect   Summarize a recorded event timeline");
    eprintln!("  replay    Show the events visible at a playback position");
    eprintln!("  config    Validate a recorder config file");
}

fn load_events(path: &Path) -> anyhow::Result<Vec<Event>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not an event timeline", path.display()))
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let events = load_events(path)?;
    let summary = EventSummary::from_events(&events);

    println!("Timeline: {}", path.display());
    println!("Events:   {}", summary.total());
    for (kind, count) in summary.counts() {
        println!("  {kind:<10} {count}");
    }
    if let (Some(first), Some(last)) = (
        events.iter().map(Event::timestamp).min(),
        events.iter().map(Event::timestamp).max(),
    ) {
        println!(
            "Span:     {} - {}",
            format_time(first as f64 / 1000.0),
            format_time(last as f64 / 1000.0)
        );
    }
    Ok(())
}

fn replay(path: &Path, position: &str) -> anyhow::Result<()> {
    let seconds: f64 = position
        .parse()
        .with_context(|| format!("invalid playback position: {position}"))?;
    if !seconds.is_finite() || seconds < 0.0 {
        bail!("playback position must be a non-negative number of seconds");
    }

    let mut correlator = ReplayCorrelator::default();
    correlator.load(None, load_events(path)?)?;
    correlator.on_time_update(seconds);

    let view = correlator.view();
    println!(
        "{} of {} events visible at {}",
        view.visible_events.len(),
        correlator.events().len(),
        format_time(view.current_time)
    );
    for event in view.visible_events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

fn show_config(path: &Path) -> anyhow::Result<()> {
    let config = RecorderConfig::from_file(path)?;
    config.validate()?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
