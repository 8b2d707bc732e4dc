//! modgrid CLI: detect, import and inspect a module file.
//!
//! Usage:
//!   mg-cli path/to/file.mod
//!   mg-cli path/to/fred.intro --patterns
//!   mg-cli path/to/file --format rh

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use mg_formats::{loader_by_id, loaders, DecodeContext, ImportOptions, Loader};
use mg_ir::{FormatSummary, Song};
use modgrid::cell_format::format_cell;

#[derive(Parser)]
#[command(name = "mg-cli")]
#[command(about = "Import a tracker module and print what was recovered")]
struct Args {
    /// Module file to import
    file: Option<PathBuf>,

    /// Force a decoder by id instead of detecting
    #[arg(short, long)]
    format: Option<String>,

    /// Dump every pattern in play order
    #[arg(short, long)]
    patterns: bool,

    /// Rows per pattern for formats stored as event streams
    #[arg(long, default_value_t = 64)]
    rows: u16,

    /// List supported formats and exit
    #[arg(long)]
    list: bool,

    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if args.list {
        for loader in loaders() {
            let hint = loader.hint();
            println!(
                "{:<6} {:<20} .{}{}",
                loader.id(),
                loader.name(),
                hint.extensions.join(" ."),
                if hint.required { "  (name required)" } else { "" }
            );
        }
        return Ok(());
    }

    let Some(path) = args.file else {
        bail!("no input file (see --help)");
    };
    let data = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path.to_string_lossy();
    let options = ImportOptions {
        rows_per_pattern: args.rows.max(1),
        ..Default::default()
    };

    let loader = match &args.format {
        Some(id) => loader_by_id(id).with_context(|| format!("unknown format id '{id}'"))?,
        None => mg_formats::detect(&filename, &data)
            .with_context(|| format!("{}: unrecognized module format", path.display()))?,
    };
    info!("{}: decoding as {}", filename, loader.name());
    let song = loader
        .load(&data, &DecodeContext::new(&filename, &options))
        .with_context(|| format!("failed to import {}", path.display()))?;

    print_summary(&song.summary(loader.name()), &song);
    if args.patterns {
        println!();
        print_patterns(&song);
    }
    Ok(())
}

fn print_summary(summary: &FormatSummary, song: &Song) {
    println!("Format:      {} ({})", summary.format_name, summary.tag);
    println!("Title:       {}", summary.title);
    println!(
        "Channels:    {} (stored {})",
        summary.channels, summary.original_channels
    );
    println!(
        "Patterns:    {} (stored {})",
        summary.patterns, summary.original_patterns
    );
    println!("Orders:      {}", summary.positions);
    println!(
        "Instruments: {} (stored {})",
        summary.instruments, summary.original_instruments
    );
    println!(
        "Tempo:       {} BPM, Speed: {}",
        song.initial_tempo, song.initial_speed
    );

    let silent = song.instruments.iter().filter(|i| i.is_placeholder()).count();
    println!();
    for inst in &song.instruments {
        println!(
            "  {:02X} {:<24} {:<16} vol {:2}",
            inst.id,
            inst.name.as_str(),
            inst.kind().as_str(),
            inst.volume()
        );
    }
    if silent > 0 {
        println!("  ({silent} silent placeholders)");
    }
}

fn print_patterns(song: &Song) {
    for (pos, &index) in song.order.iter().enumerate() {
        let Some(pattern) = song.patterns.get(index as usize) else {
            continue;
        };
        println!("Order {pos:02X} | Pattern {index:02X} | {} rows", pattern.rows);
        for row in 0..pattern.rows {
            let cells: Vec<String> = pattern.row(row).iter().map(format_cell).collect();
            println!("{row:02X} | {}", cells.join(" | "));
        }
        println!();
    }
}
