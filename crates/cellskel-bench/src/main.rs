//! cellskel-bench: CLI tool for running skeleton sessions and inspecting
//! per-stage diagnostics.
//!
//! Reads a session description (frame size, optional calibration, and a
//! list of hand-drawn contours) from a JSON file, finalizes every cell in
//! order, and prints the per-cell report and the connection log. Useful
//! for:
//!
//! - Checking protrusion counts and lengths for a set of contours
//! - Tuning the closing radius and the blocked-pixel routing cost
//! - Measuring per-stage durations to identify bottlenecks
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin cellskel-bench -- [OPTIONS] <SESSION_JSON>
//! ```
//!
//! # Input
//!
//! ```json
//! {
//!   "width": 128,
//!   "height": 128,
//!   "physical_spacing": 0.25,
//!   "cells": [
//!     { "frame": 0, "contour": [[10, 10], [60, 10], [60, 40], [10, 40]] },
//!     { "frame": 0, "contour": [[50, 20], [90, 20], [90, 50]], "threshold": 4.0 }
//!   ]
//! }
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use cellskel_pipeline::diagnostics::{Clock, SkeletonDiagnostics};
use cellskel_pipeline::{
    Analysis, CellSummary, Connection, Dimensions, Point, SkeletonConfig, SkeletonError,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Cell skeleton and protrusion analysis for hand-drawn contours.
///
/// Finalizes every cell of a session file and prints areas, protrusion
/// lengths and cell-to-cell connections.
#[derive(Parser)]
#[command(name = "cellskel-bench", version)]
struct Cli {
    /// Path to the session JSON file.
    session_json: PathBuf,

    /// Radius of the diamond used to close each rasterized mask (0 disables).
    #[arg(long, default_value_t = SkeletonConfig::DEFAULT_CLOSING_RADIUS)]
    closing_radius: u8,

    /// Cost of routing through a pixel off the skeleton.
    #[arg(long, default_value_t = SkeletonConfig::DEFAULT_BLOCKED_COST)]
    blocked_cost: f64,

    /// Keep every region of the cleaned mask instead of only the largest.
    #[arg(long)]
    no_largest_region: bool,

    /// Print per-stage timing diagnostics for every cell.
    #[arg(long)]
    diagnostics: bool,

    /// Output results as JSON instead of human-readable tables.
    #[arg(long)]
    json: bool,

    /// Full skeleton config as a JSON string.
    ///
    /// When provided, all other config flags are ignored.
    /// The JSON must be a valid `SkeletonConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Session file contents.
#[derive(Deserialize)]
struct SessionInput {
    width: u32,
    height: u32,
    #[serde(default)]
    physical_spacing: Option<f64>,
    cells: Vec<CellInput>,
}

/// One contour to finalize.
#[derive(Deserialize)]
struct CellInput {
    frame: u32,
    contour: Vec<[f64; 2]>,
    /// Body threshold to apply after finalization.
    #[serde(default)]
    threshold: Option<f64>,
}

/// Machine-readable output.
#[derive(Serialize)]
struct Output<'a> {
    cells: Vec<CellSummary>,
    connections: &'a [Connection],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    diagnostics: Vec<SkeletonDiagnostics>,
}

/// Build a [`SkeletonConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<SkeletonConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(SkeletonConfig {
        closing_radius: cli.closing_radius,
        keep_largest_region: !cli.no_largest_region,
        blocked_cost: cli.blocked_cost,
        ..SkeletonConfig::default()
    })
}

fn read_session(path: &Path) -> Result<SessionInput, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("Error parsing {}: {e}", path.display()))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Finalize one cell, optionally timing every stage.
fn run_cell(
    analysis: &mut Analysis,
    cell: CellInput,
    spacing: Option<f64>,
    with_diagnostics: bool,
) -> Result<Option<SkeletonDiagnostics>, SkeletonError> {
    let contour: Vec<Point> = cell.contour.into_iter().map(|[x, y]| Point::new(x, y)).collect();

    let (id, diagnostics) = if with_diagnostics {
        let spacing = cellskel_pipeline::types::resolve_spacing(spacing)?;
        let (geometry, diagnostics) = cellskel_pipeline::process_with_diagnostics(
            contour,
            analysis.dimensions(),
            spacing,
            analysis.config(),
            &StdClock,
        )?;
        (analysis.insert_cell(geometry, cell.frame), Some(diagnostics))
    } else {
        (analysis.finalize_cell(contour, cell.frame, spacing)?, None)
    };

    if let Some(threshold) = cell.threshold {
        analysis.adjust_body_threshold(id, threshold)?;
    }
    Ok(diagnostics)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let session = match read_session(&cli.session_json) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Session: {} ({}x{}, {} cells)",
        cli.session_json.display(),
        session.width,
        session.height,
        session.cells.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!();

    let dimensions = Dimensions {
        width: session.width,
        height: session.height,
    };
    let mut analysis = Analysis::new(dimensions, config);
    let mut all_diagnostics = Vec::new();
    let mut failures = 0_usize;

    for (index, cell) in session.cells.into_iter().enumerate() {
        match run_cell(&mut analysis, cell, session.physical_spacing, cli.diagnostics) {
            Ok(diagnostics) => all_diagnostics.extend(diagnostics),
            Err(e) => {
                tracing::error!(input = index + 1, error = %e, "cell could not be finalized");
                failures += 1;
            }
        }
    }

    if cli.json {
        let output = Output {
            cells: analysis.summaries(),
            connections: analysis.connections(),
            diagnostics: all_diagnostics,
        };
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing output: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        for diagnostics in &all_diagnostics {
            println!("{}", diagnostics.report());
            println!();
        }
        print_cells(&analysis.summaries());
        println!();
        print_connections(analysis.connections());
    }

    if failures > 0 {
        eprintln!("{failures} cell(s) could not be finalized");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print the per-cell table.
fn print_cells(rows: &[CellSummary]) {
    println!("Cells\n{}", "=".repeat(60));
    println!(
        "{:<8} {:>6} {:>12} {:>14}  {}",
        "Cell #", "Frame", "Area", "# Prim. Prot.", "Prim. Prot. Lengths"
    );
    println!("{}", "-".repeat(80));
    for row in rows {
        let lengths = row
            .primary_lengths
            .iter()
            .map(|l| format!("{l:.2}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{:<8} {:>6} {:>12.2} {:>14}  {lengths}",
            row.cell_id, row.frame_index, row.area, row.protrusion_count,
        );
    }
}

/// Print the connection log.
fn print_connections(connections: &[Connection]) {
    println!("Connections\n{}", "=".repeat(60));
    if connections.is_empty() {
        println!("(none)");
        return;
    }
    println!(
        "{:<6} {:>8} {:>8} {:>10} {:>10}",
        "Frame", "Cell A", "Cell B", "X", "Y"
    );
    println!("{}", "-".repeat(46));
    for c in connections {
        println!(
            "{:<6} {:>8} {:>8} {:>10.2} {:>10.2}",
            c.frame_index, c.cell_id_a, c.cell_id_b, c.center_x, c.center_y,
        );
    }
}
