//! tripmatch CLI - Debug tool for intent grouping and route overlap
//!
//! Usage:
//!   tripmatch-cli group <pool.json> [--user <id>] [--output <file>]
//!   tripmatch-cli overlap <segments.json> [--output <file>]
//!
//! `pool.json` holds `{ "rallyingPoints": [...], "intents": [...] }`; paths are
//! expanded over straight lines between rallying points unless `--osrm` is
//! given. `segments.json` holds a list of `{ "tripIds": [...], "coordinates": [...] }`.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tripmatch::{
    find_crossings, group_intents, match_for_user, truncate_overlapping_segments,
    weighted_coordinate_count, GroupingConfig, InMemoryCatalogue, InterpolatingOracle,
    NoopProgress, OverlapConfig, RallyingPoint, RoutingOracle, StraightLineRoutes, TravelIntent,
    TripSegment, UserId,
};

#[derive(Parser)]
#[command(name = "tripmatch-cli")]
#[command(about = "Debug tool for intent grouping and route overlap", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Group travel intents by shared pass-through points
    Group {
        /// JSON file with rallying points and intents
        input: PathBuf,

        /// Show ranked matches for this user
        #[arg(short, long)]
        user: Option<String>,

        /// Minimum number of users per group
        #[arg(long, default_value = "2")]
        min_group_size: usize,

        /// OSRM endpoint to route with instead of straight lines
        #[cfg(feature = "osrm")]
        #[arg(long)]
        osrm: Option<String>,

        /// Write groups as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge overlapping trip routes
    Overlap {
        /// JSON file with trip segments
        input: PathBuf,

        /// Write merged segments as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntentPool {
    rallying_points: Vec<RallyingPoint>,
    intents: Vec<TravelIntent>,
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        #[cfg(feature = "osrm")]
        Commands::Group {
            input,
            user,
            min_group_size,
            osrm,
            output,
        } => run_group(
            &input,
            user.as_deref(),
            min_group_size,
            osrm.as_deref(),
            output.as_deref(),
            cli.verbose,
        ),
        #[cfg(not(feature = "osrm"))]
        Commands::Group {
            input,
            user,
            min_group_size,
            output,
        } => run_group(
            &input,
            user.as_deref(),
            min_group_size,
            None,
            output.as_deref(),
            cli.verbose,
        ),
        Commands::Overlap { input, output } => run_overlap(&input, output.as_deref(), cli.verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {}", path.display(), e))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    let file = File::create(path).map_err(|e| e.to_string())?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())?;
    println!("\n  Wrote {}", path.display());
    Ok(())
}

fn build_oracle(
    catalogue: Arc<InMemoryCatalogue>,
    osrm: Option<&str>,
) -> Result<Box<dyn RoutingOracle>, String> {
    #[cfg(feature = "osrm")]
    if let Some(endpoint) = osrm {
        let routes = tripmatch::routing::OsrmRoutes::new(endpoint).map_err(|e| e.to_string())?;
        return Ok(Box::new(InterpolatingOracle::new(routes, catalogue)));
    }
    #[cfg(not(feature = "osrm"))]
    let _ = osrm;

    Ok(Box::new(InterpolatingOracle::new(
        StraightLineRoutes::default(),
        catalogue,
    )))
}

/// Run intent grouping
fn run_group(
    input: &Path,
    user: Option<&str>,
    min_group_size: usize,
    osrm: Option<&str>,
    output: Option<&Path>,
    verbose: bool,
) -> Result<(), String> {
    let pool: IntentPool = read_json(input)?;

    println!("\n{}", "=".repeat(60));
    println!("INTENT GROUPING");
    println!("{}", "=".repeat(60));
    println!(
        "  {} rallying points, {} intents",
        pool.rallying_points.len(),
        pool.intents.len()
    );

    let catalogue = Arc::new(InMemoryCatalogue::new(pool.rallying_points));
    let oracle = build_oracle(Arc::clone(&catalogue), osrm)?;
    let config = GroupingConfig { min_group_size };

    let result = group_intents(
        &pool.intents,
        catalogue.as_ref(),
        oracle.as_ref(),
        &config,
        &NoopProgress,
    )
    .map_err(|e| e.to_string())?;

    println!("\n{}", "-".repeat(60));
    println!(
        "RESULTS: Found {} groups ({} intents skipped)",
        result.groups.len(),
        result.skipped.len()
    );
    println!("{}", "-".repeat(60));

    for (i, group) in result.groups.iter().enumerate() {
        println!(
            "\n  Group {} ({} members): {} -> {} ({:.1}km)",
            i + 1,
            group.len(),
            group.p1,
            group.p2,
            group.shared_distance / 1000.0
        );
        for member in &group.members {
            println!(
                "      - {} (user {}, departs {})",
                member.intent, member.user, member.departure
            );
            if verbose {
                println!(
                    "        pickup at {:.1}km, drop at {:.1}km, detour {:.1}km",
                    member.pickup.distance / 1000.0,
                    member.drop.distance / 1000.0,
                    member.detour() / 1000.0
                );
            }
        }
    }

    for skipped in &result.skipped {
        println!("\n  [SKIP] {}: {}", skipped.intent, skipped.error);
    }

    if let Some(user) = user {
        let matches = match_for_user(&UserId::from(user), &result.groups);
        println!("\n{}", "-".repeat(60));
        println!("MATCHES for {}: {}", user, matches.len());
        println!("{}", "-".repeat(60));
        for m in &matches {
            let others: Vec<String> = m.kind.others().iter().map(|o| o.user.to_string()).collect();
            println!(
                "  {} via {} -> {}: with [{}] (dt {}s, size {}, detour {:.1}km)",
                m.intent,
                m.p1,
                m.p2,
                others.join(", "),
                m.score.time_delta,
                m.score.group_size,
                m.score.detour / 1000.0
            );
        }
    }

    if let Some(path) = output {
        write_json(path, &result.groups)?;
    }
    Ok(())
}

/// Run overlap truncation
fn run_overlap(input: &Path, output: Option<&Path>, verbose: bool) -> Result<(), String> {
    let segments: Vec<TripSegment> = read_json(input)?;
    let config = OverlapConfig::default();

    println!("\n{}", "=".repeat(60));
    println!("ROUTE OVERLAP");
    println!("{}", "=".repeat(60));

    let merged = truncate_overlapping_segments(&segments, &config);

    println!(
        "  {} segments -> {} segments",
        segments.len(),
        merged.len()
    );
    println!(
        "  weighted coordinates: {} in, {} out",
        weighted_coordinate_count(&segments, &config),
        merged.iter().map(TripSegment::weighted_len).sum::<usize>()
    );

    if verbose {
        for (i, segment) in merged.iter().enumerate() {
            let ids: Vec<&str> = segment.trip_ids.iter().map(|t| t.as_str()).collect();
            println!(
                "    [{}] {} coordinates, trips [{}]",
                i,
                segment.len(),
                ids.join(", ")
            );
        }
    }

    let crossings = find_crossings(&merged);
    println!("  {} crossings", crossings.len());
    if verbose {
        for c in &crossings {
            println!(
                "    segments {} x {} at ({:.6}, {:.6})",
                c.first, c.second, c.point.lat, c.point.lng
            );
        }
    }

    if let Some(path) = output {
        write_json(path, &merged)?;
    }
    Ok(())
}
