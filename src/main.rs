//! Gray-Scott CLI - Run a session headlessly from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use gray_scott::{
    FieldStats, SessionConfig, SessionHost,
    archive::{ArchiveOptions, CompressionType},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [steps] [archive.gsha]", args[0]);
        eprintln!();
        eprintln!("Run a Gray-Scott session from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json   Path to session configuration file");
        eprintln!("  steps         Number of simulation steps (default: 1000)");
        eprintln!("  archive.gsha  Write the recorded history to this file");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);
    let steps: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1000);
    let archive_path = args.get(3).map(PathBuf::from);

    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: SessionConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    println!("Gray-Scott Simulation");
    println!("=====================");
    println!("Grid: {}x{}", config.rows, config.cols);
    println!("Pattern: {}", config.pattern.name());
    println!(
        "Da={} Db={} F={} k={} dt={} noise={}",
        config.params.da,
        config.params.db,
        config.params.f,
        config.params.k,
        config.params.dt,
        config.params.noise
    );
    println!("Steps: {}", steps);
    println!();

    let host = SessionHost::with_session(config).unwrap_or_else(|e| {
        eprintln!("Error creating session: {}", e);
        std::process::exit(1);
    });

    if let Ok(stats) = host.stats() {
        println!("Initial state:");
        print_stats(&stats);
        println!();
    }

    println!("Running simulation...");
    let start = Instant::now();
    if let Err(e) = host.spawn_batch(steps) {
        eprintln!("Error starting batch: {}", e);
        std::process::exit(1);
    }

    // Print progress every 10%
    let report_every = (steps / 10).max(1);
    let mut next_report = report_every;
    while host.batch_status().running {
        let status = host.batch_status();
        if status.completed >= next_report {
            let elapsed = start.elapsed().as_secs_f32();
            println!(
                "  Step {}/{}: {:.1} steps/s",
                status.completed,
                steps,
                status.completed as f32 / elapsed
            );
            next_report = (status.completed / report_every + 1) * report_every;
        }
        thread::sleep(Duration::from_millis(20));
    }

    let report = match host.wait_batch() {
        Some(Ok(report)) => report,
        Some(Err(e)) => {
            eprintln!("Simulation failed: {}", e);
            std::process::exit(1);
        }
        None => {
            eprintln!("Simulation batch did not run");
            std::process::exit(1);
        }
    };
    let elapsed = start.elapsed();

    if let Ok(stats) = host.stats() {
        println!();
        println!("Final state (step {}):", report.final_step);
        print_stats(&stats);
    }
    println!();
    println!(
        "Time: {:.2}s ({:.1} steps/s)",
        elapsed.as_secs_f32(),
        report.completed as f32 / elapsed.as_secs_f32()
    );

    if let Some(path) = archive_path {
        let options = ArchiveOptions {
            compression: if cfg!(feature = "lz4") {
                CompressionType::Lz4
            } else {
                CompressionType::None
            },
            ..Default::default()
        };
        match host.export_history(&path, 1, options) {
            Ok(stats) => println!("History written to {}: {}", path.display(), stats),
            Err(e) => {
                eprintln!("Error writing history: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn print_stats(stats: &FieldStats) {
    println!(
        "  Activator: mean={:.6}, range=[{:.6}, {:.6}]",
        stats.activator.mean, stats.activator.min, stats.activator.max
    );
    println!(
        "  Inhibitor: mean={:.6}, range=[{:.6}, {:.6}]",
        stats.inhibitor.mean, stats.inhibitor.min, stats.inhibitor.max
    );
    println!("  Active cells: {}", stats.active_cells);
}

fn print_example_config() {
    let config = SessionConfig::default();
    match serde_json::to_string_pretty(&config) {
        Ok(json) => {
            println!("Example configuration (config.json):");
            println!("{}", json);
        }
        Err(e) => {
            eprintln!("Error serializing example config: {}", e);
            std::process::exit(1);
        }
    }
}
