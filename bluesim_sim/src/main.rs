//! BlueSim swarm observer CLI
//!
//! Run study scenarios over a simulated swarm and report the tracker samples.

use bluesim_env::TokioContext;
use bluesim_sim::scenarios::ScenarioId;
use bluesim_sim::{ScenarioResult, ScenarioRunner, SimConfig, SimExport};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// BlueSim swarm observer
#[derive(Parser, Debug)]
#[command(name = "bluesim")]
#[command(about = "Run swarm algorithm studies under the BlueSim observer", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of fish
    #[arg(short, long)]
    fish: Option<usize>,

    /// Scenario to run (info_spread, hop_count, leader_election, mixed, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to run
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Simulated duration in seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// Ticks per second
    #[arg(long)]
    clock_freq: Option<f64>,

    /// JSON config file; flags override its values
    #[arg(short, long)]
    config: Option<String>,

    /// Drive the observer from a wall-clock loop instead of lockstep
    #[arg(long)]
    realtime: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export trajectories and study samples to a JSON file
    #[arg(long)]
    export: Option<String>,
}

impl Args {
    fn sim_config(&self) -> Result<SimConfig, bluesim_env::EnvError> {
        let mut config = match &self.config {
            Some(path) => SimConfig::from_json_file(path)?,
            None => SimConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(fish) = self.fish {
            config.num_fish = fish;
        }
        if let Some(duration) = self.duration {
            config.duration_secs = duration;
        }
        if let Some(freq) = self.clock_freq {
            config.clock_freq = freq;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("BlueSim swarm observer v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let mut config = args.sim_config().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios:");
            for scenario in ScenarioId::all() {
                eprintln!("  {:<16} {}", scenario.name(), scenario.description());
            }
            eprintln!("  {:<16} Run every scenario above", "all");
            std::process::exit(1);
        })]
    };

    if args.export.is_some() && (scenarios.len() > 1 || args.seeds > 1) {
        eprintln!("Error: --export only supports a single scenario and seed");
        std::process::exit(1);
    }

    // Determine base seed
    if config.seed == 0 {
        config.seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42);
    }
    let base_seed = config.seed;

    // Track results
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let runner = ScenarioRunner::new(SimConfig {
            seed: base_seed.wrapping_add(seed_offset as u64),
            ..config.clone()
        });

        for scenario in &scenarios {
            if !args.json {
                info!("▶ {}: {}", scenario.name(), scenario.description());
            }
            let outcome = if args.realtime {
                runner.run_realtime(*scenario, TokioContext::shared()).await
            } else {
                runner.run(*scenario)
            };
            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    error!(
                        "✗ {} (seed={}) aborted: {}",
                        scenario.name(),
                        runner.config().seed,
                        e
                    );
                    std::process::exit(1);
                }
            };

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), result.seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
                for line in result.study.to_string().lines() {
                    info!("  {}", line);
                }
            }

            if let Some(export_path) = &args.export {
                let export = SimExport::from_result(&result, config.clock_freq);
                match export.write_to_file(export_path) {
                    Ok(()) => info!("Exported {} ticks to {}", export.ticks, export_path),
                    Err(e) => error!("Failed to write export: {}", e),
                }
            }

            if !result.passed {
                failed_count += 1;
            }

            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "failure_reason": r.failure_reason,
                    "channel": r.channel,
                    "study": r.study,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            // List failed seeds
            for result in &all_results {
                if !result.passed {
                    error!(
                        "  - {} seed={}: {}",
                        result.scenario.name(),
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
