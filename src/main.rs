use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::io::Write;
use std::path::PathBuf;

use mspread::protocol::{
    run_simulation, run_simulation_streaming, NetworkConfig, NetworkType, RunOptions,
    SimulationRequest, StreamMessage, StreamSink,
};
use mspread::scenario::load_scenario;
use mspread::spread::MalwareConfig;

/// Malware propagation simulation engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a scenario file (YAML or JSON)
    #[arg(short, long, required_unless_present = "demo")]
    scenario: Option<PathBuf>,

    /// Run the built-in demo simulation instead of a scenario file
    #[arg(long)]
    demo: bool,

    /// Demo: number of devices
    #[arg(long, default_value_t = 30_000)]
    nodes: usize,

    /// Demo: topology family (scale_free, small_world, random, complete)
    #[arg(long, default_value = "scale_free")]
    topology: String,

    /// Demo: malware type label
    #[arg(long, default_value = "worm")]
    malware_type: String,

    /// Demo: per-neighbor infection probability
    #[arg(long, default_value_t = 0.35)]
    rate: f64,

    /// Demo: maximum number of simulation steps
    #[arg(long, default_value_t = 50)]
    steps: u32,

    /// Base seed; omitted means a fresh seed per run
    #[arg(long)]
    seed: Option<u64>,

    /// Emit stream messages as NDJSON instead of one final JSON document
    #[arg(long)]
    stream: bool,
}

struct StdoutSink;

impl StreamSink for StdoutSink {
    fn send(&mut self, message: &StreamMessage) -> bool {
        let mut stdout = std::io::stdout().lock();
        write_ndjson(&mut stdout, message).is_ok()
    }
}

fn write_ndjson(writer: &mut impl Write, message: &StreamMessage) -> std::io::Result<()> {
    serde_json::to_writer(&mut *writer, message)?;
    writeln!(writer)
}

fn demo_request(args: &Args) -> Result<SimulationRequest> {
    let network_type = match args.topology.as_str() {
        "scale_free" => NetworkType::ScaleFree,
        "small_world" => NetworkType::SmallWorld,
        "random" => NetworkType::Random,
        "complete" => NetworkType::Complete,
        other => return Err(eyre!("unknown topology '{other}'")),
    };
    let malware_config = MalwareConfig {
        malware_type: args.malware_type.clone(),
        infection_rate: args.rate,
        ..Default::default()
    };
    Ok(SimulationRequest {
        network_config: NetworkConfig {
            num_nodes: Some(args.nodes),
            network_type,
            device_attributes: None,
            node_definitions: None,
            node_distribution: Default::default(),
            subnets: None,
            interconnects: None,
        },
        malware_config,
        initial_infected: vec!["device_0".to_string()],
        max_steps: args.steps,
    })
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let (request, options) = if args.demo {
        info!(
            "Running demo: {} devices, {} topology, {} at rate {}",
            args.nodes, args.topology, args.malware_type, args.rate
        );
        (demo_request(&args)?, RunOptions { seed: args.seed, max_duration: None })
    } else {
        let path = args.scenario.as_deref().ok_or_else(|| eyre!("no scenario file given"))?;
        let scenario = load_scenario(path)?;
        let mut options = scenario.run_options();
        if args.seed.is_some() {
            options.seed = args.seed;
        }
        (scenario.request, options)
    };

    if args.stream {
        run_simulation_streaming(&request, &options, &mut StdoutSink)?;
        return Ok(());
    }

    let response = run_simulation(&request, &options)?;
    if args.demo {
        info!(
            "Infection reached {}/{} devices ({:.1}%) in {} steps",
            response.total_infected,
            response.total_devices,
            response.infection_percentage,
            response.total_steps
        );
        if let Some(peak) = response
            .history
            .iter()
            .max_by_key(|entry| entry.newly_infected.len())
        {
            info!(
                "Peak velocity: {} new infections at step {}",
                peak.newly_infected.len(),
                peak.step
            );
        }
    } else {
        serde_json::to_writer_pretty(std::io::stdout().lock(), &response)?;
        println!();
    }
    Ok(())
}
