use std::path::PathBuf;
use std::process;

use clap::Parser;

use rust_traffic_assign::{read_tntp_network, solve, AssignError, MsaSettings};

/// Solve logit-based stochastic user equilibrium on a TNTP network with the
/// method of successive averages and Dial's STOCH loading.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// TNTP link (network) file
    link_file: PathBuf,
    /// TNTP trip (demand) file
    trip_file: PathBuf,
    /// logit dispersion parameter; larger values concentrate flow on
    /// cheaper routes
    theta: f64,
    /// MSA step size, in (0, 1]
    lambda: f64,
    /// yaml file overriding the default stopping rules
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn run(args: &Args) -> Result<(), AssignError> {
    let mut network = read_tntp_network(&args.link_file, &args.trip_file)?;
    let settings = match &args.settings {
        Some(path) => MsaSettings::from_yaml_file(path)?,
        None => MsaSettings::default(),
    };

    let stats = solve(&mut network, args.theta, args.lambda, &settings)?;
    if stats.converged {
        log::info!("converged after {} iterations in {:.3} s (flow gap {:.6})",
                   stats.iterations, stats.elapsed_s, stats.flow_gap);
    } else {
        log::warn!("stopped after {} iterations in {:.3} s without reaching \
                    tolerance (flow gap {:.6})",
                   stats.iterations, stats.elapsed_s, stats.flow_gap);
    }
    return Ok(());
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(err) = run(&args) {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}
