use colored::*;
use log::{error, info};

use esim::cli::{build_cli, CliArgs};
use esim::output;
use esim::simulator::{Simulator, SimulatorConfig};
use esim::solver::SolverConfig;

fn main() {
    let matches = build_cli().get_matches();

    let args = match CliArgs::from_matches(&matches) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            std::process::exit(2);
        }
    };
    init_logging(&args);

    if let Err(e) = run_application(&args) {
        error!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}

fn init_logging(args: &CliArgs) {
    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();
}

fn run_application(args: &CliArgs) -> anyhow::Result<()> {
    info!("{}", "Starting esim operating point solver".green().bold());
    info!("Preset: {}", args.preset.to_string().bright_blue());

    let mut circuit = args.preset.build(args.sections)?;
    circuit.print_summary();

    let simulator = Simulator::with_config(SimulatorConfig {
        solver_config: SolverConfig {
            method: args.method,
            ..SolverConfig::default()
        },
        ..SimulatorConfig::default()
    });
    let assignment = simulator.simulate(&mut circuit)?;

    if let Some(output_file) = &args.output_file {
        output::export(&assignment, output_file, args.output_format)?;
        info!("Results exported to: {}", output_file.bright_green());
    } else {
        output::print_summary(&assignment)?;
    }

    info!("{}", "Simulation completed successfully!".green().bold());
    Ok(())
}
