use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;

use crate::output::OutputFormat;
use crate::presets::Preset;
use crate::solver::SolverMethod;

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub preset: Preset,
    pub sections: usize,
    pub method: SolverMethod,
    pub output_file: Option<String>,
    pub output_format: OutputFormat,
    pub verbose_level: u8,
}

/// Command line definition for the `esim` binary
pub fn build_cli() -> Command {
    let presets: Vec<&'static str> = Preset::ALL.iter().map(|p| p.name()).collect();

    Command::new("esim")
        .version(crate::VERSION)
        .about("Solve the DC operating point of a built-in linear circuit")
        .arg(
            Arg::new("preset")
                .help("Circuit to solve")
                .required(true)
                .value_parser(presets)
                .index(1),
        )
        .arg(
            Arg::new("sections")
                .short('n')
                .long("sections")
                .value_name("N")
                .default_value("4")
                .value_parser(value_parser!(usize))
                .help("Number of sections for the ladder preset"),
        )
        .arg(
            Arg::new("method")
                .short('m')
                .long("method")
                .value_name("METHOD")
                .default_value("lu")
                .value_parser(["lu", "qr"])
                .help("Dense factorization used by the solver"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output file for simulation results"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .default_value("csv")
                .value_parser(["csv", "json"])
                .help("Output format"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Increase verbosity level"),
        )
}

impl CliArgs {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let preset = matches
            .get_one::<String>("preset")
            .ok_or_else(|| anyhow!("A preset circuit is required"))?
            .parse::<Preset>()
            .map_err(|e| anyhow!(e))?;

        let sections = matches.get_one::<usize>("sections").copied().unwrap_or(4);

        let method = match matches.get_one::<String>("method").map(String::as_str) {
            Some("lu") | None => SolverMethod::Lu,
            Some("qr") => SolverMethod::Qr,
            Some(other) => return Err(anyhow!("Invalid solver method '{}'", other)),
        };

        let output_format = matches
            .get_one::<String>("format")
            .map_or(Ok(OutputFormat::Csv), |f| f.parse::<OutputFormat>())
            .map_err(|e| anyhow!(e))?;

        Ok(CliArgs {
            preset,
            sections,
            method,
            output_file: matches.get_one::<String>("output").cloned(),
            output_format,
            verbose_level: matches.get_count("verbose"),
        })
    }

    /// Log level selected by the number of `-v` flags
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose_level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
