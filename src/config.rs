//! The simulator's CLI surface (§6.1) and the immutable [`Config`] it
//! produces. Parsed once in `main`, then threaded by reference into every
//! constructor — Medium, the node arena, the scheduler driver, and the
//! topology builder — instead of being read from global state (Design
//! Notes, "Global state").

use clap::Parser;

/// Discrete-event simulator of a RAW-scheduled, CSMA/CA single-hop wireless
/// cell.
#[derive(Parser, Debug, Clone)]
#[command(name = "raw-cell-sim", version, about)]
pub struct Cli {
    /// Number of stations in the simulation.
    #[arg(short = 'n', long = "number-of-stas", default_value_t = 1)]
    pub number_of_stas: u32,

    /// Number of RAW groups in the simulation.
    #[arg(short = 'g', long = "number-of-groups", default_value_t = 1)]
    pub number_of_groups: u32,

    /// Read station grouping information from file; overrides `-g` if set.
    #[arg(short = 'G', long = "groups-from-file")]
    pub groups_from_file: Option<String>,

    /// Length of each group's slot, in microseconds.
    #[arg(short = 'S', long = "slot-size", default_value_t = 50_000)]
    pub slot_size: u64,

    /// Width of the area used for positioning nodes, in meters.
    #[arg(short = 'W', long = "scenario-width", default_value_t = 1000)]
    pub scenario_width: u32,

    /// Height of the area used for positioning nodes, in meters.
    #[arg(short = 'H', long = "scenario-height", default_value_t = 1000)]
    pub scenario_height: u32,

    /// Seed for the pseudo-random number generator; random if unset.
    #[arg(short = 's', long = "seed")]
    pub seed: Option<u64>,

    /// Average packet generation rate for each node, in packets/µs.
    #[arg(short = 'r', long = "rate", default_value_t = 10_000.0)]
    pub rate: f64,

    /// Simulation length, in microseconds.
    #[arg(short = 'l', long = "length", default_value_t = 2e7)]
    pub length: f64,

    /// Output log verbosity.
    #[arg(short = 'v', long = "verbosity", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=4))]
    pub verbosity: u8,

    /// Path to write the simulation event log to; stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,

    /// Create a file with node positions.
    #[arg(long = "print-positions")]
    pub print_positions: Option<String>,

    /// Create a file with PER/power values for each link.
    #[arg(long = "print-per")]
    pub print_per: Option<String>,

    /// Gzip-compress the event log.
    #[arg(short = 'z', long = "zip", default_value_t = false)]
    pub zip: bool,

    /// Write out pairwise path loss for every non-AP station pair.
    #[arg(long = "propagation-model")]
    pub propagation_model: Option<String>,
}

/// Immutable, fully-resolved run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub number_of_stas: u32,
    pub number_of_groups: u32,
    pub groups_from_file: Option<String>,
    pub slot_size: u64,
    pub scenario_width: u32,
    pub scenario_height: u32,
    pub seed: u64,
    pub rate: f64,
    pub length: u64,
    pub verbosity: u8,
    pub output: Option<String>,
    pub print_positions: Option<String>,
    pub print_per: Option<String>,
    pub zip: bool,
    pub propagation_model: Option<String>,
}

impl Config {
    /// Resolve a parsed [`Cli`] into a [`Config`], materializing a random
    /// seed once if the user did not supply one so it can be logged and
    /// reused deterministically for the rest of the run.
    pub fn from_cli(cli: Cli) -> Self {
        let seed = cli.seed.unwrap_or_else(|| rand::random::<u64>() % 100_000_000);
        Config {
            number_of_stas: cli.number_of_stas,
            number_of_groups: cli.number_of_groups.max(1),
            groups_from_file: cli.groups_from_file,
            slot_size: cli.slot_size,
            scenario_width: cli.scenario_width,
            scenario_height: cli.scenario_height,
            seed,
            rate: cli.rate,
            length: cli.length as u64,
            verbosity: cli.verbosity,
            output: cli.output,
            print_positions: cli.print_positions,
            print_per: cli.print_per,
            zip: cli.zip,
            propagation_model: cli.propagation_model,
        }
    }
}
