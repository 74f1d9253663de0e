//! `raw-cell-sim` — the discrete-event simulator binary.
//!
//! Parses the CLI (§6.1), builds the topology and wires it into a
//! [`World`], spawns one CSMA/CA process per station, and drives the
//! scheduler to the configured run length. All simulator *lifecycle*
//! diagnostics (run configuration, file writes, completion summary) go
//! through the `log`/`env_logger` facade to stderr; the simulation's own
//! event log (§4.7/§6.6) is a separate data-product sink.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

use raw_cell_sim::config::{Cli, Config};
use raw_cell_sim::logger::Logger;
use raw_cell_sim::node::{self, NodeId};
use raw_cell_sim::scheduler::Scheduler;
use raw_cell_sim::topology::{self, AP_ID};
use raw_cell_sim::world::World;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = Config::from_cli(cli);
    info!(
        "starting run: {} stations, {} groups, slot={}us, length={}us, seed={}",
        config.number_of_stas, config.number_of_groups, config.slot_size, config.length, config.seed
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let topology = topology::build(&config, &mut rng).context("building topology")?;

    let logger = match &config.output {
        Some(path) => Logger::to_file(path, config.verbosity, config.zip)
            .with_context(|| format!("creating event log {path}"))?,
        None => Logger::to_stdout(config.verbosity, config.zip),
    };

    let world = World {
        scheduler: Scheduler::new(),
        arena: topology.arena,
        medium: Rc::new(RefCell::new(topology.medium)),
        logger: Rc::new(RefCell::new(logger)),
        config: Rc::new(config.clone()),
        rng: Rc::new(RefCell::new(rng)),
    };

    {
        let mut logger = world.logger.borrow_mut();
        let medium = world.medium.borrow();
        topology::log_power_matrix(&mut logger, &medium);
    }

    let station_ids: Vec<NodeId> = world
        .arena
        .borrow()
        .iter()
        .map(|n| n.id)
        .filter(|&id| id != AP_ID)
        .collect();
    for id in station_ids {
        world.scheduler.spawn(node::run_station(world.clone(), id));
    }

    world.scheduler.run_until(config.length);

    info!(
        "run complete at t={}us ({} stations)",
        world.scheduler.now(),
        config.number_of_stas
    );

    world
        .logger
        .borrow_mut()
        .finish()
        .context("flushing event log")?;

    Ok(())
}
