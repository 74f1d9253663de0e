//! One-shot setup: parse or generate node positions and group assignments,
//! wire them into the [`Medium`] and node [`Arena`], and write the optional
//! positions/PER-dump/propagation-model files (§4.6, §6.2–§6.5).

use std::fs;
use std::io::Write;

use anyhow::{Context, Result};
use rand::Rng;
use rand::rngs::StdRng;

use crate::config::Config;
use crate::constants::{ANTENNA_GAIN, ANTENNA_HEIGHT};
use crate::error::SimError;
use crate::medium::Medium;
use crate::node::{Arena, NodeState};

pub const AP_ID: u32 = 0;

/// One station's resolved position and group, before it is wired into the
/// arena/medium (positions-file writer needs this plain data before a
/// `NodeState` — with its energy history anchored to `now == 0` — exists).
struct PlacedStation {
    id: u32,
    x: f64,
    y: f64,
    group: u32,
}

/// Parse a `C[XXX, YYY]` groups file into `(group, x, y)` triples, one per
/// line, assigning node ids `1..=N` in file order (§6.2).
fn parse_groups_file(path: &str) -> Result<Vec<(u32, f64, f64)>> {
    let contents: String = fs::read_to_string(path).map_err(SimError::from)?;
    let mut out = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let cleaned = line.replace(['[', ']', ','], " ");
        let fields: Vec<&str> = cleaned.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(SimError::InputParse {
                path: path.to_string(),
                line: lineno + 1,
                reason: format!("expected `C[X, Y]`, got {line:?}"),
            }
            .into());
        }
        let parse_field = |s: &str, what: &str| -> Result<f64> {
            s.parse().map_err(|_| {
                SimError::InputParse {
                    path: path.to_string(),
                    line: lineno + 1,
                    reason: format!("bad {what} {s:?}"),
                }
                .into()
            })
        };
        let group = parse_field(fields[0], "group id")? as u32;
        let x = parse_field(fields[1], "x coordinate")?.trunc();
        let y = parse_field(fields[2], "y coordinate")?.trunc();
        out.push((group, x, y));
    }
    Ok(out)
}

/// Resolve the set of stations (not the AP) for this run: either from a
/// groups file, or randomly placed with round-robin group assignment and
/// rejection of duplicate integer coordinates (§6.2, Design Notes).
fn place_stations(config: &Config, rng: &mut StdRng) -> Result<Vec<PlacedStation>> {
    if let Some(path) = &config.groups_from_file {
        let rows = parse_groups_file(path)?;
        return Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, (group, x, y))| PlacedStation {
                id: i as u32 + 1,
                x,
                y,
                group,
            })
            .collect());
    }

    let mut used = std::collections::HashSet::new();
    let mut stations = Vec::with_capacity(config.number_of_stas as usize);
    for i in 0..config.number_of_stas {
        let (x, y) = loop {
            let x = rng.gen_range(0..=config.scenario_width) as f64;
            let y = rng.gen_range(0..=config.scenario_height) as f64;
            if used.insert((x as i64, y as i64)) {
                break (x, y);
            }
        };
        stations.push(PlacedStation {
            id: i + 1,
            x,
            y,
            group: i % config.number_of_groups,
        });
    }
    Ok(stations)
}

/// Everything the main binary needs after setup: the wired medium, the
/// populated node arena, and the AP's id (always [`AP_ID`]).
pub struct Topology {
    pub medium: Medium,
    pub arena: Arena,
}

/// Build the AP and every station, registering each with `medium` and
/// seeding the node arena, optionally writing the positions file as it goes
/// (§6.3).
pub fn build(config: &Config, rng: &mut StdRng) -> Result<Topology> {
    let mut medium = Medium::new();
    let arena = crate::node::new_arena();

    let ap_x = config.scenario_width as f64 / 2.0;
    let ap_y = config.scenario_height as f64 / 2.0;
    medium.add_node(AP_ID, ap_x, ap_y);
    arena.borrow_mut().push(NodeState::new(AP_ID, (ap_x, ap_y), None, 0));

    let stations = place_stations(config, rng)?;

    let mut positions_file = match &config.print_positions {
        Some(path) => Some(
            fs::File::create(path).with_context(|| format!("creating positions file {path}"))?,
        ),
        None => None,
    };
    if let Some(f) = &mut positions_file {
        writeln!(f, "ap {ap_x} {ap_y}")?;
    }

    for st in &stations {
        medium.add_node(st.id, st.x, st.y);
        arena
            .borrow_mut()
            .push(NodeState::new(st.id, (st.x, st.y), Some(st.group), 0));
        if let Some(f) = &mut positions_file {
            writeln!(f, "{} {} {}", st.id, st.x, st.y)?;
        }
    }

    if let Some(path) = &config.print_per {
        write_per_dump(path, &medium, &stations)?;
    }
    if let Some(path) = &config.propagation_model {
        write_propagation_model(path, config, &stations)?;
    }

    Ok(Topology { medium, arena })
}

/// One line per ordered pair `(i, j)` of registered nodes, including
/// self-pairs: `j->i j i value` (§6.4). The AP participates as node 0 like
/// any other registered node.
fn write_per_dump(path: &str, medium: &Medium, stations: &[PlacedStation]) -> Result<()> {
    let mut f = fs::File::create(path).with_context(|| format!("creating PER dump {path}"))?;
    let mut ids: Vec<u32> = std::iter::once(AP_ID).chain(stations.iter().map(|s| s.id)).collect();
    ids.sort_unstable();
    for &i in &ids {
        for &j in &ids {
            let value = medium.get_power(j, i);
            writeln!(f, "{j}->{i} {j} {i} {value}")?;
        }
    }
    Ok(())
}

/// First line: station count. Then one line per ordered non-AP pair:
/// `a->b a b distance loss_dB`, sorted by the textual `a->b` id (§6.5).
fn write_propagation_model(
    path: &str,
    config: &Config,
    stations: &[PlacedStation],
) -> Result<()> {
    let mut f =
        fs::File::create(path).with_context(|| format!("creating propagation model {path}"))?;
    writeln!(f, "{}", config.number_of_stas)?;

    let mut rows: Vec<(String, u32, u32, f64, f64)> = Vec::new();
    for a in stations {
        for b in stations {
            if a.id == b.id {
                continue;
            }
            let dist = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
            let loss_db = if dist == 0.0 {
                0.0
            } else {
                -10.0 * (2.0 * ANTENNA_GAIN * ANTENNA_HEIGHT.powi(4)).log10() + 40.0 * dist.log10()
            };
            rows.push((format!("{}->{}", a.id, b.id), a.id, b.id, dist, loss_db));
        }
    }
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    for (id, a, b, dist, loss) in rows {
        writeln!(f, "{id} {a} {b} {dist} {loss}")?;
    }
    Ok(())
}

/// Emit one `PM src -> dst @ power_dBm` line per ordered pair of distinct
/// registered nodes, at verbosity 3, matching the simulator's power-matrix
/// debug dump.
pub fn log_power_matrix(logger: &mut crate::logger::Logger, medium: &Medium) {
    let ids: Vec<u32> = medium.node_ids().collect();
    for &i in &ids {
        for &j in &ids {
            if i == j {
                continue;
            }
            let power = medium.get_power(i, j);
            crate::sim_log!(logger, "PM", 3, "{i} -> {j} @ {power}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_c_bracket_groups_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.txt");
        fs::write(&path, "0[10, 20]\n1[30.5, 40.0]\n").unwrap();
        let rows = parse_groups_file(path.to_str().unwrap()).unwrap();
        assert_eq!(rows, vec![(0, 10.0, 20.0), (1, 30.0, 40.0)]);
    }

    #[test]
    fn rejects_malformed_groups_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.txt");
        fs::write(&path, "not a valid line\n").unwrap();
        assert!(parse_groups_file(path.to_str().unwrap()).is_err());
    }
}
