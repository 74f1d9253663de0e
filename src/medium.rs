//! The shared wireless medium: a precomputed received-power matrix plus the
//! start/stop-transmission notification fan-out (§4.2).

use crate::constants::{ANTENNA_GAIN, ANTENNA_HEIGHT, TRANSMISSION_POWER};
use crate::node;
use crate::world::World;

/// Square matrix of received power in dBm, indexed `[src][dst]`.
///
/// Computed once per node insertion from a free-space-like path loss model
/// (§3): for `d > 0`, `loss_dB = -10*log10(2*G*h^4) + 40*log10(d)`; for
/// self-pairs or `d == 0`, loss is zero. Symmetric by construction since
/// distance is symmetric and the model has no directional term.
pub struct Medium {
    positions: Vec<(u32, f64, f64)>,
    power: Vec<Vec<f64>>,
}

impl Medium {
    pub fn new() -> Self {
        Medium {
            positions: Vec::new(),
            power: Vec::new(),
        }
    }

    /// Register a node at `(x, y)` and extend the power matrix to cover it
    /// against every previously registered node (and itself).
    pub fn add_node(&mut self, id: u32, x: f64, y: f64) {
        let n = self.positions.len();
        for row in &mut self.power {
            row.push(0.0);
        }
        self.power.push(vec![0.0; n + 1]);

        for i in 0..n {
            let (_, ox, oy) = self.positions[i];
            let d = ((x - ox).powi(2) + (y - oy).powi(2)).sqrt();
            let p = received_power(d);
            self.power[n][i] = p;
            self.power[i][n] = p;
        }
        self.power[n][n] = TRANSMISSION_POWER;
        self.positions.push((id, x, y));
    }

    fn index_of(&self, id: u32) -> usize {
        self.positions
            .iter()
            .position(|(nid, _, _)| *nid == id)
            .expect("node id registered with Medium")
    }

    /// Received power in dBm at `dst` when `src` transmits.
    pub fn get_power(&self, src: u32, dst: u32) -> f64 {
        self.power[self.index_of(src)][self.index_of(dst)]
    }

    pub fn distance(&self, a: u32, b: u32) -> f64 {
        let (_, ax, ay) = self.positions[self.index_of(a)];
        let (_, bx, by) = self.positions[self.index_of(b)];
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.positions.iter().map(|(id, ..)| *id)
    }

    pub fn position_of(&self, id: u32) -> (f64, f64) {
        let (_, x, y) = self.positions[self.index_of(id)];
        (x, y)
    }

    /// Notify every registered node (the transmitter included — it hears
    /// its own signal, matching the source behavior) that `transmitter`
    /// just started transmitting.
    pub fn start_transmission(&self, world: &World, transmitter: u32) {
        for dst in self.node_ids() {
            let delta = self.get_power(transmitter, dst);
            node::increase_received_energy(world, dst, delta);
        }
    }

    /// Mirror of [`Medium::start_transmission`] for the end of a
    /// transmission.
    pub fn stop_transmission(&self, world: &World, transmitter: u32) {
        for dst in self.node_ids() {
            let delta = self.get_power(transmitter, dst);
            node::decrease_received_energy(world, dst, delta);
        }
    }
}

impl Default for Medium {
    fn default() -> Self {
        Self::new()
    }
}

/// Free-space-like path loss received power for a separation of `d` meters.
fn received_power(d: f64) -> f64 {
    if d <= 0.0 {
        return TRANSMISSION_POWER;
    }
    let loss_db = -10.0 * (2.0 * ANTENNA_GAIN * ANTENNA_HEIGHT.powi(4)).log10() + 40.0 * d.log10();
    TRANSMISSION_POWER - loss_db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_pair_has_zero_loss() {
        let mut m = Medium::new();
        m.add_node(1, 0.0, 0.0);
        assert_eq!(m.get_power(1, 1), TRANSMISSION_POWER);
    }

    #[test]
    fn matrix_is_symmetric() {
        let mut m = Medium::new();
        m.add_node(1, 0.0, 0.0);
        m.add_node(2, 30.0, 40.0);
        assert_eq!(m.get_power(1, 2), m.get_power(2, 1));
    }

    #[test]
    fn received_power_decreases_with_distance() {
        let near = received_power(10.0);
        let far = received_power(100.0);
        assert!(near > far);
    }

    #[test]
    fn zero_distance_has_zero_loss() {
        let mut m = Medium::new();
        m.add_node(1, 5.0, 5.0);
        m.add_node(2, 5.0, 5.0);
        assert_eq!(m.get_power(1, 2), TRANSMISSION_POWER);
    }
}
