//! Per-node received-energy history: an append-only, lazily-pruned ring of
//! `(when, level_dBm, active_transmitters)` samples, consumed by reception
//! to integrate SINR across a frame's duration (§4.5 / §4.6).

use std::collections::VecDeque;

use crate::constants::{BACKGROUND_NOISE, DATA_PACKET_TIME};
use crate::dbm::{sub_dbm, sum_dbm};
use crate::scheduler::SimTime;

/// One timestamped energy-level observation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnergySample {
    pub when: SimTime,
    pub level_dbm: f64,
    pub active_transmitters: u32,
}

/// Append-only ring of energy samples for a single node.
///
/// Invariant: `active_transmitters` never goes negative — decreasing from
/// one active transmitter to zero snaps the level to exactly
/// [`BACKGROUND_NOISE`] rather than subtracting two nearly-equal dBm values
/// (see [`crate::dbm::sub_dbm`]'s doc comment for why that subtraction is
/// unsafe to rely on for an exact zero).
pub struct EnergyHistory {
    samples: VecDeque<EnergySample>,
}

impl EnergyHistory {
    pub fn new(now: SimTime) -> Self {
        let mut samples = VecDeque::with_capacity(8);
        samples.push_back(EnergySample {
            when: now,
            level_dbm: BACKGROUND_NOISE,
            active_transmitters: 0,
        });
        EnergyHistory { samples }
    }

    /// Current (most recent) received power level, in dBm.
    pub fn current_level(&self) -> f64 {
        self.samples.back().expect("always at least one sample").level_dbm
    }

    /// Current number of transmitters this node currently hears.
    pub fn active_transmitters(&self) -> u32 {
        self.samples
            .back()
            .expect("always at least one sample")
            .active_transmitters
    }

    /// Record a new transmitter starting to be heard at power `delta_dbm`.
    pub fn increase(&mut self, now: SimTime, delta_dbm: f64) {
        let cur = self.samples.back().expect("always at least one sample");
        let sample = EnergySample {
            when: now,
            level_dbm: sum_dbm(cur.level_dbm, delta_dbm),
            active_transmitters: cur.active_transmitters + 1,
        };
        self.push(sample, now);
    }

    /// Record a transmitter, previously contributing `delta_dbm`, going
    /// silent. Panics if called with zero active transmitters — that is
    /// the `InvariantViolation` of §7, a fatal bug in the caller, not a
    /// recoverable condition.
    pub fn decrease(&mut self, now: SimTime, delta_dbm: f64) {
        let cur = self.samples.back().expect("always at least one sample");
        assert!(
            cur.active_transmitters > 0,
            "decreaseReceivedEnergy called with active_transmitters == 0"
        );
        let sample = if cur.active_transmitters == 1 {
            EnergySample {
                when: now,
                level_dbm: BACKGROUND_NOISE,
                active_transmitters: 0,
            }
        } else {
            EnergySample {
                when: now,
                level_dbm: sub_dbm(cur.level_dbm, delta_dbm),
                active_transmitters: cur.active_transmitters - 1,
            }
        };
        self.push(sample, now);
    }

    fn push(&mut self, sample: EnergySample, now: SimTime) {
        self.samples.push_back(sample);
        self.prune(now);
    }

    /// Drop samples older than `now - DATA_PACKET_TIME`, always retaining
    /// at least the most recent sample.
    fn prune(&mut self, now: SimTime) {
        let cutoff = now.saturating_sub(DATA_PACKET_TIME);
        while self.samples.len() > 1 {
            let oldest = self.samples.front().expect("len > 1");
            if oldest.when < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Iterate samples from newest to oldest, as required by the SINR
    /// backward walk of §4.5.
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &EnergySample> {
        self.samples.iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_background_noise_with_no_transmitters() {
        let h = EnergyHistory::new(0);
        assert_eq!(h.current_level(), BACKGROUND_NOISE);
        assert_eq!(h.active_transmitters(), 0);
    }

    #[test]
    fn single_increase_then_decrease_snaps_back_to_noise_floor() {
        let mut h = EnergyHistory::new(0);
        h.increase(10, -40.0);
        assert_eq!(h.active_transmitters(), 1);
        assert!(h.current_level() > BACKGROUND_NOISE);
        h.decrease(20, -40.0);
        assert_eq!(h.active_transmitters(), 0);
        assert_eq!(h.current_level(), BACKGROUND_NOISE);
    }

    #[test]
    fn two_overlapping_transmitters_track_count() {
        let mut h = EnergyHistory::new(0);
        h.increase(10, -50.0);
        h.increase(11, -55.0);
        assert_eq!(h.active_transmitters(), 2);
        h.decrease(12, -55.0);
        assert_eq!(h.active_transmitters(), 1);
        h.decrease(13, -50.0);
        assert_eq!(h.active_transmitters(), 0);
        assert_eq!(h.current_level(), BACKGROUND_NOISE);
    }

    #[test]
    fn pruning_keeps_at_least_one_sample() {
        let mut h = EnergyHistory::new(0);
        h.increase(5, -40.0);
        h.decrease(6, -40.0);
        // Advance far beyond DATA_PACKET_TIME with no further activity.
        h.prune(6 + DATA_PACKET_TIME * 10);
        assert_eq!(h.samples.len(), 1);
        assert_eq!(h.current_level(), BACKGROUND_NOISE);
    }

    #[test]
    #[should_panic(expected = "active_transmitters == 0")]
    fn decrease_below_zero_is_an_invariant_violation() {
        let mut h = EnergyHistory::new(0);
        h.decrease(5, -40.0);
    }
}
