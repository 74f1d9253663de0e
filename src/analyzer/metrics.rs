//! Accumulate decoded log [`crate::analyzer::parser::Event`]s into the
//! delivery/delay/collision tallies §6.7's report is built from.

use std::collections::{HashMap, HashSet};

use super::parser::Event;

/// `(origin_node_id, per-node packet index)` — the same key the simulator's
/// own log uses to correlate a packet's lifecycle across lines (§3).
pub type PacketKey = (u32, u64);

/// Running mean/variance accumulator (Welford's algorithm) so the analyzer
/// never has to hold every delay sample in memory at once.
#[derive(Default, Clone, Copy)]
struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    fn mean(&self) -> f64 {
        self.mean
    }

    fn stdev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }
}

/// Accumulated tallies over an entire event log. Built incrementally by
/// [`Metrics::record`]; [`crate::analyzer::format_report`] renders the final
/// totals.
#[derive(Default)]
pub struct Metrics {
    generated: u64,
    aborted: u64,
    delivered: u64,
    dropped: u64,

    reached_medium_access: HashSet<PacketKey>,
    generated_at: HashMap<PacketKey, f64>,
    delay: RunningStats,

    total_data_attempts: u64,
    total_data_decided: u64,
    total_data_received: u64,
    total_ack_attempts: u64,
    total_ack_received: u64,

    received_without_collision: u64,
    received_despite_collision: u64,
    dropped_with_collision: u64,
}

impl Metrics {
    /// Fold one decoded log event into the running tallies.
    pub fn record(&mut self, event: Event) {
        match event {
            Event::Generated { id, pkt_id, now } => {
                self.generated += 1;
                self.generated_at.insert((id, pkt_id), now);
            }
            Event::Aborted { .. } => {
                self.aborted += 1;
            }
            Event::Deferred { .. } => {
                // Not terminal: the packet is still in flight, see §6.6.
            }
            Event::MediumAccessStart { id, pkt_id, .. } => {
                self.reached_medium_access.insert((id, pkt_id));
            }
            Event::SenderSuccess { id, pkt_id, now } => {
                self.delivered += 1;
                if let Some(&gen_at) = self.generated_at.get(&(id, pkt_id)) {
                    self.delay.push(now - gen_at);
                }
            }
            Event::SenderDrop { .. } => {
                self.dropped += 1;
            }
            Event::DataTransmitAttempt { .. } => {
                self.total_data_attempts += 1;
            }
            Event::AckTransmitAttempt { .. } => {
                self.total_ack_attempts += 1;
            }
            Event::DataReceiveSuccess { max_sim_tx, .. } => {
                self.total_data_decided += 1;
                self.total_data_received += 1;
                if max_sim_tx > 1 {
                    self.received_despite_collision += 1;
                } else {
                    self.received_without_collision += 1;
                }
            }
            Event::DataReceiveDrop { max_sim_tx, .. } => {
                self.total_data_decided += 1;
                if max_sim_tx > 1 {
                    self.dropped_with_collision += 1;
                }
            }
            Event::AckReceiveSuccess { .. } => {
                self.total_ack_received += 1;
            }
        }
    }

    pub fn generated(&self) -> u64 {
        self.generated
    }

    pub fn aborted(&self) -> u64 {
        self.aborted
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn reached_medium_access(&self) -> u64 {
        self.reached_medium_access.len() as u64
    }

    /// Delivery rate with respect to every generated packet.
    pub fn delivery_rate_vs_generated(&self) -> f64 {
        ratio(self.delivered, self.generated)
    }

    /// Delivery rate with respect to packets that at least reached medium
    /// access (i.e. excludes packets that were never scheduled before the
    /// run ended).
    pub fn delivery_rate_vs_medium_access(&self) -> f64 {
        ratio(self.delivered, self.reached_medium_access())
    }

    pub fn mean_delay(&self) -> f64 {
        self.delay.mean()
    }

    pub fn stdev_delay(&self) -> f64 {
        self.delay.stdev()
    }

    /// Fraction of attempted data frames that the AP actually decoded
    /// (accepted or dropped after SINR integration — i.e. reached its
    /// reception decision point).
    pub fn forward_rate(&self) -> f64 {
        ratio(self.total_data_decided, self.total_data_attempts)
    }

    /// Fraction of acks the AP attempted to send that the originating
    /// station actually received.
    pub fn backward_rate(&self) -> f64 {
        ratio(self.total_ack_received, self.total_ack_attempts)
    }

    /// Fraction of attempted data frames that completed a full round trip
    /// (station received the ack).
    pub fn bidirectional_rate(&self) -> f64 {
        ratio(self.total_ack_received, self.total_data_attempts)
    }

    pub fn total_data_attempts(&self) -> u64 {
        self.total_data_attempts
    }

    pub fn total_data_decided(&self) -> u64 {
        self.total_data_decided
    }

    pub fn total_data_received(&self) -> u64 {
        self.total_data_received
    }

    pub fn total_ack_attempts(&self) -> u64 {
        self.total_ack_attempts
    }

    pub fn total_ack_received(&self) -> u64 {
        self.total_ack_received
    }

    pub fn received_without_collision(&self) -> u64 {
        self.received_without_collision
    }

    pub fn received_despite_collision(&self) -> u64 {
        self.received_despite_collision
    }

    pub fn dropped_with_collision(&self) -> u64 {
        self.dropped_with_collision
    }

    /// Fraction of all data reception outcomes at the AP (successful or
    /// dropped) that involved more than one simultaneous transmitter.
    pub fn collision_fraction(&self) -> f64 {
        let affected = self.received_despite_collision + self.dropped_with_collision;
        let total =
            self.received_without_collision + self.received_despite_collision + self.dropped_with_collision;
        ratio(affected, total)
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_rate_counts_generated_and_success() {
        let mut m = Metrics::default();
        m.record(Event::Generated { id: 1, pkt_id: 0, now: 0.0 });
        m.record(Event::Generated { id: 1, pkt_id: 1, now: 10.0 });
        m.record(Event::SenderSuccess { id: 1, pkt_id: 0, now: 500.0 });
        assert_eq!(m.generated(), 2);
        assert_eq!(m.delivered(), 1);
        assert!((m.delivery_rate_vs_generated() - 0.5).abs() < 1e-9);
        assert!((m.mean_delay() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn deferred_is_not_counted_as_dropped() {
        let mut m = Metrics::default();
        m.record(Event::Generated { id: 1, pkt_id: 0, now: 0.0 });
        m.record(Event::Deferred { id: 1, pkt_id: 0, now: 100.0 });
        assert_eq!(m.dropped(), 0);
    }

    #[test]
    fn medium_access_is_deduped_per_packet() {
        let mut m = Metrics::default();
        m.record(Event::MediumAccessStart { id: 1, pkt_id: 0, now: 0.0 });
        m.record(Event::MediumAccessStart { id: 1, pkt_id: 0, now: 400.0 }); // MDs after a retry
        m.record(Event::MediumAccessStart { id: 2, pkt_id: 0, now: 0.0 });
        assert_eq!(m.reached_medium_access(), 2);
    }

    #[test]
    fn collision_breakdown_splits_on_max_sim_tx() {
        let mut m = Metrics::default();
        m.record(Event::DataReceiveSuccess { id: 0, src: 1, pkt_id: 0, now: 0.0, max_sim_tx: 1 });
        m.record(Event::DataReceiveSuccess { id: 0, src: 2, pkt_id: 0, now: 0.0, max_sim_tx: 2 });
        m.record(Event::DataReceiveDrop { id: 0, src: 3, pkt_id: 0, now: 0.0, max_sim_tx: 2 });
        assert_eq!(m.received_without_collision(), 1);
        assert_eq!(m.received_despite_collision(), 1);
        assert_eq!(m.dropped_with_collision(), 1);
        assert!((m.collision_fraction() - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn round_trip_rates_compose_from_attempts_and_acks() {
        let mut m = Metrics::default();
        m.record(Event::DataTransmitAttempt { id: 1, pkt_id: 0, now: 0.0 });
        m.record(Event::DataReceiveSuccess { id: 0, src: 1, pkt_id: 0, now: 100.0, max_sim_tx: 1 });
        m.record(Event::AckTransmitAttempt { src: 0, pkt_id: 0, now: 200.0 });
        m.record(Event::AckReceiveSuccess { id: 1, pkt_id: 0, now: 300.0 });
        assert!((m.backward_rate() - 1.0).abs() < 1e-9);
        assert!((m.bidirectional_rate() - 1.0).abs() < 1e-9);
    }
}
