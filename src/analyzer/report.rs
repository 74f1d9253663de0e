//! Render a [`Metrics`] tally into the human-readable report §6.7 specifies.

use std::fmt::Write;

use super::metrics::Metrics;

/// Format the full report: losses/deliveries, delay, collisions, and
/// forward/backward/bidirectional link-layer rates, in that order.
pub fn format_report(m: &Metrics) -> String {
    let mut out = String::new();

    writeln!(out, "=== Losses and deliveries ===").unwrap();
    writeln!(out, "generated:            {}", m.generated()).unwrap();
    writeln!(out, "reached medium access: {}", m.reached_medium_access()).unwrap();
    writeln!(out, "aborted:              {}", m.aborted()).unwrap();
    writeln!(out, "delivered:            {}", m.delivered()).unwrap();
    writeln!(out, "dropped (retry limit): {}", m.dropped()).unwrap();
    writeln!(
        out,
        "delivery rate (vs generated):      {:.6}",
        m.delivery_rate_vs_generated()
    )
    .unwrap();
    writeln!(
        out,
        "delivery rate (vs medium access):  {:.6}",
        m.delivery_rate_vs_medium_access()
    )
    .unwrap();

    writeln!(out).unwrap();
    writeln!(out, "=== Delay ===").unwrap();
    writeln!(out, "mean end-to-end delay (us):  {:.3}", m.mean_delay()).unwrap();
    writeln!(out, "stdev end-to-end delay (us): {:.3}", m.stdev_delay()).unwrap();

    writeln!(out).unwrap();
    writeln!(out, "=== Collisions ===").unwrap();
    writeln!(
        out,
        "received without collision: {}",
        m.received_without_collision()
    )
    .unwrap();
    writeln!(
        out,
        "received despite collision: {}",
        m.received_despite_collision()
    )
    .unwrap();
    writeln!(out, "dropped with collision:     {}", m.dropped_with_collision()).unwrap();
    writeln!(out, "collision-affected fraction: {:.6}", m.collision_fraction()).unwrap();

    writeln!(out).unwrap();
    writeln!(out, "=== Link-layer delivery ===").unwrap();
    writeln!(
        out,
        "forward (data attempts -> AP decision):   {:.6} ({}/{})",
        m.forward_rate(),
        m.total_data_decided(),
        m.total_data_attempts()
    )
    .unwrap();
    writeln!(
        out,
        "backward (ack attempts -> station rx):    {:.6} ({}/{})",
        m.backward_rate(),
        m.total_ack_received(),
        m.total_ack_attempts()
    )
    .unwrap();
    writeln!(
        out,
        "bidirectional (data attempts -> full RTT): {:.6} ({}/{})",
        m.bidirectional_rate(),
        m.total_ack_received(),
        m.total_data_attempts()
    )
    .unwrap();

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parser::Event;

    #[test]
    fn report_contains_every_section() {
        let mut m = Metrics::default();
        m.record(Event::Generated { id: 1, pkt_id: 0, now: 0.0 });
        m.record(Event::SenderSuccess { id: 1, pkt_id: 0, now: 100.0 });
        let text = format_report(&m);
        assert!(text.contains("Losses and deliveries"));
        assert!(text.contains("Delay"));
        assert!(text.contains("Collisions"));
        assert!(text.contains("Link-layer delivery"));
    }
}
