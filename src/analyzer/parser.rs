//! Tolerant line-oriented parser for the simulation event log (§6.6).
//!
//! Only the kinds the report actually needs are decoded into a typed
//! [`Event`]; every other kind (and any malformed line of a kind we do
//! care about) is simply skipped, per §6.6's "analyzer tolerates unknown
//! kinds" and §7's non-fatal-parse-error rule.

/// A decoded, report-relevant log line. `id` is always the node-scoped
/// `_id_` the line starts with; `pkt_id` is the packet index.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Generated { id: u32, pkt_id: u64, now: f64 },
    Aborted { id: u32, pkt_id: u64, now: f64 },
    /// Station deferred this packet to a later group slot. Not terminal —
    /// the packet is still in flight, unlike [`Event::SenderDrop`]. Carries
    /// the same `D` kind as a retry-limit drop but with a trailing
    /// `timeToGroup` field that distinguishes the two (§6.6).
    Deferred { id: u32, pkt_id: u64, now: f64 },
    MediumAccessStart { id: u32, pkt_id: u64, now: f64 },
    SenderSuccess { id: u32, pkt_id: u64, now: f64 },
    SenderDrop { id: u32, pkt_id: u64, now: f64 },
    DataTransmitAttempt { id: u32, pkt_id: u64, now: f64 },
    AckTransmitAttempt { src: u32, pkt_id: u64, now: f64 },
    DataReceiveSuccess { id: u32, src: u32, pkt_id: u64, now: f64, max_sim_tx: u32 },
    DataReceiveDrop { id: u32, src: u32, pkt_id: u64, now: f64, max_sim_tx: u32 },
    AckReceiveSuccess { id: u32, pkt_id: u64, now: f64 },
}

fn strip_underscores(s: &str) -> Option<u32> {
    s.strip_prefix('_')?.strip_suffix('_')?.parse().ok()
}

/// Decode one log line into an [`Event`], or `None` if the line is an
/// unrecognized kind or malformed.
pub fn parse_line(line: &str) -> Option<Event> {
    let items: Vec<&str> = line.split_whitespace().collect();
    if items.len() < 3 {
        return None;
    }
    let kind = items[0];
    let now: f64 = items[1].parse().ok()?;
    let id = strip_underscores(items[2])?;

    match kind {
        "+" => {
            let pkt_id: u64 = items.get(3)?.parse().ok()?;
            Some(Event::Generated { id, pkt_id, now })
        }
        "G" => {
            let pkt_id: u64 = items.get(3)?.parse().ok()?;
            Some(Event::MediumAccessStart { id, pkt_id, now })
        }
        "MDs" => {
            let pkt_id: u64 = items.get(3)?.parse().ok()?;
            Some(Event::MediumAccessStart { id, pkt_id, now })
        }
        "A" => {
            let pkt_id: u64 = items.get(3)?.parse().ok()?;
            Some(Event::Aborted { id, pkt_id, now })
        }
        "S" => {
            let pkt_id: u64 = items.get(3)?.parse().ok()?;
            Some(Event::SenderSuccess { id, pkt_id, now })
        }
        // `D` is overloaded (§6.6): a deferral to a later group slot carries
        // a trailing `timeToGroup` field (5 tokens total); a retry-limit
        // drop does not (4 tokens). Only the latter is terminal.
        "D" if items.len() >= 5 => {
            let pkt_id: u64 = items[3].parse().ok()?;
            Some(Event::Deferred { id, pkt_id, now })
        }
        "D" => {
            let pkt_id: u64 = items.get(3)?.parse().ok()?;
            Some(Event::SenderDrop { id, pkt_id, now })
        }
        "To" if items.len() == 4 => {
            let pkt_id: u64 = items[3].parse().ok()?;
            Some(Event::DataTransmitAttempt { id, pkt_id, now })
        }
        "To" => {
            // Ack form: `To now _id_ _src_ pktId [ack]`.
            let src = strip_underscores(*items.get(3)?)?;
            let pkt_id: u64 = items.get(4)?.parse().ok()?;
            Some(Event::AckTransmitAttempt { src, pkt_id, now })
        }
        "r" => {
            let third = *items.get(3)?;
            if let Some(src) = strip_underscores(third) {
                // Data form: `r now _id_ _src_ pktId maxSimTx`.
                let pkt_id: u64 = items.get(4)?.parse().ok()?;
                let max_sim_tx: u32 = items.get(5)?.parse().ok()?;
                Some(Event::DataReceiveSuccess { id, src, pkt_id, now, max_sim_tx })
            } else {
                // Ack form: `r now _id_ pktId [ack] maxSimTx`.
                let pkt_id: u64 = third.parse().ok()?;
                Some(Event::AckReceiveSuccess { id, pkt_id, now })
            }
        }
        "d" => {
            let tag = items.get(4)?;
            if *tag == "[ack]" {
                return None;
            }
            let src = strip_underscores(items[3])?;
            let pkt_id: u64 = tag.parse().ok()?;
            let max_sim_tx: u32 = items.get(5)?.parse().ok()?;
            Some(Event::DataReceiveDrop { id, src, pkt_id, now, max_sim_tx })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_packet_generated() {
        let ev = parse_line("+ 1234 _7_ 3").unwrap();
        assert_eq!(ev, Event::Generated { id: 7, pkt_id: 3, now: 1234.0 });
    }

    #[test]
    fn parses_data_to_vs_ack_to() {
        let data = parse_line("To 900 _3_ 5").unwrap();
        assert_eq!(data, Event::DataTransmitAttempt { id: 3, pkt_id: 5, now: 900.0 });

        let ack = parse_line("To 950 _0_ _3_ 5 [ack]").unwrap();
        assert_eq!(ack, Event::AckTransmitAttempt { src: 3, pkt_id: 5, now: 950.0 });
    }

    #[test]
    fn parses_data_r_and_ack_r_distinctly() {
        let data = parse_line("r 980 _0_ _3_ 5 1").unwrap();
        assert_eq!(
            data,
            Event::DataReceiveSuccess { id: 0, src: 3, pkt_id: 5, now: 980.0, max_sim_tx: 1 }
        );

        let ack = parse_line("r 1020 _3_ 5 [ack] 1").unwrap();
        assert_eq!(ack, Event::AckReceiveSuccess { id: 3, pkt_id: 5, now: 1020.0 });
    }

    #[test]
    fn distinguishes_deferral_from_retry_limit_drop() {
        let deferred = parse_line("D 100 _1_ 0 49900").unwrap();
        assert_eq!(deferred, Event::Deferred { id: 1, pkt_id: 0, now: 100.0 });

        let dropped = parse_line("D 900 _1_ 0").unwrap();
        assert_eq!(dropped, Event::SenderDrop { id: 1, pkt_id: 0, now: 900.0 });
    }

    #[test]
    fn unknown_kinds_are_skipped() {
        assert!(parse_line("Cw 10 _1_ 5 31").is_none());
        assert!(parse_line("garbage").is_none());
    }
}
