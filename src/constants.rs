//! MAC/PHY constants shared by every component. Units are microseconds
//! unless noted; powers are dBm.

/// Duration of one backoff slot.
pub const SLOT_TIME: u64 = 52;
/// Short inter-frame space.
pub const SIFS: u64 = 160;
/// Distributed inter-frame space: `SIFS + 2 * SLOT_TIME`.
pub const DIFS: u64 = SIFS + 2 * SLOT_TIME;

/// Duration of a single modulation symbol.
pub const SYMBOL_DURATION: u64 = 40;
/// Payload bits carried by one symbol.
pub const BITS_PER_SYMBOL: u64 = 26;

/// Data frame size in bytes (before symbol-rounding).
const DATA_PACKET_BYTES: u64 = 520;
/// Ack frame size in bytes.
const ACK_BYTES: u64 = 39;

/// Number of symbols needed to carry a data frame, rounding up.
pub const DATA_PACKET_SIZE: u64 = (DATA_PACKET_BYTES * 8).div_ceil(BITS_PER_SYMBOL);
/// Number of symbols needed to carry an ack frame, rounding up.
pub const ACK_SIZE: u64 = (ACK_BYTES * 8).div_ceil(BITS_PER_SYMBOL);

/// On-air time of a data frame.
pub const DATA_PACKET_TIME: u64 = DATA_PACKET_SIZE * SYMBOL_DURATION;
/// On-air time of an ack frame.
pub const ACK_PACKET_TIME: u64 = ACK_SIZE * SYMBOL_DURATION;
/// How long a sender waits for an ack before declaring a timeout.
pub const ACK_TIMEOUT: u64 = SIFS + ACK_PACKET_TIME + SLOT_TIME;

/// Maximum number of transmission attempts before a packet is dropped.
pub const RETRY_LIMIT: u32 = 7;
/// Initial contention window.
pub const CW_MIN: u32 = 15;
/// Contention window ceiling.
pub const CW_MAX: u32 = 1023;

/// Clear-channel-assessment energy threshold, in dBm.
pub const CS_THRESHOLD: f64 = -70.0;
/// Thermal noise floor, in dBm.
pub const BACKGROUND_NOISE: f64 = -95.0;
/// Transmit power of every station and the AP, in dBm.
pub const TRANSMISSION_POWER: f64 = 15.0;
/// Antenna gain factor used by the free-space-like path loss model.
pub const ANTENNA_GAIN: f64 = 3.0;
/// Antenna height used by the free-space-like path loss model.
pub const ANTENNA_HEIGHT: f64 = 1.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_sizes_round_up_to_whole_symbols() {
        assert_eq!(DATA_PACKET_SIZE, 160);
        assert_eq!(ACK_SIZE, 12);
    }

    #[test]
    fn difs_is_sifs_plus_two_slots() {
        assert_eq!(DIFS, 264);
    }

    #[test]
    fn ack_timeout_covers_sifs_ack_and_a_slot() {
        assert_eq!(ACK_TIMEOUT, SIFS + ACK_PACKET_TIME + SLOT_TIME);
    }
}
