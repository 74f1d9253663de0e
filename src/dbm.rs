//! dBm/milliwatt power arithmetic.
//!
//! All simulated power levels are carried in dBm; the medium and energy
//! history need to add and subtract overlapping transmissions, which only
//! makes sense in the linear (milliwatt) domain. Subtracting two nearly
//! equal dBm values is numerically unstable, so callers route the
//! "last transmitter turned off" case through [`crate::constants::BACKGROUND_NOISE`]
//! directly instead of calling [`sub_dbm`] (see [`crate::energy`]).

use crate::constants::BACKGROUND_NOISE;

/// Convert a power level in dBm to milliwatts.
pub fn dbm_to_mw(dbm: f64) -> f64 {
    10f64.powf(dbm / 10.0)
}

/// Convert a power level in milliwatts to dBm.
pub fn mw_to_dbm(mw: f64) -> f64 {
    10.0 * mw.log10()
}

/// Add two dBm power levels by summing their linear milliwatt values.
pub fn sum_dbm(a: f64, b: f64) -> f64 {
    mw_to_dbm(dbm_to_mw(a) + dbm_to_mw(b))
}

/// Subtract `b` from `a` in the linear domain, i.e. the dBm level that
/// remains once a contribution of `b` dBm is removed from a total of `a`
/// dBm. Clamps the result to `BACKGROUND_NOISE` if the subtraction would
/// go non-positive (degenerate input per §7's `NumericDomainError`
/// containment rule) rather than returning `-inf`/`NaN`.
pub fn sub_dbm(a: f64, b: f64) -> f64 {
    let diff_mw = dbm_to_mw(a) - dbm_to_mw(b);
    if diff_mw <= 0.0 {
        BACKGROUND_NOISE
    } else {
        mw_to_dbm(diff_mw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dbm_mw_round_trip() {
        for v in [-95.0, -70.0, -40.0, 0.0, 15.0] {
            let mw = dbm_to_mw(v);
            let back = mw_to_dbm(mw);
            assert!((v - back).abs() < 1e-9);
        }
    }

    #[test]
    fn sum_of_equal_powers_is_plus_three_db() {
        let s = sum_dbm(0.0, 0.0);
        assert!((s - 3.0103).abs() < 1e-3);
    }

    #[test]
    fn sub_of_equal_powers_snaps_to_noise_floor() {
        assert_eq!(sub_dbm(-40.0, -40.0), BACKGROUND_NOISE);
    }

    #[test]
    fn sum_then_sub_recovers_original() {
        let combined = sum_dbm(-50.0, -60.0);
        let recovered = sub_dbm(combined, -60.0);
        assert!((recovered - (-50.0)).abs() < 1e-6);
    }
}
