//! Crate-level error enum (§4.9), mirroring §7's error kinds.
//!
//! `NumericDomainError` has no variant here: per §7 it is fully contained
//! by [`crate::dbm::sub_dbm`]'s snap-to-[`crate::constants::BACKGROUND_NOISE`]
//! rule and never escapes as a propagated error. Fallible setup and I/O
//! paths return `anyhow::Result` at the binary boundary; library-internal
//! fallible functions return `Result<T, SimError>` and convert through
//! `anyhow`'s blanket `From` at the call site.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// A malformed groups file or event-log line (§7's `InputParseError`).
    #[error("{path}:{line}: {reason}")]
    InputParse {
        path: String,
        line: usize,
        reason: String,
    },

    /// Propagated filesystem failure (§7's `IOError`).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A fatal bug, not a recoverable run-time condition — e.g. an energy
    /// decrease observed with zero active transmitters (§7's
    /// `InvariantViolation`).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_parse_error_names_path_and_line() {
        let err = SimError::InputParse {
            path: "groups.txt".into(),
            line: 3,
            reason: "expected 3 fields".into(),
        };
        assert_eq!(err.to_string(), "groups.txt:3: expected 3 fields");
    }
}
