//! Analysis and checkpoint errors.

use std::io;

/// Errors raised by checkpoint reading, writing and merging.
#[derive(Debug, thiserror::Error)]
pub enum SaveDataError {
    /// The stored build hash does not match the running program.
    #[error("checkpoint build hash does not match this program")]
    HashMismatch,

    /// A header parameter differs from the current configuration.
    #[error("checkpoint {field} mismatch")]
    ParamMismatch {
        /// Name of the mismatching header field.
        field: &'static str,
    },

    /// The checkpoint file could not be read or written.
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Top-level analysis errors.
#[derive(Debug, thiserror::Error)]
pub enum MiError {
    /// Invalid or inconsistent command-line options.
    #[error("{0}")]
    Options(String),

    /// A checkpoint could not be loaded, validated or stored.
    #[error(transparent)]
    SaveData(#[from] SaveDataError),

    /// Report or store output could not be written.
    #[error("output I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_mismatch_display() {
        assert_eq!(
            SaveDataError::HashMismatch.to_string(),
            "checkpoint build hash does not match this program"
        );
    }

    #[test]
    fn param_mismatch_display() {
        let e = SaveDataError::ParamMismatch { field: "cycles" };
        assert_eq!(e.to_string(), "checkpoint cycles mismatch");
    }

    #[test]
    fn options_display_is_transparent() {
        let e = MiError::Options("epsilon must be positive".into());
        assert_eq!(e.to_string(), "epsilon must be positive");
    }
}
