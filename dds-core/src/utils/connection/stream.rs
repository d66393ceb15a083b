//! JSON Lines Codec
//!
//! Command sources speak one JSON object per line, tagged by `"dc"`:
//!
//! ```text
//! {"dc":"s","l":10,"r":-2}
//! {"dc":"t","v":5,"w":0.5}
//! {"dc":"stop"}
//! ```
//!
//! Telemetry goes the other way as one serialized [`RobotSnapshot`] per line.

extern crate alloc;

use alloc::string::String;
use core::fmt;

use crate::utils::controllers::{DriveCommand, RobotSnapshot};

/// Why a command line was not understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Line was blank after trimming.
    Empty,
    /// Not a valid `DriveCommand`; position is 1-based.
    Malformed { line: usize, column: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            DecodeError::Empty => f.write_str("empty command line"),
            DecodeError::Malformed { line, column } => {
                write!(f, "invalid command format at {line}:{column}")
            }
        }
    }
}

/// Decode a single command line.
pub fn decode_command(line: &str) -> Result<DriveCommand, DecodeError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(DecodeError::Empty);
    }
    serde_json::from_str::<DriveCommand>(line).map_err(|error| {
        tracing::warn!(%error, "error deserializing DriveCommand");
        DecodeError::Malformed {
            line: error.line(),
            column: error.column(),
        }
    })
}

/// Encode a snapshot as one telemetry line, without the trailing newline.
pub fn encode_snapshot(snapshot: &RobotSnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string(snapshot)
}
