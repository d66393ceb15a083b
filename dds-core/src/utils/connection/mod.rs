//! Module Exports
//!
//! This file exports the line-oriented command and telemetry codec.
//!
//! # Modules
//! - `stream`: decodes JSON drive commands and encodes JSON snapshots, one per
//!   line.

/// Module for the JSON-lines command/telemetry format.
pub mod stream;
