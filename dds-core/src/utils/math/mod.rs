//! Math utilities for the differential drive simulator.
//!
//! Exact-arc kinematics for two-wheeled robots, plus the speed-to-color map used
//! by the wheel indicators.

pub mod color;
pub mod kinematics;
