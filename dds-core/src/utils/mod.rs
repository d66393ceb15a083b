//! Utility re-exports and helper macros for the differential drive simulator.
//!
//! This module re-exports the integrator, scheduler, command interface and
//! rendering seam:
//!
//! - `config`: deserializable simulation settings
//! - `connection`: JSON-lines command and telemetry codec
//! - `controllers`: robot state, command latch and the scheduler loop
//! - `math`: exact-arc kinematics and wheel indicator colors
//! - `render`: canvas trait and robot figure geometry
//!
//! The `mk_static!` macro simplifies static initialization of shared state.

pub mod config;
pub mod connection;
pub mod controllers;
pub mod math;
pub mod render;

pub use config::SimSettings;
pub use controllers::SimController;
pub use embassy_time::*;
pub use static_cell;

#[macro_export]
/// Initialize a static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value. The cell
/// type is reached through this crate, so callers need no `static_cell` import.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: $crate::utils::static_cell::StaticCell<$t> =
            $crate::utils::static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
