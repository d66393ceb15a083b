//! Core of a differential-drive robot simulator, usable on no-std targets.
//!
//! For a runnable terminal front end, see the `term-sim` app.
#![no_std]

pub mod utils;
