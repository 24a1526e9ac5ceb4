#![no_std]

//! Local time base kept by a periodic tick interrupt and re-baselined from GPS.

pub mod blinker;
pub mod counter;

pub use blinker::StatusBlinker;
pub use counter::{TickCounter, TimeBase};
