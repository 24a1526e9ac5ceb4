#![no_std]

pub mod calendar;
pub mod settings;

pub use calendar::{ElapsedTime, LocalTime, days_from_civil, recalc_local_time};
pub use settings::{DstRule, Settings};
