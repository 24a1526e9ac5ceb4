#![no_std]

pub mod display;
pub mod flash;
pub mod gps;
pub mod mutex;
