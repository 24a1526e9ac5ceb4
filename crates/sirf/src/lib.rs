#![no_std]

//! SiRF binary protocol receiver.
//!
//! ```text
//! 0       1       2       3       4               4+N     5+N     6+N     7+N
//! +-------+-------+-------+-------+-------+-------+-------+-------+-------+-------+
//! | Start         | Length (N)    | Payload       | Checksum      | End           |
//! +-------+-------+-------+-------+-------+-------+-------+-------+-------+-------+
//! ```
//!
//! The length is big-endian, the checksum is the 15-bit sum of the payload bytes.

pub mod command;
pub mod error;
pub mod message;
pub mod receiver;
pub mod status;

pub use error::Error;
pub use message::{Message, UtcInstant};
pub use receiver::{PAYLOAD_CAPACITY, Receiver};
pub use status::GpsStatus;

pub const START1: u8 = 0xa0;
pub const START2: u8 = 0xa2;
pub const END1: u8 = 0xb0;
pub const END2: u8 = 0xb3;

pub const CHECKSUM_MASK: u16 = 0x7fff;

/// Start, length, checksum and end bytes
pub const FRAME_OVERHEAD: usize = 8;

pub fn checksum(payload: &[u8]) -> u16 {
    payload
        .iter()
        .fold(0_u16, |c, b| c.wrapping_add(*b as u16) & CHECKSUM_MASK)
}
