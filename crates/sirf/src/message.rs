use nom::{
    IResult, Parser,
    bytes::complete::take,
    number::complete::{be_u16, be_u32},
    sequence::preceded,
};

use datetime::ElapsedTime;

use crate::error::Error;

/// Clock Status Data
pub const MID_CLOCK_STATUS: u8 = 7;
pub const CLOCK_STATUS_LEN: usize = 20;

/// Command Acknowledgment
pub const MID_COMMAND_ACK: u8 = 11;
pub const COMMAND_ACK_LEN: usize = 3;

// Undocumented diagnostic messages that can't be turned off
pub const MID_STATISTICS: u8 = 225;
pub const STATISTICS_LEN: usize = 39;
pub const MID_DIAGNOSTIC: u8 = 93;

/// 1980-01-06 00:00:00 UTC, in tenths of a second since 1970-01-01
pub const GPS_EPOCH_TENTHS: u64 = 315_964_800 * 10;

/// GPS time is ahead of UTC by 18 seconds since 2017-01-01
pub const LEAP_SECONDS_TENTHS: u64 = 18 * 10;

pub const SECONDS_PER_WEEK: u64 = 7 * 24 * 60 * 60;

/// Weeks up to this one (2021-03-21) are reported by receivers without a fix.
pub const UNSYNCED_WEEK_THRESHOLD: u16 = 2150;

/// UTC instant, in tenths of a second since 1970-01-01 00:00:00.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct UtcInstant(pub u64);

impl UtcInstant {
    pub fn from_gps(week: u16, time_of_week: u32) -> Self {
        Self(
            GPS_EPOCH_TENTHS - LEAP_SECONDS_TENTHS
                + week as u64 * SECONDS_PER_WEEK * 10
                + time_of_week as u64,
        )
    }

    pub fn unix_secs(&self) -> u64 {
        self.0 / 10
    }

    pub fn tenths(&self) -> u8 {
        (self.0 % 10) as u8
    }

    pub fn elapsed(&self) -> ElapsedTime {
        ElapsedTime::from_unix_secs(self.unix_secs())
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockStatus {
    pub week: u16,
    /// Tenths of a second since the start of the week
    pub time_of_week: u32,
}

fn clock_status(i: &[u8]) -> IResult<&[u8], ClockStatus> {
    let (i, (week, time_of_week)) = preceded(take(1_usize), (be_u16, be_u32)).parse(i)?;
    Ok((i, ClockStatus { week, time_of_week }))
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// A command was accepted
    Ack,
    /// Vendor diagnostics, ignored
    Diagnostic,
    /// Clock message sent before the receiver got a fix
    Unsynced(ClockStatus),
    Clock(UtcInstant),
}

/// Interprets a frame payload, the first byte being the message type.
pub fn interpret(payload: &[u8]) -> Result<Message, Error> {
    match (payload.first().copied(), payload.len()) {
        (Some(MID_COMMAND_ACK), COMMAND_ACK_LEN) => Ok(Message::Ack),
        (Some(MID_STATISTICS), STATISTICS_LEN) | (Some(MID_DIAGNOSTIC), _) => {
            Ok(Message::Diagnostic)
        }
        (Some(MID_CLOCK_STATUS), CLOCK_STATUS_LEN) => {
            let (_, clock) = clock_status(payload)?;
            if clock.week <= UNSYNCED_WEEK_THRESHOLD {
                Ok(Message::Unsynced(clock))
            } else {
                Ok(Message::Clock(UtcInstant::from_gps(
                    clock.week,
                    clock.time_of_week,
                )))
            }
        }
        (message_type, length) => Err(Error::UnknownMessage {
            message_type,
            length: length as u8,
        }),
    }
}
