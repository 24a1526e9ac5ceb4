use crate::error::Error;

/// GPS synchronization status, in increasing order of severity.
///
/// Everything from `SerialError` on is a latched fault: it is only cleared by
/// reinitializing the receiver.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum GpsStatus {
    /// Synchronized
    Ok = 0,
    /// Receiving data, but no satellite fix yet
    #[default]
    Unsynced = 1,
    /// The receiver is not sending anything
    NoData = 2,
    SerialError = 3,
    Overflow = 4,
    InvalidSequence = 5,
    InvalidChecksum = 6,
    InvalidType = 7,
}

impl GpsStatus {
    pub fn is_fault(&self) -> bool {
        *self >= GpsStatus::SerialError
    }

    pub fn ordinal(&self) -> u8 {
        *self as u8
    }
}

impl From<&Error> for GpsStatus {
    fn from(e: &Error) -> Self {
        match e {
            Error::Serial => GpsStatus::SerialError,
            Error::FramePending | Error::LengthTooLarge(..) | Error::BufferTooSmall(..) => {
                GpsStatus::Overflow
            }
            Error::UnexpectedByte { .. } => GpsStatus::InvalidSequence,
            Error::ChecksumMismatch { .. } => GpsStatus::InvalidChecksum,
            Error::UnknownMessage { .. } | Error::InvalidPayload => GpsStatus::InvalidType,
        }
    }
}

impl From<Error> for GpsStatus {
    fn from(e: Error) -> Self {
        Self::from(&e)
    }
}
