use core::fmt;

type NomError<'a> = nom::Err<nom::error::Error<&'a [u8]>>;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Framing, overrun, parity or break condition reported by the UART
    Serial,
    /// Received a byte while a complete frame is still pending
    FramePending,
    LengthTooLarge(u16),
    UnexpectedByte { expected: u8, actual: u8 },
    ChecksumMismatch { expected: u8, actual: u8 },
    UnknownMessage { message_type: Option<u8>, length: u8 },
    InvalidPayload,
    BufferTooSmall(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Serial => write!(f, "serial line error"),
            Error::FramePending => write!(f, "previous frame not processed yet"),
            Error::LengthTooLarge(len) => write!(f, "payload too large ({len} bytes)"),
            Error::UnexpectedByte { expected, actual } => {
                write!(f, "unexpected byte, expected: {expected:#04x}, actual: {actual:#04x}")
            }
            Error::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch, expected: {expected:#04x}, actual: {actual:#04x}"
            ),
            Error::UnknownMessage {
                message_type: Some(t),
                length,
            } => write!(f, "unexpected message {t} ({length} bytes)"),
            Error::UnknownMessage {
                message_type: None, ..
            } => write!(f, "empty message"),
            Error::InvalidPayload => write!(f, "invalid payload"),
            Error::BufferTooSmall(len) => write!(f, "buffer too small, {len} bytes needed"),
        }
    }
}

impl From<NomError<'_>> for Error {
    fn from(_: NomError<'_>) -> Self {
        Self::InvalidPayload
    }
}

impl core::error::Error for Error {}
