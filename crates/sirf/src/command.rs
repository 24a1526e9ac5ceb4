use crate::error::Error;
use crate::{END1, END2, FRAME_OVERHEAD, START1, START2, checksum};

/// Switches the receiver from NMEA to the binary protocol, 4800 bauds 8N1
pub const SWITCH_TO_BINARY: &[u8] = b"PSRF100,0,4800,8,1,0";

/// `$`, `*`, two checksum digits and CR LF
const NMEA_OVERHEAD: usize = 6;

pub fn nmea_checksum(body: &[u8]) -> u8 {
    body.iter().fold(0, |c, acc| c ^ acc)
}

/// Wraps `body` into a `$<body>*<checksum>\r\n` sentence.
pub fn encode_nmea<'a>(body: &[u8], buf: &'a mut [u8]) -> Result<&'a [u8], Error> {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let len = body.len() + NMEA_OVERHEAD;
    if buf.len() < len {
        return Err(Error::BufferTooSmall(len));
    }
    let ck = nmea_checksum(body);
    let n = body.len();
    buf[0] = b'$';
    buf[1..1 + n].copy_from_slice(body);
    buf[1 + n] = b'*';
    buf[2 + n] = HEX[(ck >> 4) as usize];
    buf[3 + n] = HEX[(ck & 0x0f) as usize];
    buf[4 + n..len].copy_from_slice(b"\r\n");
    Ok(&buf[..len])
}

/// Frames `payload` into `buf`, returning the encoded frame.
pub fn encode_frame<'a>(payload: &[u8], buf: &'a mut [u8]) -> Result<&'a [u8], Error> {
    if payload.len() > u8::MAX as usize {
        return Err(Error::LengthTooLarge(payload.len() as u16));
    }
    let len = payload.len() + FRAME_OVERHEAD;
    if buf.len() < len {
        return Err(Error::BufferTooSmall(len));
    }
    write_frame(payload, &mut buf[..len]);
    Ok(&buf[..len])
}

fn write_frame(payload: &[u8], frame: &mut [u8]) {
    let n = payload.len();
    let ck = checksum(payload);
    frame[0] = START1;
    frame[1] = START2;
    frame[2..4].copy_from_slice(&(n as u16).to_be_bytes());
    frame[4..4 + n].copy_from_slice(payload);
    frame[4 + n..6 + n].copy_from_slice(&ck.to_be_bytes());
    frame[6 + n] = END1;
    frame[7 + n] = END2;
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RateMode {
    /// Sets the rate of one message
    One = 0,
    /// Requests one message immediately
    Poll = 1,
    /// Sets the rate of every message
    All = 2,
}

/// Set Message Rate (MID 166)
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SetMessageRate {
    pub mode: RateMode,
    pub message_id: u8,
    /// Seconds between messages, 0 disables
    pub rate: u8,
}

impl SetMessageRate {
    pub const MID: u8 = 166;
    pub const FRAME_LEN: usize = 8 + FRAME_OVERHEAD;

    pub const fn disable_all() -> Self {
        Self {
            mode: RateMode::All,
            message_id: 0,
            rate: 0,
        }
    }

    pub const fn every(message_id: u8, rate: u8) -> Self {
        Self {
            mode: RateMode::One,
            message_id,
            rate,
        }
    }

    pub const fn poll(message_id: u8) -> Self {
        Self {
            mode: RateMode::Poll,
            message_id,
            rate: 0,
        }
    }

    pub fn payload(&self) -> [u8; 8] {
        [
            Self::MID,
            self.mode as u8,
            self.message_id,
            self.rate,
            0x00,
            0x00,
            0x00,
            0x00,
        ]
    }

    pub fn frame(&self) -> [u8; Self::FRAME_LEN] {
        let mut frame = [0; Self::FRAME_LEN];
        write_frame(&self.payload(), &mut frame);
        frame
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;

    #[test]
    fn test_nmea_checksum() {
        assert_eq!(nmea_checksum(SWITCH_TO_BINARY), 0x0f);
        assert_eq!(nmea_checksum(b"PSRF103,00,01,00,01"), 0x25);
    }

    #[test]
    fn test_encode_nmea() {
        let mut buf = [0; 32];
        assert_eq!(
            encode_nmea(SWITCH_TO_BINARY, &mut buf),
            Ok(&b"$PSRF100,0,4800,8,1,0*0F\r\n"[..])
        );
        assert_eq!(
            encode_nmea(b"PSRF103,00,01,00,01", &mut buf),
            Ok(&b"$PSRF103,00,01,00,01*25\r\n"[..])
        );
        assert_eq!(
            encode_nmea(SWITCH_TO_BINARY, &mut [0; 25]),
            Err(Error::BufferTooSmall(26))
        );
    }

    #[test]
    fn test_set_message_rate() {
        assert_eq!(
            SetMessageRate::disable_all().frame(),
            [
                0xa0, 0xa2, 0x00, 0x08, // header
                0xa6, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // payload
                0x00, 0xa8, // checksum
                0xb0, 0xb3, // end
            ]
        );
        assert_eq!(
            SetMessageRate::every(7, 10).frame(),
            [
                0xa0, 0xa2, 0x00, 0x08, // header
                0xa6, 0x00, 0x07, 0x0a, 0x00, 0x00, 0x00, 0x00, // payload
                0x00, 0xb7, // checksum
                0xb0, 0xb3, // end
            ]
        );
        assert_eq!(
            SetMessageRate::poll(7).frame(),
            [
                0xa0, 0xa2, 0x00, 0x08, // header
                0xa6, 0x01, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00, // payload
                0x00, 0xae, // checksum
                0xb0, 0xb3, // end
            ]
        );
    }

    #[test]
    fn test_encode_frame() {
        let mut buf = [0; 16];
        assert_eq!(
            encode_frame(&[0xff; 3], &mut buf),
            Ok(&[0xa0, 0xa2, 0x00, 0x03, 0xff, 0xff, 0xff, 0x02, 0xfd, 0xb0, 0xb3][..])
        );
        assert_eq!(encode_frame(&[0; 9], &mut buf), Err(Error::BufferTooSmall(17)));
        assert_eq!(
            encode_frame(&[0; 256], &mut [0; 300]),
            Err(Error::LengthTooLarge(256))
        );
    }

    #[test]
    fn test_checksum_high_byte_is_15_bits() {
        let payload = [0xff; 200];
        let mut buf = [0; 208];
        let frame = encode_frame(&payload, &mut buf).unwrap();
        assert_eq!(&frame[204..206], &[0x47, 0x38]);
    }
}
