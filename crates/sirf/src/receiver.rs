use crate::error::Error;
use crate::message::{self, Message};
use crate::status::GpsStatus;
use crate::{CHECKSUM_MASK, END1, END2, START1, START2};

pub const PAYLOAD_CAPACITY: usize = 150;

/// Consecutive byte-less ticks before reporting `NoData`
pub const IDLE_TIMEOUT_TICKS: u8 = 255;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Start,
    LengthHigh,
    LengthLow,
    Payload { pos: u8 },
    ChecksumHigh,
    ChecksumLow,
    End1,
    End2,
    Complete,
}

/// Byte-at-a-time SiRF binary frame receiver with a single frame slot.
///
/// Bytes are fed from the serial receive path with [`Receiver::handle_serial_rx`].
/// Once it reports a complete frame, [`Receiver::process_received`] must be
/// called before the next byte arrives, otherwise the receiver latches
/// [`GpsStatus::Overflow`].
///
/// Errors are latched into the status and further bytes are ignored until
/// [`Receiver::reset`], so the fault stays visible.
pub struct Receiver<const N: usize = PAYLOAD_CAPACITY> {
    status: GpsStatus,
    state: State,
    payload: [u8; N],
    length: u8,
    checksum: u16,
    idle_ticks: u8,
    received: bool,
}

impl<const N: usize> Default for Receiver<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Receiver<N> {
    pub const fn new() -> Self {
        Self {
            status: GpsStatus::Unsynced,
            state: State::Idle,
            payload: [0; N],
            length: 0,
            checksum: 0,
            idle_ticks: 0,
            received: false,
        }
    }

    pub fn reset(&mut self) {
        self.status = GpsStatus::Unsynced;
        self.state = State::Idle;
        self.idle_ticks = 0;
        self.received = false;
    }

    pub fn status(&self) -> GpsStatus {
        self.status
    }

    pub(crate) fn idle_ticks(&self) -> u8 {
        self.idle_ticks
    }

    /// Payload of the pending frame, if any
    pub fn frame(&self) -> Option<&[u8]> {
        match self.state {
            State::Complete => Some(&self.payload[..self.length as usize]),
            _ => None,
        }
    }

    /// Feeds one received byte. Returns `true` when it completes a frame.
    pub fn handle_serial_rx(&mut self, byte: u8) -> bool {
        self.received = true;
        self.idle_ticks = 0;

        if self.status.is_fault() {
            return false;
        }

        match self.step(byte) {
            Ok(complete) => complete,
            Err(e) => {
                self.latch(&e);
                false
            }
        }
    }

    /// Reports a framing/overrun error from the serial peripheral.
    pub fn handle_serial_error(&mut self) {
        self.received = true;
        self.idle_ticks = 0;
        if !self.status.is_fault() {
            self.latch(&Error::Serial);
        }
    }

    /// Called on every tick, detects a silent receiver.
    pub fn handle_tick(&mut self) {
        if self.received {
            self.received = false;
            return;
        }

        self.idle_ticks = self.idle_ticks.saturating_add(1);
        if self.idle_ticks >= IDLE_TIMEOUT_TICKS && !self.status.is_fault() {
            self.status = GpsStatus::NoData;
        }
    }

    /// Interprets the pending frame and frees the slot for the next one.
    ///
    /// Returns `None` if no frame is pending.
    pub fn process_received(&mut self) -> Option<Result<Message, Error>> {
        if self.state != State::Complete {
            return None;
        }

        let result = message::interpret(&self.payload[..self.length as usize]);
        self.state = State::Idle;

        match &result {
            Ok(Message::Ack) | Ok(Message::Diagnostic) => (),
            Ok(Message::Unsynced(..)) => self.set_sync(GpsStatus::Unsynced),
            Ok(Message::Clock(..)) => self.set_sync(GpsStatus::Ok),
            Err(e) => self.latch(e),
        }

        Some(result)
    }

    fn set_sync(&mut self, status: GpsStatus) {
        if !self.status.is_fault() {
            self.status = status;
        }
    }

    fn latch(&mut self, e: &Error) {
        self.status = e.into();
    }

    fn step(&mut self, byte: u8) -> Result<bool, Error> {
        self.state = match self.state {
            State::Idle => {
                expect(START1, byte)?;
                State::Start
            }
            State::Start => {
                expect(START2, byte)?;
                State::LengthHigh
            }
            State::LengthHigh => {
                if byte != 0 {
                    return Err(Error::LengthTooLarge(u16::from_be_bytes([byte, 0])));
                }
                State::LengthLow
            }
            State::LengthLow => {
                if byte as usize > N {
                    return Err(Error::LengthTooLarge(byte as u16));
                }
                self.length = byte;
                self.checksum = 0;
                if byte == 0 {
                    State::ChecksumHigh
                } else {
                    State::Payload { pos: 0 }
                }
            }
            State::Payload { pos } => {
                self.payload[pos as usize] = byte;
                self.checksum = self.checksum.wrapping_add(byte as u16) & CHECKSUM_MASK;
                let pos = pos + 1;
                if pos == self.length {
                    State::ChecksumHigh
                } else {
                    State::Payload { pos }
                }
            }
            State::ChecksumHigh => {
                let expected = (self.checksum >> 8) as u8 & 0x7f;
                if byte != expected {
                    return Err(Error::ChecksumMismatch {
                        expected,
                        actual: byte,
                    });
                }
                State::ChecksumLow
            }
            State::ChecksumLow => {
                let expected = self.checksum as u8;
                if byte != expected {
                    return Err(Error::ChecksumMismatch {
                        expected,
                        actual: byte,
                    });
                }
                State::End1
            }
            State::End1 => {
                expect(END1, byte)?;
                State::End2
            }
            State::End2 => {
                expect(END2, byte)?;
                State::Complete
            }
            State::Complete => return Err(Error::FramePending),
        };
        Ok(self.state == State::Complete)
    }
}

fn expect(expected: u8, actual: u8) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::UnexpectedByte { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec::Vec;

    use super::*;
    use crate::message::{ClockStatus, UtcInstant};
    use crate::{FRAME_OVERHEAD, command::encode_frame};

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut buf = [0; PAYLOAD_CAPACITY + FRAME_OVERHEAD];
        encode_frame(payload, &mut buf).unwrap().to_vec()
    }

    fn clock_payload(week: u16, time_of_week: u32) -> [u8; 20] {
        let mut payload = [0; 20];
        payload[0] = 7;
        payload[1..3].copy_from_slice(&week.to_be_bytes());
        payload[3..7].copy_from_slice(&time_of_week.to_be_bytes());
        payload
    }

    /// Feeds all bytes, returns the indices at which a frame completed
    fn feed<const N: usize>(rx: &mut Receiver<N>, bytes: &[u8]) -> Vec<usize> {
        bytes
            .iter()
            .enumerate()
            .filter_map(|(i, b)| rx.handle_serial_rx(*b).then_some(i))
            .collect()
    }

    #[test]
    fn test_initial_state() {
        let rx = Receiver::<PAYLOAD_CAPACITY>::new();
        assert_eq!(rx.status(), GpsStatus::Unsynced);
        assert_eq!(rx.frame(), None);
    }

    #[test]
    fn test_receive_frame() {
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        let bytes = frame(&[11, 0xa6, 0x00]);
        assert_eq!(feed(&mut rx, &bytes), [bytes.len() - 1]);
        assert_eq!(rx.frame(), Some(&[11, 0xa6, 0x00][..]));
        assert_eq!(rx.status(), GpsStatus::Unsynced);
    }

    #[test]
    fn test_raw_frame() {
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        let bytes = [
            0xa0, 0xa2, // start
            0x00, 0x03, // length
            0x0b, 0xa6, 0x00, // payload
            0x00, 0xb1, // checksum
            0xb0, 0xb3, // end
        ];
        assert_eq!(feed(&mut rx, &bytes), [10]);
        assert_eq!(rx.process_received(), Some(Ok(Message::Ack)));
    }

    #[test]
    fn test_ignored_messages_keep_status() {
        let payloads: [&[u8]; 4] = [&[11, 0xa6, 0x00], &[225; 39], &[93], &[93; 120]];
        for payload in payloads {
            for status in [GpsStatus::Ok, GpsStatus::Unsynced] {
                let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
                rx.status = status;
                assert_eq!(feed(&mut rx, &frame(payload)).len(), 1);
                assert!(matches!(
                    rx.process_received(),
                    Some(Ok(Message::Ack | Message::Diagnostic))
                ));
                assert_eq!(rx.status(), status);
                assert_eq!(rx.frame(), None);
            }
        }
    }

    #[test]
    fn test_clock_message() {
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();

        feed(&mut rx, &frame(&clock_payload(1000, 12)));
        assert_eq!(
            rx.process_received(),
            Some(Ok(Message::Unsynced(ClockStatus {
                week: 1000,
                time_of_week: 12
            })))
        );
        assert_eq!(rx.status(), GpsStatus::Unsynced);

        feed(&mut rx, &frame(&clock_payload(2151, 36_181)));
        assert_eq!(
            rx.process_received(),
            Some(Ok(Message::Clock(UtcInstant(16_168_932_001))))
        );
        assert_eq!(rx.status(), GpsStatus::Ok);

        // losing the fix
        feed(&mut rx, &frame(&clock_payload(2150, 0)));
        assert!(rx.process_received().is_some());
        assert_eq!(rx.status(), GpsStatus::Unsynced);
    }

    #[test]
    fn test_unknown_message() {
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        feed(&mut rx, &frame(&[7; 19]));
        assert_eq!(
            rx.process_received(),
            Some(Err(Error::UnknownMessage {
                message_type: Some(7),
                length: 19
            }))
        );
        assert_eq!(rx.status(), GpsStatus::InvalidType);
        assert_eq!(rx.frame(), None);
    }

    #[test]
    fn test_empty_payload() {
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        assert_eq!(
            feed(&mut rx, &[0xa0, 0xa2, 0x00, 0x00, 0x00, 0x00, 0xb0, 0xb3]),
            [7]
        );
        assert_eq!(rx.frame(), Some(&[][..]));
        assert!(matches!(rx.process_received(), Some(Err(..))));
        assert_eq!(rx.status(), GpsStatus::InvalidType);
    }

    #[test]
    fn test_process_without_frame() {
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        assert_eq!(rx.process_received(), None);

        feed(&mut rx, &frame(&[11, 0xa6, 0x00])[..5]);
        assert_eq!(rx.process_received(), None);
        assert_eq!(rx.status(), GpsStatus::Unsynced);
    }

    #[test]
    fn test_corrupted_payload() {
        let payload = clock_payload(2200, 123_456);
        let good = frame(&payload);
        for i in 4..4 + payload.len() {
            for delta in [1_u8, 0x80, 0xff] {
                let mut bytes = good.clone();
                bytes[i] = bytes[i].wrapping_add(delta);

                let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
                assert!(feed(&mut rx, &bytes).is_empty());
                assert_eq!(rx.status(), GpsStatus::InvalidChecksum, "byte {i}");
            }
        }
    }

    #[test]
    fn test_corrupted_checksum() {
        let good = frame(&clock_payload(2200, 123_456));
        let n = good.len();
        for i in [n - 4, n - 3] {
            let mut bytes = good.clone();
            bytes[i] ^= 0x01;

            let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
            assert!(feed(&mut rx, &bytes).is_empty());
            assert_eq!(rx.status(), GpsStatus::InvalidChecksum);
        }
    }

    #[test]
    fn test_invalid_sequence() {
        for i in [0, 1] {
            let mut bytes = frame(&[11, 0xa6, 0x00]);
            bytes[i] = b'$';
            let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
            assert!(feed(&mut rx, &bytes).is_empty());
            assert_eq!(rx.status(), GpsStatus::InvalidSequence);
        }

        let mut bytes = frame(&[11, 0xa6, 0x00]);
        let n = bytes.len();
        bytes[n - 2] = 0xb3;
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        assert!(feed(&mut rx, &bytes).is_empty());
        assert_eq!(rx.status(), GpsStatus::InvalidSequence);

        let mut bytes = frame(&[11, 0xa6, 0x00]);
        bytes[n - 1] = 0xb0;
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        assert!(feed(&mut rx, &bytes).is_empty());
        assert_eq!(rx.status(), GpsStatus::InvalidSequence);
    }

    #[test]
    fn test_length_overflow() {
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        feed(&mut rx, &[0xa0, 0xa2, 0x01, 0x00]);
        assert_eq!(rx.status(), GpsStatus::Overflow);

        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        feed(&mut rx, &[0xa0, 0xa2, 0x00, PAYLOAD_CAPACITY as u8 + 1]);
        assert_eq!(rx.status(), GpsStatus::Overflow);

        let mut rx = Receiver::<4>::new();
        assert!(feed(&mut rx, &frame(&[11, 0xa6, 0x00, 0x00, 0x00])).is_empty());
        assert_eq!(rx.status(), GpsStatus::Overflow);

        let mut rx = Receiver::<4>::new();
        assert_eq!(feed(&mut rx, &frame(&[93, 1, 2, 3])).len(), 1);
    }

    #[test]
    fn test_frame_pending_overflow() {
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        let bytes = frame(&clock_payload(2200, 0));
        feed(&mut rx, &bytes);
        rx.handle_serial_rx(0xa0);
        assert_eq!(rx.status(), GpsStatus::Overflow);

        // the pending frame does not clear the fault
        assert!(matches!(
            rx.process_received(),
            Some(Ok(Message::Clock(..)))
        ));
        assert_eq!(rx.status(), GpsStatus::Overflow);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        let mut bytes = frame(&clock_payload(2200, 0));
        bytes.extend(frame(&[93, 0, 1]));
        bytes.extend(frame(&clock_payload(2200, 10)));

        let mut messages = Vec::new();
        for b in bytes {
            if rx.handle_serial_rx(b) {
                messages.push(rx.process_received().unwrap().unwrap());
            }
        }
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], Message::Diagnostic);
        assert_eq!(rx.status(), GpsStatus::Ok);
    }

    #[test]
    fn test_fault_is_latched() {
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        rx.handle_serial_rx(0x42);
        assert_eq!(rx.status(), GpsStatus::InvalidSequence);

        assert!(feed(&mut rx, &frame(&clock_payload(2200, 0))).is_empty());
        assert_eq!(rx.process_received(), None);
        assert_eq!(rx.status(), GpsStatus::InvalidSequence);

        rx.handle_serial_error();
        assert_eq!(rx.status(), GpsStatus::InvalidSequence);

        rx.reset();
        assert_eq!(rx.status(), GpsStatus::Unsynced);
        assert_eq!(feed(&mut rx, &frame(&clock_payload(2200, 0))).len(), 1);
        rx.process_received();
        assert_eq!(rx.status(), GpsStatus::Ok);
    }

    #[test]
    fn test_serial_error() {
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        rx.handle_serial_error();
        assert_eq!(rx.status(), GpsStatus::SerialError);
        assert!(feed(&mut rx, &frame(&clock_payload(2200, 0))).is_empty());
        assert_eq!(rx.status(), GpsStatus::SerialError);
    }

    #[test]
    fn test_idle_timeout() {
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        for _ in 0..IDLE_TIMEOUT_TICKS - 1 {
            rx.handle_tick();
        }
        assert_eq!(rx.idle_ticks(), IDLE_TIMEOUT_TICKS - 1);
        assert_eq!(rx.status(), GpsStatus::Unsynced);

        rx.handle_tick();
        assert_eq!(rx.status(), GpsStatus::NoData);

        // stays there until a time message arrives
        rx.handle_tick();
        assert_eq!(rx.idle_ticks(), IDLE_TIMEOUT_TICKS);
        feed(&mut rx, &frame(&[93, 1]));
        assert_eq!(rx.idle_ticks(), 0);
        rx.process_received();
        assert_eq!(rx.status(), GpsStatus::NoData);

        feed(&mut rx, &frame(&clock_payload(2200, 0)));
        rx.process_received();
        assert_eq!(rx.status(), GpsStatus::Ok);
    }

    #[test]
    fn test_idle_counter_reset_by_byte() {
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        for _ in 0..200 {
            rx.handle_tick();
        }
        rx.handle_serial_rx(0xa0);
        assert_eq!(rx.idle_ticks(), 0);

        // the tick of the slice the byte was received in does not count
        rx.handle_tick();
        assert_eq!(rx.idle_ticks(), 0);

        for _ in 0..IDLE_TIMEOUT_TICKS - 1 {
            rx.handle_tick();
        }
        assert_eq!(rx.status(), GpsStatus::Unsynced);
        rx.handle_tick();
        assert_eq!(rx.status(), GpsStatus::NoData);
    }

    #[test]
    fn test_idle_timeout_keeps_fault() {
        let mut rx = Receiver::<PAYLOAD_CAPACITY>::new();
        rx.handle_serial_rx(0x00);
        for _ in 0..=IDLE_TIMEOUT_TICKS {
            rx.handle_tick();
        }
        assert_eq!(rx.status(), GpsStatus::InvalidSequence);
    }
}
