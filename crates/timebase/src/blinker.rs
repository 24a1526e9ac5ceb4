use sirf::GpsStatus;

/// Ticks in one blink sequence
pub const BLINK_PERIOD: u8 = 40;

/// Blinks the status LED once per [`GpsStatus`] ordinal, then stays dark
/// for the rest of the period. `Ok` never lights it.
#[derive(Copy, Clone, Debug, Default)]
pub struct StatusBlinker {
    count: u8,
}

impl StatusBlinker {
    pub const fn new() -> Self {
        Self { count: 0 }
    }

    /// Advances by one tick and returns whether the LED is lit.
    pub fn tick(&mut self, status: GpsStatus) -> bool {
        let lit = self.count & 0b11 == 0 && (self.count >> 2) < status.ordinal();
        self.count += 1;
        if self.count == BLINK_PERIOD {
            self.count = 0;
        }
        lit
    }
}
