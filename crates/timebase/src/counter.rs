use core::cell::Cell;

use datetime::ElapsedTime;
use datetime::calendar::SECONDS_PER_DAY;
use embassy_sync::blocking_mutex::{Mutex, raw::RawMutex};

/// Days and ticks since 1970-01-01 00:00:00 UTC.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TickCounter {
    pub days: u16,
    /// Always lower than the number of ticks per day
    pub ticks: u32,
    /// Set on every tick, cleared when the main loop reads the counter
    pub ticked: bool,
}

impl TickCounter {
    pub const fn new() -> Self {
        Self {
            days: 0,
            ticks: 0,
            ticked: false,
        }
    }

    fn advance(&mut self, ticks_per_day: u32) {
        self.ticks += 1;
        if self.ticks >= ticks_per_day {
            self.ticks = 0;
            self.days = self.days.wrapping_add(1);
        }
        self.ticked = true;
    }

    pub fn elapsed(&self, ticks_per_day: u32) -> ElapsedTime {
        let seconds = self.ticks as u64 * SECONDS_PER_DAY as u64 / ticks_per_day as u64;
        ElapsedTime::new(self.days, seconds as u32)
    }
}

/// Tick counter shared between the tick interrupt and the main loop.
///
/// `M` decides what is masked while the counter is accessed. The firmware
/// masks the tick interrupt only, so serial reception keeps running.
pub struct TimeBase<M: RawMutex> {
    counter: Mutex<M, Cell<TickCounter>>,
    ticks_per_day: u32,
}

impl<M: RawMutex> TimeBase<M> {
    pub const fn new(ticks_per_day: u32) -> Self {
        Self {
            counter: Mutex::new(Cell::new(TickCounter::new())),
            ticks_per_day,
        }
    }

    /// Called from the tick interrupt.
    pub fn tick(&self) {
        self.counter.lock(|c| {
            let mut counter = c.get();
            counter.advance(self.ticks_per_day);
            c.set(counter);
        });
    }

    /// Returns the elapsed time if at least one tick happened since the last call.
    pub fn take(&self) -> Option<ElapsedTime> {
        self.counter.lock(|c| {
            let mut counter = c.get();
            if !counter.ticked {
                return None;
            }
            counter.ticked = false;
            c.set(counter);
            Some(counter.elapsed(self.ticks_per_day))
        })
    }

    /// Re-baselines the counter, e.g. from a GPS clock message.
    ///
    /// The next [`TimeBase::take`] reports the new time even if no tick happened.
    pub fn set(&self, elapsed: ElapsedTime) {
        let seconds = elapsed.seconds.min(SECONDS_PER_DAY - 1);
        let ticks = seconds as u64 * self.ticks_per_day as u64 / SECONDS_PER_DAY as u64;
        self.counter.lock(|c| {
            c.set(TickCounter {
                days: elapsed.days,
                ticks: ticks as u32,
                ticked: true,
            })
        });
    }

    pub fn counter(&self) -> TickCounter {
        self.counter.lock(|c| c.get())
    }
}
