use serde::{Deserialize, Serialize};

pub const MAX_UTC_OFFSET_SECS: i32 = 24 * 60 * 60;

/// Recurring DST transition, e.g. "last Sunday of March at 03:00".
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DstRule {
    /// Month, 1-12. 0 disables DST when used as the start rule.
    pub month: u8,
    /// Week in month, 1-4, or 5 for the last one
    pub week: u8,
    /// Day of week, 0 = Monday, 6 = Sunday
    pub weekday: u8,
    /// Hour shown on the DST clock at the transition (xx:00:00 DST).
    /// The transition happens at `hour - 1` local standard time, 0 means unset.
    pub hour: u8,
}

impl DstRule {
    pub const DISABLED: DstRule = DstRule {
        month: 0,
        week: 0,
        weekday: 0,
        hour: 0,
    };

    pub const fn new(month: u8, week: u8, weekday: u8, hour: u8) -> Self {
        Self {
            month,
            week,
            weekday,
            hour,
        }
    }

    pub(crate) fn is_set(&self) -> bool {
        self.hour != 0
    }

    /// Second of the (standard time) day at which the transition happens.
    pub(crate) fn second_in_day(&self) -> u32 {
        (self.hour.saturating_sub(1) as u32) * 3600
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Added to UTC to get the local standard time
    pub utc_offset_secs: i32,
    pub dst_start: DstRule,
    pub dst_end: DstRule,
}

// CET/CEST
impl Default for Settings {
    fn default() -> Self {
        Self {
            utc_offset_secs: 3600,
            dst_start: DstRule::new(3, 5, 6, 3),
            dst_end: DstRule::new(10, 5, 6, 3),
        }
    }
}

impl Settings {
    pub const fn without_dst(utc_offset_secs: i32) -> Self {
        Self {
            utc_offset_secs,
            dst_start: DstRule::DISABLED,
            dst_end: DstRule::DISABLED,
        }
    }

    pub fn utc_offset(&self) -> i32 {
        self.utc_offset_secs
            .clamp(-MAX_UTC_OFFSET_SECS, MAX_UTC_OFFSET_SECS)
    }

    pub fn dst_enabled(&self) -> bool {
        self.dst_start.is_set() && self.dst_end.is_set() && self.dst_start.month != 0
    }
}
