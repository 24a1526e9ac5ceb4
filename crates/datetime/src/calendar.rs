use crate::settings::{DstRule, Settings};

/// Year of elapsed day 0
pub const REF_YEAR: u16 = 1970;

/// Day of week of 1/1/REF_YEAR, 0 = Monday, 6 = Sunday
pub const EPOCH_WEEKDAY: u8 = 3;

pub const SECONDS_PER_HOUR: u32 = 3600;
pub const SECONDS_PER_DAY: u32 = 24 * SECONDS_PER_HOUR;

const NONLEAP_DAYS: u16 = 365;
const DAYS_PER_FOUR_YEARS: u16 = 3 * NONLEAP_DAYS + (NONLEAP_DAYS + 1);

const MONTH_DAYS: [[u8; 12]; 2] = [
    [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31],
    [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31],
];

/// Time elapsed since 1970-01-01 00:00:00 UTC, `days * 86400 + seconds`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ElapsedTime {
    pub days: u16,
    /// Always < 86400
    pub seconds: u32,
}

impl ElapsedTime {
    pub const fn new(days: u16, seconds: u32) -> Self {
        Self { days, seconds }
    }

    /// Saturates at the last representable day.
    pub fn from_unix_secs(secs: u64) -> Self {
        let days = secs / SECONDS_PER_DAY as u64;
        if days > u16::MAX as u64 {
            return Self::new(u16::MAX, SECONDS_PER_DAY - 1);
        }
        Self::new(days as u16, (secs % SECONDS_PER_DAY as u64) as u32)
    }

    pub fn as_unix_secs(&self) -> u64 {
        self.days as u64 * SECONDS_PER_DAY as u64 + self.seconds as u64
    }
}

/// Local date and time
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LocalTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Default for LocalTime {
    fn default() -> Self {
        Self {
            year: REF_YEAR,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

// Every 4th year, the range is too small to care about centuries
fn is_leap_year(year: u16) -> bool {
    year % 4 == 0
}

fn month_days(leap_year: bool, month: u8) -> u16 {
    MONTH_DAYS[leap_year as usize][month.clamp(1, 12) as usize - 1] as u16
}

fn year_days(year: u16) -> u16 {
    if is_leap_year(year) {
        NONLEAP_DAYS + 1
    } else {
        NONLEAP_DAYS
    }
}

fn apply_utc_offset(elapsed: ElapsedTime, offset: i32) -> (u16, u32) {
    let mut days = elapsed.days as i32;
    let mut seconds = elapsed.seconds.min(SECONDS_PER_DAY - 1) as i32 + offset;

    if seconds >= SECONDS_PER_DAY as i32 {
        days += 1;
        seconds -= SECONDS_PER_DAY as i32;
    } else if seconds < 0 {
        days -= 1;
        seconds += SECONDS_PER_DAY as i32;
    }

    if days < 0 {
        (0, 0)
    } else if days > u16::MAX as i32 {
        (u16::MAX, SECONDS_PER_DAY - 1)
    } else {
        (days as u16, seconds as u32)
    }
}

/// Splits a day count into (year, day of year)
fn split_years(days: u16) -> (u16, u16) {
    let mut year = REF_YEAR + 4 * (days / DAYS_PER_FOUR_YEARS);
    let mut remaining = days % DAYS_PER_FOUR_YEARS;

    loop {
        let len = year_days(year);
        if remaining < len {
            return (year, remaining);
        }
        year += 1;
        remaining -= len;
    }
}

/// Day of year of a rule's "nth weekday of month"
fn week_day_to_offset(first_day_of_year: u8, leap_year: bool, rule: &DstRule) -> u16 {
    let month = rule.month.clamp(1, 12);
    let offset: u16 = (1..month).map(|m| month_days(leap_year, m)).sum();

    let first_day_of_month = ((first_day_of_year as u16 + offset) % 7) as u8;
    let mut day = ((rule.weekday % 7 + 7 - first_day_of_month) % 7) as u16;
    day += 7 * (rule.week.max(1) as u16 - 1);

    // the 5th week may not fit, fall back to the last one
    let len = month_days(leap_year, month);
    while day >= len {
        day -= 7;
    }

    offset + day
}

fn is_dst(
    settings: &Settings,
    new_year_days: u16,
    day_of_year: u16,
    seconds: u32,
    leap_year: bool,
) -> bool {
    if !settings.dst_enabled() {
        return false;
    }

    let first_day_of_year = ((new_year_days as u32 + EPOCH_WEEKDAY as u32) % 7) as u8;
    let start = week_day_to_offset(first_day_of_year, leap_year, &settings.dst_start);
    let end = week_day_to_offset(first_day_of_year, leap_year, &settings.dst_end);

    if day_of_year < start {
        false
    } else if day_of_year == start {
        seconds >= settings.dst_start.second_in_day()
    } else if day_of_year < end {
        true
    } else if day_of_year == end {
        seconds < settings.dst_end.second_in_day()
    } else {
        false
    }
}

/// Computes the local date and time of `elapsed` for the given time zone and DST rules.
///
/// Never fails: a DST rule pushing the date past December 31st rolls over to
/// January 1st of the next year.
pub fn recalc_local_time(elapsed: ElapsedTime, settings: &Settings) -> LocalTime {
    let (days, mut seconds) = apply_utc_offset(elapsed, settings.utc_offset());
    let (mut year, mut day_of_year) = split_years(days);
    let leap_year = is_leap_year(year);

    if is_dst(settings, days - day_of_year, day_of_year, seconds, leap_year) {
        seconds += SECONDS_PER_HOUR;
        if seconds >= SECONDS_PER_DAY {
            day_of_year += 1;
            seconds -= SECONDS_PER_DAY;
        }
    }

    let mut month = 1;
    while day_of_year >= month_days(leap_year, month) {
        day_of_year -= month_days(leap_year, month);
        month += 1;

        if month == 13 {
            // only with a weird DST rule
            month = 1;
            year += 1;
            break;
        }
    }

    LocalTime {
        year,
        month,
        day: day_of_year as u8 + 1,
        hour: (seconds / SECONDS_PER_HOUR) as u8,
        minute: (seconds % SECONDS_PER_HOUR / 60) as u8,
        second: (seconds % 60) as u8,
    }
}

/// Days elapsed from 1970-01-01 to the given date, `None` if it is not representable.
pub fn days_from_civil(year: u16, month: u8, day: u8) -> Option<u16> {
    if year < REF_YEAR || !(1..=12).contains(&month) {
        return None;
    }
    let leap_year = is_leap_year(year);
    if day == 0 || day as u16 > month_days(leap_year, month) {
        return None;
    }

    let blocks = (year - REF_YEAR) / 4;
    let mut days = blocks as u32 * DAYS_PER_FOUR_YEARS as u32;
    for y in REF_YEAR + 4 * blocks..year {
        days += year_days(y) as u32;
    }
    for m in 1..month {
        days += month_days(leap_year, m) as u32;
    }
    days += day as u32 - 1;

    u16::try_from(days).ok()
}
