//! Natural-language due date parsing
//!
//! Finds a date/time phrase anywhere in free text ("buy milk tomorrow",
//! "standup next monday 3pm", "in 2 hours") and resolves it against the
//! current local time.

use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
    Weekday,
};
use regex::{Captures, Regex};
use tracing::debug;

/// Hour used when a phrase names a day but no time
const DEFAULT_HOUR: u32 = 9;

/// Hour used for "tonight"
const TONIGHT_HOUR: u32 = 20;

const MONTHS: &str = "(jan|january|feb|february|mar|march|apr|april|may|jun|june|jul|july|aug|august|sep|sept|september|oct|october|nov|november|dec|december)";

/// Extracts a due timestamp from free text
pub trait DateParser: Send + Sync {
    /// Returns `None` when the text has no recognizable date or time
    fn parse(&self, text: &str) -> Option<DateTime<Utc>>;
}

/// Regex-driven parser for common English date/time phrases
#[derive(Debug)]
pub struct NaturalDateParser {
    relative: Regex,
    iso: Regex,
    month_day: Regex,
    day_month: Regex,
    day_word: Regex,
    weekday: Regex,
    noon: Regex,
    meridiem: Regex,
    clock: Regex,
    at_hour: Regex,
}

/// A calendar day named in the text
struct DayMatch {
    date: NaiveDate,
    /// Hour used when the text gives no time
    default_hour: u32,
    /// Move to the next day once the default hour has passed ("today", "tonight")
    rolls_over: bool,
}

impl DayMatch {
    fn fixed(date: NaiveDate) -> Self {
        Self {
            date,
            default_hour: DEFAULT_HOUR,
            rolls_over: false,
        }
    }

    fn rolling(date: NaiveDate, default_hour: u32) -> Self {
        Self {
            date,
            default_hour,
            rolls_over: true,
        }
    }
}

/// How far ahead a relative phrase points
enum Offset {
    /// Exact point in time ("in 20 minutes")
    Exact(Duration),
    /// Whole days; an explicit time of day may pin it ("in 2 days at 3pm")
    Days(i64),
}

impl NaturalDateParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            relative: Regex::new(
                r"\bin\s+(\d{1,4}|an?|one)\s+(minutes?|mins?|hours?|hrs?|days?|weeks?)\b",
            )?,
            iso: Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b")?,
            month_day: Regex::new(&format!(r"\b{MONTHS}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b"))?,
            day_month: Regex::new(&format!(
                r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTHS}\b"
            ))?,
            day_word: Regex::new(r"\b(today|tonight|tomorrow)\b")?,
            // Abbreviations like "sat" or "wed" are ordinary words on their own
            weekday: Regex::new(
                r"\b(?:(?:next|this|on)\s+(mon|tues?|wed|thu|thurs?|fri|sat|sun)|(?:(?:next|this|on)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday))\b",
            )?,
            noon: Regex::new(r"\b(noon|midnight)\b")?,
            meridiem: Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b")?,
            clock: Regex::new(r"\b(\d{1,2}):(\d{2})\b")?,
            at_hour: Regex::new(r"\bat\s+(\d{1,2})\b")?,
        })
    }

    /// Resolve a due date relative to `now` (local wall-clock time)
    pub fn parse_naive(&self, text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let text = text.to_lowercase();
        let today = now.date();
        let time = self.find_time(&text);

        if let Some(offset) = self.find_offset(&text) {
            return match (offset, time) {
                (Offset::Exact(delta), _) => now.checked_add_signed(delta),
                (Offset::Days(days), Some(time)) => today
                    .checked_add_signed(Duration::days(days))
                    .map(|date| date.and_time(time)),
                (Offset::Days(days), None) => now.checked_add_signed(Duration::days(days)),
            };
        }

        match (self.find_date(&text, today), time) {
            (Some(day), Some(time)) => Some(day.date.and_time(time)),
            (Some(day), None) => {
                let candidate = day.date.and_hms_opt(day.default_hour, 0, 0)?;
                if day.rolls_over && candidate <= now {
                    candidate.checked_add_signed(Duration::days(1))
                } else {
                    Some(candidate)
                }
            }
            (None, Some(time)) => {
                // A bare time that already passed means tomorrow
                let candidate = today.and_time(time);
                if candidate > now {
                    Some(candidate)
                } else {
                    today.succ_opt().map(|date| date.and_time(time))
                }
            }
            (None, None) => None,
        }
    }

    fn find_offset(&self, text: &str) -> Option<Offset> {
        let caps = self.relative.captures(text)?;
        let amount: i64 = match &caps[1] {
            "a" | "an" | "one" => 1,
            digits => digits.parse().ok()?,
        };

        match caps[2].trim_end_matches('s') {
            "minute" | "min" => Some(Offset::Exact(Duration::minutes(amount))),
            "hour" | "hr" => Some(Offset::Exact(Duration::hours(amount))),
            "day" => Some(Offset::Days(amount)),
            "week" => Some(Offset::Days(amount * 7)),
            _ => None,
        }
    }

    fn find_date(&self, text: &str, today: NaiveDate) -> Option<DayMatch> {
        self.iso
            .captures(text)
            .and_then(|caps| {
                NaiveDate::from_ymd_opt(
                    caps[1].parse().ok()?,
                    caps[2].parse().ok()?,
                    caps[3].parse().ok()?,
                )
            })
            .map(DayMatch::fixed)
            .or_else(|| {
                self.month_day
                    .captures(text)
                    .and_then(|caps| upcoming_day_of_year(&caps[1], &caps[2], today))
                    .map(DayMatch::fixed)
            })
            .or_else(|| {
                self.day_month
                    .captures(text)
                    .and_then(|caps| upcoming_day_of_year(&caps[2], &caps[1], today))
                    .map(DayMatch::fixed)
            })
            .or_else(|| {
                self.day_word
                    .captures(text)
                    .and_then(|caps| match &caps[1] {
                        "today" => Some(DayMatch::rolling(today, DEFAULT_HOUR)),
                        "tonight" => Some(DayMatch::rolling(today, TONIGHT_HOUR)),
                        _ => today.succ_opt().map(DayMatch::fixed),
                    })
            })
            .or_else(|| {
                self.weekday
                    .captures(text)
                    .and_then(|caps| weekday_from_name(caps.get(1).or(caps.get(2))?.as_str()))
                    .map(|weekday| DayMatch::fixed(next_weekday(today, weekday)))
            })
    }

    fn find_time(&self, text: &str) -> Option<NaiveTime> {
        if let Some(caps) = self.noon.captures(text) {
            let hour = if &caps[1] == "noon" { 12 } else { 0 };
            return NaiveTime::from_hms_opt(hour, 0, 0);
        }

        if let Some(caps) = self.meridiem.captures(text) {
            return meridiem_time(&caps);
        }

        if let Some(caps) = self.clock.captures(text) {
            return NaiveTime::from_hms_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, 0);
        }

        self.at_hour
            .captures(text)
            .and_then(|caps| NaiveTime::from_hms_opt(caps[1].parse().ok()?, 0, 0))
    }
}

impl DateParser for NaturalDateParser {
    fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        let Some(naive) = self.parse_naive(text, Local::now().naive_local()) else {
            debug!(text, "no date found in text");
            return None;
        };

        // Nonexistent local times (DST gaps) resolve to nothing
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    }
}

/// 12-hour clock time such as "9am" or "3:30 pm"
fn meridiem_time(caps: &Captures<'_>) -> Option<NaiveTime> {
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if !(1..=12).contains(&hour) {
        return None;
    }

    let hour = match (&caps[3], hour) {
        ("am", 12) => 0,
        ("am", h) => h,
        ("pm", 12) => 12,
        (_, h) => h + 12,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// The next occurrence of a month/day, this year or next
fn upcoming_day_of_year(month: &str, day: &str, today: NaiveDate) -> Option<NaiveDate> {
    let month = month_from_name(month)?;
    let day: u32 = day.parse().ok()?;

    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if this_year >= today {
        Some(this_year)
    } else {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    }
}

fn month_from_name(name: &str) -> Option<u32> {
    let month = match name.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    let weekday = match name.get(..3)? {
        "mon" => Weekday::Mon,
        "tue" => Weekday::Tue,
        "wed" => Weekday::Wed,
        "thu" => Weekday::Thu,
        "fri" => Weekday::Fri,
        "sat" => Weekday::Sat,
        "sun" => Weekday::Sun,
        _ => return None,
    };
    Some(weekday)
}

/// The next day falling on `weekday`, never today
fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let mut ahead = (target - current).rem_euclid(7);
    if ahead == 0 {
        ahead = 7;
    }
    today + Duration::days(ahead)
}
