//! Display-state formatter.
//!
//! Pure mapping from the latest known time/battery/weather values to the
//! strings shown on screen. All outputs are fixed-capacity owned strings
//! sized for their worst case, so formatting can never overflow a buffer.

use core::fmt::Write;

use heapless::String;

use super::{ClockReading, ClockStyle, DeviceBatteryState};

/// Capacity of every formatted text. Worst cases: weekday "Wednesday" (9),
/// date "2013-10-02" (10), temperature "-32768°C" (10 bytes in UTF-8).
pub const TEXT_LEN: usize = 12;

/// A formatted piece of display text.
pub type Text = String<TEXT_LEN>;

/// Render hours and minutes according to the clock style preference.
///
/// 24-hour style is zero-padded `HH:MM`. 12-hour style renders the hour
/// unpadded (1–12) and returns the meridiem as a second string; midnight is
/// `12:xx` + `AM`, noon `12:xx` + `PM`, matching the usual host conversion.
/// Rendering the hour unpadded is the one deliberate zero-suppression rule;
/// there is no post-hoc buffer editing.
pub fn format_time(reading: &ClockReading, style: ClockStyle) -> (Text, Option<Text>) {
    let mut time = Text::new();
    match style {
        ClockStyle::H24 => {
            write!(time, "{:02}:{:02}", reading.hour, reading.minute).ok();
            (time, None)
        }
        ClockStyle::H12 => {
            let (hour, pm) = hour12(reading.hour);
            write!(time, "{}:{:02}", hour, reading.minute).ok();
            let mut meridiem = Text::new();
            meridiem.push_str(if pm { "PM" } else { "AM" }).ok();
            (time, Some(meridiem))
        }
    }
}

/// Convert a 24-hour value to (hour on a 12-hour dial, is PM).
fn hour12(hour: u8) -> (u8, bool) {
    let pm = hour >= 12;
    match hour % 12 {
        0 => (12, pm),
        h => (h, pm),
    }
}

/// Full weekday name plus an ISO date string (`YYYY-MM-DD`).
pub fn format_date(reading: &ClockReading) -> (Text, Text) {
    let mut weekday = Text::new();
    weekday.push_str(weekday_name(reading)).ok();

    let mut date = Text::new();
    write!(
        date,
        "{:04}-{:02}-{:02}",
        reading.year, reading.month, reading.day
    )
    .ok();

    (weekday, date)
}

fn weekday_name(reading: &ClockReading) -> &'static str {
    use chrono::Weekday::*;
    match reading.weekday {
        Mon => "Monday",
        Tue => "Tuesday",
        Wed => "Wednesday",
        Thu => "Thursday",
        Fri => "Friday",
        Sat => "Saturday",
        Sun => "Sunday",
    }
}

/// Battery percentage with a trailing status character.
///
/// `+` while charging, `=` while merely plugged; charging wins when both
/// flags are set. The percentage is clamped to 0–100 before rendering, so a
/// bogus source value can never grow the string past its worst case.
pub fn format_battery(state: &DeviceBatteryState) -> Text {
    let mut text = Text::new();
    write!(text, "{}%", state.percent.min(100)).ok();
    if state.charging {
        text.push('+').ok();
    } else if state.plugged {
        text.push('=').ok();
    }
    text
}

/// Temperature in whole degrees Celsius, e.g. `-4°C`.
pub fn format_temperature(celsius: i16) -> Text {
    let mut text = Text::new();
    write!(text, "{}\u{00B0}C", celsius).ok();
    text
}

/// Time in another zone as a fixed hour offset from local time.
///
/// This is a deliberate approximation: no timezone database, so the value
/// drifts across daylight-saving transitions in either zone.
pub fn format_alternate_zone(reading: &ClockReading, offset_hours: i8) -> Text {
    let minutes = reading.hour as i32 * 60 + reading.minute as i32 + offset_hours as i32 * 60;
    let minutes = minutes.rem_euclid(24 * 60);

    let mut text = Text::new();
    write!(text, "{:02}:{:02}", minutes / 60, minutes % 60).ok();
    text
}

/// Swatch ".beats" internet time: `@NNN`, 1000 beats per day.
///
/// One beat is 86.4 seconds; the value is the floor of
/// seconds-since-midnight / 86.4, computed in integer math. No rounding.
pub fn format_beats(reading: &ClockReading) -> Text {
    let beats = reading.seconds_since_midnight() * 10 / 864;

    let mut text = Text::new();
    write!(text, "@{:03}", beats).ok();
    text
}

/// The hourly chime fires exactly at the top of the hour, and only if the
/// feature is enabled. Keyed on the minute alone so a first render mid-hour
/// never chimes just because the hour field is new.
pub fn should_chime(reading: &ClockReading, enabled: bool) -> bool {
    enabled && reading.minute == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn reading(hour: u8, minute: u8, second: u8) -> ClockReading {
        ClockReading {
            year: 2013,
            month: 10,
            day: 2,
            hour,
            minute,
            second,
            weekday: Weekday::Wed,
        }
    }

    #[test]
    fn h24_is_zero_padded() {
        let (time, meridiem) = format_time(&reading(9, 5, 0), ClockStyle::H24);
        assert_eq!(time.as_str(), "09:05");
        assert!(meridiem.is_none());
    }

    #[test]
    fn h12_never_has_a_leading_zero_or_space() {
        for hour in 0..24 {
            for minute in [0, 7, 59] {
                let (time, meridiem) = format_time(&reading(hour, minute, 0), ClockStyle::H12);
                let first = time.chars().next().unwrap();
                assert!(first.is_ascii_digit() && first != '0', "got {:?}", time);
                assert!(meridiem.is_some());
            }
        }
    }

    #[test]
    fn h12_midnight_and_noon() {
        let (time, meridiem) = format_time(&reading(0, 30, 0), ClockStyle::H12);
        assert_eq!(time.as_str(), "12:30");
        assert_eq!(meridiem.unwrap().as_str(), "AM");

        let (time, meridiem) = format_time(&reading(12, 0, 0), ClockStyle::H12);
        assert_eq!(time.as_str(), "12:00");
        assert_eq!(meridiem.unwrap().as_str(), "PM");

        let (time, meridiem) = format_time(&reading(13, 5, 0), ClockStyle::H12);
        assert_eq!(time.as_str(), "1:05");
        assert_eq!(meridiem.unwrap().as_str(), "PM");
    }

    #[test]
    fn date_is_weekday_plus_iso() {
        let (weekday, date) = format_date(&reading(9, 0, 0));
        assert_eq!(weekday.as_str(), "Wednesday");
        assert_eq!(date.as_str(), "2013-10-02");
    }

    #[test]
    fn battery_renders_every_percentage() {
        for percent in 0..=100u8 {
            let text = format_battery(&DeviceBatteryState {
                percent,
                charging: false,
                plugged: false,
            });
            let digits: &str = &text[..text.len() - 1];
            assert_eq!(digits.parse::<u8>().unwrap(), percent);
            assert!(text.ends_with('%'));
        }
    }

    #[test]
    fn battery_clamps_out_of_range_input() {
        let text = format_battery(&DeviceBatteryState {
            percent: 255,
            charging: false,
            plugged: false,
        });
        assert_eq!(text.as_str(), "100%");
    }

    #[test]
    fn battery_status_char_charging_beats_plugged() {
        let charging = DeviceBatteryState {
            percent: 50,
            charging: true,
            plugged: true,
        };
        assert_eq!(format_battery(&charging).as_str(), "50%+");

        let plugged = DeviceBatteryState {
            percent: 50,
            charging: false,
            plugged: true,
        };
        assert_eq!(format_battery(&plugged).as_str(), "50%=");
    }

    #[test]
    fn temperature_keeps_its_sign() {
        assert_eq!(format_temperature(21).as_str(), "21\u{00B0}C");
        assert_eq!(format_temperature(-4).as_str(), "-4\u{00B0}C");
        // Worst case must fit the fixed capacity.
        assert_eq!(format_temperature(i16::MIN).as_str(), "-32768\u{00B0}C");
    }

    #[test]
    fn alternate_zone_wraps_around_midnight() {
        assert_eq!(format_alternate_zone(&reading(23, 30, 0), 2).as_str(), "01:30");
        assert_eq!(format_alternate_zone(&reading(1, 15, 0), -6).as_str(), "19:15");
        assert_eq!(format_alternate_zone(&reading(9, 23, 0), 0).as_str(), "09:23");
    }

    #[test]
    fn beats_floors_and_zero_pads() {
        assert_eq!(format_beats(&reading(0, 0, 0)).as_str(), "@000");
        assert_eq!(format_beats(&reading(12, 0, 0)).as_str(), "@500");
        // 86 s is still beat zero, 87 s is beat one: floor, no rounding.
        assert_eq!(format_beats(&reading(0, 1, 26)).as_str(), "@000");
        assert_eq!(format_beats(&reading(0, 1, 27)).as_str(), "@001");
        assert_eq!(format_beats(&reading(23, 59, 59)).as_str(), "@999");
    }

    #[test]
    fn chime_requires_top_of_hour_and_feature_flag() {
        for minute in 0..60 {
            let fires = should_chime(&reading(10, minute, 0), true);
            assert_eq!(fires, minute == 0);
        }
        assert!(!should_chime(&reading(10, 0, 0), false));
    }
}
