use std::time::Duration;

use chrono::Timelike;

pub const INVALID_TIME: &str = "Invalid Time";
pub const TIME_ERROR: &str = "Error";

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TimeDisplayMode {
    Hour24,
    Hour12,
}

/// Renders a stored `HH:MM` alarm time. Never panics: missing parts give
/// [`INVALID_TIME`], unparsable parts give [`TIME_ERROR`].
pub fn format_alarm_time(time: &str, mode: TimeDisplayMode) -> String {
    let mut parts = time.trim().splitn(2, ':');
    let (Some(hours), Some(minutes)) = (parts.next(), parts.next()) else {
        return INVALID_TIME.to_string();
    };
    if hours.is_empty() || minutes.is_empty() {
        return INVALID_TIME.to_string();
    }

    let hour = match hours.parse::<u32>() {
        Ok(hour) if hour < 24 => hour,
        _ => return TIME_ERROR.to_string(),
    };
    let minute = match minutes.parse::<u32>() {
        Ok(minute) if minute < 60 && minutes.len() == 2 => minute,
        _ => return TIME_ERROR.to_string(),
    };

    match mode {
        TimeDisplayMode::Hour24 => format!("{hour:02}:{minute:02}"),
        TimeDisplayMode::Hour12 => {
            let (hour12, meridiem) = to_hour12(hour);
            format!("{hour12}:{minute:02} {meridiem}")
        }
    }
}

pub fn format_clock<T: Timelike>(now: &T, mode: TimeDisplayMode) -> String {
    match mode {
        TimeDisplayMode::Hour24 => {
            format!("{:02}:{:02}:{:02}", now.hour(), now.minute(), now.second())
        }
        TimeDisplayMode::Hour12 => {
            let (hour12, meridiem) = to_hour12(now.hour());
            format!(
                "{hour12}:{:02}:{:02} {meridiem}",
                now.minute(),
                now.second()
            )
        }
    }
}

pub fn format_stopwatch(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1_000;
    let millis = total_ms % 1_000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

pub fn format_countdown(remaining: Duration) -> String {
    let total = remaining.as_secs();
    let hours = total / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

fn to_hour12(hour: u32) -> (u32, &'static str) {
    let meridiem = if hour >= 12 { "PM" } else { "AM" };
    let hour12 = match hour % 12 {
        0 => 12,
        h => h,
    };
    (hour12, meridiem)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;

    #[test]
    fn formats_alarm_time_in_both_modes() {
        assert_eq!(format_alarm_time("07:30", TimeDisplayMode::Hour24), "07:30");
        assert_eq!(format_alarm_time("07:30", TimeDisplayMode::Hour12), "7:30 AM");
        assert_eq!(format_alarm_time("00:05", TimeDisplayMode::Hour12), "12:05 AM");
        assert_eq!(format_alarm_time("12:00", TimeDisplayMode::Hour12), "12:00 PM");
        assert_eq!(format_alarm_time("23:59", TimeDisplayMode::Hour12), "11:59 PM");
    }

    #[test]
    fn malformed_alarm_time_renders_sentinels() {
        for value in ["", "0730", "07:", ":30", "   "] {
            assert_eq!(
                format_alarm_time(value, TimeDisplayMode::Hour12),
                INVALID_TIME,
                "value {value:?}"
            );
        }
        for value in ["ab:cd", "25:00", "07:60", "07:5", "7:30:00"] {
            assert_eq!(
                format_alarm_time(value, TimeDisplayMode::Hour24),
                TIME_ERROR,
                "value {value:?}"
            );
        }
    }

    #[test]
    fn formats_display_clock() {
        let time = NaiveTime::from_hms_opt(13, 4, 9).expect("valid");
        assert_eq!(format_clock(&time, TimeDisplayMode::Hour24), "13:04:09");
        assert_eq!(format_clock(&time, TimeDisplayMode::Hour12), "1:04:09 PM");
    }

    #[test]
    fn formats_stopwatch_and_countdown() {
        let elapsed = Duration::from_millis(3_723_045);
        assert_eq!(format_stopwatch(elapsed), "01:02:03.045");
        assert_eq!(format_countdown(elapsed), "01:02:03");
        assert_eq!(format_countdown(Duration::ZERO), "00:00:00");
    }
}
