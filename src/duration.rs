//! `H:MM:SS` durations as reported by the prober.

/// Turn raw prober output such as `"1:02:03.456000\n"` into `"1:02:03"`.
/// The fractional part is dropped, not rounded.
pub fn format_duration(raw: &str) -> String {
    let line = raw.trim_end_matches(['\n', '\r']);
    line.split('.').next().unwrap_or_default().to_string()
}

/// Parse `H:MM:SS` into seconds. Components that are missing or not numbers count as zero.
pub fn parse_duration(value: &str) -> u64 {
    let mut parts = value.trim().split(':');
    let mut next = || {
        parts
            .next()
            .and_then(|p| p.trim().parse::<u64>().ok())
            .unwrap_or(0)
    };
    let hours = next();
    let minutes = next();
    let seconds = next();
    hours * 3600 + minutes * 60 + seconds
}

pub fn seconds_to_duration(total: u64) -> String {
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Add up a list of `H:MM:SS` durations, e.g. every video of a course.
pub fn sum_durations<S: AsRef<str>>(durations: &[S]) -> String {
    let total = durations.iter().map(|d| parse_duration(d.as_ref())).sum();
    seconds_to_duration(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_newline_and_fraction() {
        assert_eq!(format_duration("1:02:03.456000\n"), "1:02:03");
        assert_eq!(format_duration("0:00:10.000000\r\n"), "0:00:10");
    }

    #[test]
    fn formatting_is_idempotent() {
        let once = format_duration("3:23:54.999999\n");
        assert_eq!(once, "3:23:54");
        assert_eq!(format_duration(&once), once);
    }

    #[test]
    fn empty_output_stays_empty() {
        assert_eq!(format_duration(""), "");
        assert_eq!(format_duration("\n"), "");
    }

    #[test]
    fn sums_across_hours() {
        assert_eq!(sum_durations(&["0:45:30", "1:20:45"]), "2:06:15");
        assert_eq!(sum_durations(&["0:00:10"]), "0:00:10");
        let none: [&str; 0] = [];
        assert_eq!(sum_durations(&none), "0:00:00");
    }

    #[test]
    fn malformed_components_count_as_zero() {
        assert_eq!(parse_duration("x:02:03"), 123);
        assert_eq!(parse_duration("1:02"), 3720);
        assert_eq!(sum_durations(&["garbage", "0:01:00"]), "0:01:00");
    }
}
