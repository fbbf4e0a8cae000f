//! Time-of-day helpers shared by the server and the client.

use chrono::{NaiveDate, NaiveTime};

use crate::models::BusySlot;

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Signed length of `start..end` in hours.
pub fn duration_hours(start: NaiveTime, end: NaiveTime) -> f64 {
    (end - start).num_seconds() as f64 / 3600.0
}

/// Half-open interval overlap: touching ends do not collide.
pub fn overlaps(a_start: NaiveTime, a_end: NaiveTime, b_start: NaiveTime, b_end: NaiveTime) -> bool {
    a_start < b_end && b_start < a_end
}

pub fn is_free(busy: &[BusySlot], start: NaiveTime, end: NaiveTime) -> bool {
    !busy
        .iter()
        .any(|slot| overlaps(start, end, slot.start_time, slot.end_time))
}

/// Gaps between `open` and `close` not covered by any busy slot.
pub fn free_windows(busy: &[BusySlot], open: NaiveTime, close: NaiveTime) -> Vec<(NaiveTime, NaiveTime)> {
    let mut slots: Vec<BusySlot> = busy
        .iter()
        .filter(|s| s.start_time < close && s.end_time > open)
        .copied()
        .collect();
    slots.sort_by_key(|s| s.start_time);

    let mut windows = Vec::new();
    let mut cursor = open;
    for slot in slots {
        if slot.start_time > cursor {
            windows.push((cursor, slot.start_time));
        }
        if slot.end_time > cursor {
            cursor = slot.end_time;
        }
    }
    if cursor < close {
        windows.push((cursor, close));
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn slot(start: NaiveTime, end: NaiveTime) -> BusySlot {
        BusySlot {
            start_time: start,
            end_time: end,
        }
    }

    #[rstest]
    #[case("09:30", Some(t(9, 30)))]
    #[case("09:30:00", Some(t(9, 30)))]
    #[case(" 14:05 ", Some(t(14, 5)))]
    #[case("25:00", None)]
    #[case("nine", None)]
    #[case("", None)]
    fn parses_times(#[case] raw: &str, #[case] expected: Option<NaiveTime>) {
        assert_eq!(parse_time(raw), expected);
    }

    #[test]
    fn parses_iso_dates_only() {
        assert_eq!(parse_date("2025-03-14"), NaiveDate::from_ymd_opt(2025, 3, 14));
        assert_eq!(parse_date("14/03/2025"), None);
    }

    #[test]
    fn duration_is_signed() {
        assert_eq!(duration_hours(t(9, 0), t(10, 30)), 1.5);
        assert_eq!(duration_hours(t(10, 0), t(9, 0)), -1.0);
        assert_eq!(duration_hours(t(10, 0), t(10, 0)), 0.0);
    }

    #[rstest]
    #[case(t(9, 0), t(10, 0), t(9, 30), t(11, 0), true)]
    #[case(t(9, 0), t(10, 0), t(10, 0), t(11, 0), false)]
    #[case(t(9, 0), t(12, 0), t(10, 0), t(11, 0), true)]
    #[case(t(13, 0), t(14, 0), t(9, 0), t(10, 0), false)]
    fn detects_overlap(
        #[case] a_start: NaiveTime,
        #[case] a_end: NaiveTime,
        #[case] b_start: NaiveTime,
        #[case] b_end: NaiveTime,
        #[case] expected: bool,
    ) {
        assert_eq!(overlaps(a_start, a_end, b_start, b_end), expected);
        assert_eq!(overlaps(b_start, b_end, a_start, a_end), expected);
    }

    #[test]
    fn free_windows_fill_the_gaps() {
        let busy = [
            slot(t(13, 0), t(14, 0)),
            slot(t(9, 0), t(10, 0)),
            slot(t(9, 30), t(11, 0)),
        ];
        assert_eq!(
            free_windows(&busy, t(8, 0), t(17, 0)),
            vec![(t(8, 0), t(9, 0)), (t(11, 0), t(13, 0)), (t(14, 0), t(17, 0))]
        );
    }

    #[test]
    fn free_windows_clip_to_opening_hours() {
        let busy = [slot(t(7, 0), t(9, 0)), slot(t(16, 0), t(19, 0))];
        assert_eq!(free_windows(&busy, t(8, 0), t(17, 0)), vec![(t(9, 0), t(16, 0))]);
        assert!(free_windows(&[slot(t(8, 0), t(17, 0))], t(8, 0), t(17, 0)).is_empty());
    }

    #[test]
    fn is_free_respects_boundaries() {
        let busy = [slot(t(10, 0), t(11, 0))];
        assert!(is_free(&busy, t(11, 0), t(12, 0)));
        assert!(!is_free(&busy, t(10, 30), t(11, 30)));
    }
}
