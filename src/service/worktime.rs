use chrono::NaiveTime;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Minutes from `start` to `end` on a wall clock.
///
/// A negative span means the shift crossed midnight, so a day is added.
pub fn minutes_between(start: NaiveTime, end: NaiveTime) -> i64 {
    let mut diff = end.signed_duration_since(start).num_minutes();
    if diff < 0 {
        diff += MINUTES_PER_DAY;
    }
    diff.max(0)
}

pub fn overtime_minutes(worked_minutes: i64, standard_minutes: i64) -> i64 {
    (worked_minutes - standard_minutes).max(0)
}

/// Worked and overtime minutes for a (possibly incomplete) attendance day.
pub fn day_minutes(
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
    standard_minutes: i64,
) -> (i32, i32) {
    match (check_in, check_out) {
        (Some(start), Some(end)) => {
            let worked = minutes_between(start, end);
            let overtime = overtime_minutes(worked, standard_minutes);
            (worked as i32, overtime as i32)
        }
        _ => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn same_day_span() {
        assert_eq!(minutes_between(t(9, 0), t(17, 30)), 510);
    }

    #[test]
    fn crossing_midnight_adds_a_day() {
        assert_eq!(minutes_between(t(22, 0), t(6, 15)), 8 * 60 + 15);
    }

    #[test]
    fn identical_times_are_zero() {
        assert_eq!(minutes_between(t(8, 0), t(8, 0)), 0);
    }

    #[test]
    fn overtime_is_clamped_to_zero() {
        assert_eq!(overtime_minutes(300, 480), 0);
        assert_eq!(overtime_minutes(540, 480), 60);
    }

    #[test]
    fn incomplete_days_have_no_minutes() {
        assert_eq!(day_minutes(Some(t(9, 0)), None, 480), (0, 0));
        assert_eq!(day_minutes(Some(t(20, 0)), Some(t(6, 0)), 480), (600, 120));
    }
}
