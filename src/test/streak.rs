#[cfg(test)]
mod tests {
    use crate::streak::advance_streak;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("Invalid test date")
    }

    #[test]
    fn test_first_ever_checkin_starts_streak_at_one() {
        let update = advance_streak(None, 0, day(2025, 6, 10));

        assert_eq!(update.streak, 1);
        assert!(update.needs_persist);
    }

    #[test]
    fn test_same_day_repeat_checkin_is_a_noop() {
        let today = day(2025, 6, 10);
        let update = advance_streak(Some(today), 7, today);

        assert_eq!(update.streak, 7);
        assert!(!update.needs_persist);
    }

    #[test]
    fn test_consecutive_day_checkin_extends_streak() {
        let update = advance_streak(Some(day(2025, 6, 9)), 7, day(2025, 6, 10));

        assert_eq!(update.streak, 8);
        assert!(update.needs_persist);
    }

    #[test]
    fn test_gap_resets_streak_to_one() {
        let update = advance_streak(Some(day(2025, 6, 5)), 12, day(2025, 6, 10));

        assert_eq!(update.streak, 1);
        assert!(update.needs_persist);
    }

    #[test]
    fn test_streak_extends_across_month_boundary() {
        let update = advance_streak(Some(day(2025, 5, 31)), 2, day(2025, 6, 1));

        assert_eq!(update.streak, 3);
        assert!(update.needs_persist);
    }

    #[test]
    fn test_future_last_checkin_resets_streak() {
        // A stored check-in ahead of today can only come from clock skew;
        // treat it like any other broken streak.
        let update = advance_streak(Some(day(2025, 6, 11)), 4, day(2025, 6, 10));

        assert_eq!(update.streak, 1);
        assert!(update.needs_persist);
    }
}
