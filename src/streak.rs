use chrono::NaiveDate;

/// Result of advancing a streak: the streak value after today's check-in and
/// whether the stored streak/check-in date actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub streak: i64,
    pub needs_persist: bool,
}

/// Advance a daily streak for a check-in on `today`.
///
/// A check-in on the same calendar day as the last one is a no-op. A check-in
/// exactly one day after the last extends the streak; any longer gap (or a
/// first-ever check-in) resets it to 1. Callers must derive both dates from
/// the same clock reference (UTC) so day boundaries agree.
pub fn advance_streak(
    last_checkin: Option<NaiveDate>,
    current_streak: i64,
    today: NaiveDate,
) -> StreakUpdate {
    match last_checkin {
        Some(last) if last == today => StreakUpdate {
            streak: current_streak,
            needs_persist: false,
        },
        Some(last) if (today - last).num_days() == 1 => StreakUpdate {
            streak: current_streak + 1,
            needs_persist: true,
        },
        _ => StreakUpdate {
            streak: 1,
            needs_persist: true,
        },
    }
}
