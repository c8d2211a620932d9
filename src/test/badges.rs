#[cfg(test)]
mod tests {
    use crate::badges::{BADGE_TIERS, badge_for_xp, badge_info};

    #[test]
    fn test_zero_xp_resolves_to_beginner() {
        let badge = badge_for_xp(0);

        assert_eq!(badge.name, "Recovery Beginner");
        assert_eq!(badge.threshold, 0);
    }

    #[test]
    fn test_top_threshold_resolves_to_champion() {
        assert_eq!(badge_for_xp(10000).name, "Recovery Champion");
        assert_eq!(badge_for_xp(250000).name, "Recovery Champion");
    }

    #[test]
    fn test_every_xp_value_resolves_to_a_badge() {
        for xp in 0..=11000 {
            let badge = badge_for_xp(xp);
            assert!(
                xp >= badge.threshold,
                "Badge {} awarded below its threshold at {} XP",
                badge.name,
                xp
            );
        }
    }

    #[test]
    fn test_badge_rank_is_monotonic_in_xp() {
        let tier_rank = |name: &str| {
            BADGE_TIERS
                .iter()
                .position(|tier| tier.name == name)
                .expect("Unknown badge name")
        };

        let mut previous = tier_rank(badge_for_xp(0).name);

        for xp in 1..=11000 {
            let current = tier_rank(badge_for_xp(xp).name);
            assert!(
                current <= previous,
                "Badge regressed from {} to {} at {} XP",
                BADGE_TIERS[previous].name,
                BADGE_TIERS[current].name,
                xp
            );
            previous = current;
        }
    }

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(badge_for_xp(24).name, "Recovery Beginner");
        assert_eq!(badge_for_xp(25).name, "Recovery Growing");
        assert_eq!(badge_for_xp(49).name, "Recovery Growing");
        assert_eq!(badge_for_xp(50).name, "Recovery Inspired");
        assert_eq!(badge_for_xp(749).name, "Recovery Energized");
        assert_eq!(badge_for_xp(999).name, "Recovery Focused");
        assert_eq!(badge_for_xp(1000).name, "Recovery Guardian");
        assert_eq!(badge_for_xp(9999).name, "Recovery Master");
    }

    #[test]
    fn test_next_badge_is_lowest_tier_above_current_xp() {
        let info = badge_info(40);

        assert_eq!(info.current, "Recovery Growing");
        assert_eq!(info.next, Some("Recovery Inspired"));
        assert_eq!(info.xp_to_next, Some(10));
    }

    #[test]
    fn test_progress_toward_next_tier() {
        let info = badge_info(75);

        assert_eq!(info.current, "Recovery Inspired");
        assert_eq!(info.next, Some("Recovery Strong"));
        assert_eq!(info.xp_to_next, Some(25));
        assert_eq!(info.progress, 75);
    }

    #[test]
    fn test_top_tier_has_no_next_badge() {
        let info = badge_info(12000);

        assert_eq!(info.current, "Recovery Champion");
        assert_eq!(info.next, None);
        assert_eq!(info.xp_to_next, None);
        assert_eq!(info.progress, 100);
    }
}
