use serde::Serialize;

/// A named badge tier unlocked at an XP threshold.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BadgeTier {
    pub name: &'static str,
    pub threshold: i64,
    pub description: &'static str,
}

/// Badge tiers ordered by threshold, highest first. The zero-threshold tier
/// at the end guarantees every XP value resolves to a badge.
pub const BADGE_TIERS: [BadgeTier; 11] = [
    BadgeTier {
        name: "Recovery Champion",
        threshold: 10000,
        description: "Achieved the highest level of recovery mastery with 10,000+ XP",
    },
    BadgeTier {
        name: "Recovery Master",
        threshold: 5000,
        description: "Demonstrated exceptional commitment to recovery with 5,000+ XP",
    },
    BadgeTier {
        name: "Recovery Warrior",
        threshold: 2000,
        description: "Shown remarkable dedication to your recovery journey with 2,000+ XP",
    },
    BadgeTier {
        name: "Recovery Guardian",
        threshold: 1000,
        description: "Built a strong foundation in your recovery with 1,000+ XP",
    },
    BadgeTier {
        name: "Recovery Focused",
        threshold: 750,
        description: "Staying consistently focused on your recovery goals with 750+ XP",
    },
    BadgeTier {
        name: "Recovery Energized",
        threshold: 500,
        description: "Maintaining steady momentum in your recovery with 500+ XP",
    },
    BadgeTier {
        name: "Recovery Rising",
        threshold: 250,
        description: "Making significant progress in your recovery journey with 250+ XP",
    },
    BadgeTier {
        name: "Recovery Strong",
        threshold: 100,
        description: "Building strength in your recovery practice with 100+ XP",
    },
    BadgeTier {
        name: "Recovery Inspired",
        threshold: 50,
        description: "Finding inspiration in your recovery journey with 50+ XP",
    },
    BadgeTier {
        name: "Recovery Growing",
        threshold: 25,
        description: "Taking important first steps in your recovery with 25+ XP",
    },
    BadgeTier {
        name: "Recovery Beginner",
        threshold: 0,
        description: "Starting your recovery journey",
    },
];

/// A user's current badge standing: the earned tier, the next tier up (if
/// any), and how far along they are toward it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeInfo {
    pub current: &'static str,
    pub next: Option<&'static str>,
    pub xp_to_next: Option<i64>,
    pub progress: i64,
}

/// Highest tier whose threshold is at or below the given XP. Total over all
/// non-negative XP.
pub fn badge_for_xp(xp: i64) -> &'static BadgeTier {
    BADGE_TIERS
        .iter()
        .find(|tier| xp >= tier.threshold)
        .unwrap_or(&BADGE_TIERS[BADGE_TIERS.len() - 1])
}

/// Full badge standing for the given XP. The next tier is the lowest
/// threshold strictly above the current XP; progress is the integer percent
/// of that threshold reached, or 100 at the top tier.
pub fn badge_info(xp: i64) -> BadgeInfo {
    let current = badge_for_xp(xp);
    let next = BADGE_TIERS.iter().rev().find(|tier| xp < tier.threshold);

    BadgeInfo {
        current: current.name,
        next: next.map(|tier| tier.name),
        xp_to_next: next.map(|tier| tier.threshold - xp),
        progress: match next {
            Some(tier) => xp * 100 / tier.threshold,
            None => 100,
        },
    }
}
