use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a cached team total stays servable before the next read goes
/// back to the database.
const TEAM_XP_TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    total_xp: i64,
    cached_at: Instant,
}

static TEAM_XP_CACHE: Lazy<Mutex<HashMap<i64, CacheEntry>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Cached total XP for a team, if present and within its TTL.
pub fn lookup(team_id: i64) -> Option<i64> {
    let cache = TEAM_XP_CACHE.lock().unwrap();

    cache
        .get(&team_id)
        .filter(|entry| entry.cached_at.elapsed() < TEAM_XP_TTL)
        .map(|entry| entry.total_xp)
}

pub fn store(team_id: i64, total_xp: i64) {
    let mut cache = TEAM_XP_CACHE.lock().unwrap();

    cache.insert(
        team_id,
        CacheEntry {
            total_xp,
            cached_at: Instant::now(),
        },
    );
}

/// Drop the entry for one team. Called synchronously by every mutation that
/// changes the team's membership or a member's XP.
pub fn invalidate(team_id: i64) {
    let mut cache = TEAM_XP_CACHE.lock().unwrap();

    cache.remove(&team_id);
}

#[cfg(test)]
pub fn clear() {
    let mut cache = TEAM_XP_CACHE.lock().unwrap();

    cache.clear();
}
