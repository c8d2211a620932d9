use crate::{
    auth::{DbUser, DbUserSession, User, UserSession},
    cache,
    error::AppError,
    streak::advance_streak,
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use tracing::{info, instrument};

use crate::models::{
    CompletedTask, DbCompletedTask, DbQuest, DbTask, DbTeam, LeaderboardEntry, MembershipXpRow,
    Quest, Task, Team,
};

const USER_COLUMNS: &str = "id, username, email, role, xp, current_streak, \
     last_checkin_date, profile_photo, sober_start_date";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    info!("Finding user by username");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

#[instrument(skip_all, fields(username, role))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> Result<i64, AppError> {
    info!("Creating new user");

    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Validation(format!(
            "Username '{}' already exists",
            username
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query("INSERT INTO users (username, email, password, role) VALUES (?, ?, ?, ?)")
        .bind(username)
        .bind(email)
        .bind(hashed_password)
        .bind(role)
        .execute(pool)
        .await;

    match res {
        Ok(res) => Ok(res.last_insert_rowid()),
        Err(err) if is_unique_violation(&err) => Err(AppError::Validation(
            "Username or email already exists".to_string(),
        )),
        Err(err) => Err(err.into()),
    }
}

#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let row = sqlx::query_as::<_, (i64, String)>("SELECT id, password FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    match row {
        Some((id, hash)) => {
            let valid = bcrypt::verify(password, &hash).unwrap_or(false);

            if valid {
                Ok(Some(get_user(pool, id).await?))
            } else {
                Ok(None)
            }
        }
        _ => Ok(None),
    }
}

#[instrument]
pub async fn update_username(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_username: &str,
) -> Result<(), AppError> {
    info!("Updating user username");
    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ? AND id != ?")
        .bind(new_username)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Validation("Username already exists".to_string()));
    }

    sqlx::query("UPDATE users SET username = ? WHERE id = ?")
        .bind(new_username)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn update_profile_photo(
    pool: &Pool<Sqlite>,
    user_id: i64,
    profile_photo: Option<&str>,
) -> Result<(), AppError> {
    info!("Updating profile photo reference");
    sqlx::query("UPDATE users SET profile_photo = ? WHERE id = ?")
        .bind(profile_photo)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn set_sober_start_date(
    pool: &Pool<Sqlite>,
    user_id: i64,
    sober_start_date: Option<NaiveDate>,
) -> Result<User, AppError> {
    info!("Updating sobriety start date");
    sqlx::query("UPDATE users SET sober_start_date = ? WHERE id = ?")
        .bind(sober_start_date)
        .bind(user_id)
        .execute(pool)
        .await?;

    get_user(pool, user_id).await
}

/// Adds XP in a single server-side UPDATE. Concurrent completions by the same
/// user must not lose an increment, so this is never read-modify-write.
#[instrument]
pub async fn increment_user_xp(
    pool: &Pool<Sqlite>,
    user_id: i64,
    amount: i64,
) -> Result<(), AppError> {
    info!("Incrementing user XP");
    sqlx::query("UPDATE users SET xp = xp + ? WHERE id = ?")
        .bind(amount)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn update_streak(
    pool: &Pool<Sqlite>,
    user_id: i64,
    streak: i64,
    checkin_date: NaiveDate,
) -> Result<(), AppError> {
    info!("Updating streak and check-in date");
    sqlx::query("UPDATE users SET current_streak = ?, last_checkin_date = ? WHERE id = ?")
        .bind(streak)
        .bind(checkin_date)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[instrument]
pub async fn get_active_tasks(pool: &Pool<Sqlite>) -> Result<Vec<Task>, AppError> {
    info!("Getting active tasks");
    let rows = sqlx::query_as::<_, DbTask>(
        "SELECT id, title, description, points, is_active FROM tasks
         WHERE is_active = 1
         ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Task::from).collect())
}

#[instrument]
pub async fn get_task(pool: &Pool<Sqlite>, id: i64) -> Result<Task, AppError> {
    info!("Getting task");
    let row = sqlx::query_as::<_, DbTask>(
        "SELECT id, title, description, points, is_active FROM tasks WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(task) => Ok(Task::from(task)),
        _ => Err(AppError::NotFound(format!(
            "Task with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn create_task(
    pool: &Pool<Sqlite>,
    title: &str,
    description: &str,
    points: i64,
) -> Result<i64, AppError> {
    info!("Creating task");
    let res = sqlx::query("INSERT INTO tasks (title, description, points) VALUES (?, ?, ?)")
        .bind(title)
        .bind(description)
        .bind(points)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn update_task(
    pool: &Pool<Sqlite>,
    id: i64,
    title: &str,
    description: &str,
    points: i64,
    is_active: bool,
) -> Result<(), AppError> {
    info!("Updating task");
    sqlx::query(
        "UPDATE tasks SET title = ?, description = ?, points = ?, is_active = ? WHERE id = ?",
    )
    .bind(title)
    .bind(description)
    .bind(points)
    .bind(is_active)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Completions
// ---------------------------------------------------------------------------

#[instrument]
pub async fn get_completed_task_ids(
    pool: &Pool<Sqlite>,
    user_id: i64,
    day: NaiveDate,
) -> Result<Vec<i64>, AppError> {
    info!("Getting completed task ids for day");
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT task_id FROM completed_tasks WHERE user_id = ? AND completed_day = ?",
    )
    .bind(user_id)
    .bind(day)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

#[instrument]
pub async fn find_completion(
    pool: &Pool<Sqlite>,
    user_id: i64,
    task_id: i64,
    day: NaiveDate,
) -> Result<Option<i64>, AppError> {
    info!("Checking for existing completion");
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM completed_tasks WHERE user_id = ? AND task_id = ? AND completed_day = ?",
    )
    .bind(user_id)
    .bind(task_id)
    .bind(day)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

#[instrument]
pub async fn insert_completion(
    pool: &Pool<Sqlite>,
    user_id: i64,
    task_id: i64,
    points_awarded: i64,
    day: NaiveDate,
) -> Result<i64, AppError> {
    info!("Inserting completion record");
    let now = Utc::now().naive_utc();
    let res = sqlx::query(
        "INSERT INTO completed_tasks
         (user_id, task_id, points_awarded, completed_day, completed_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(task_id)
    .bind(points_awarded)
    .bind(day)
    .bind(now)
    .execute(pool)
    .await;

    match res {
        Ok(res) => Ok(res.last_insert_rowid()),
        // Two requests racing past the pre-check land here; the unique
        // index on (user_id, task_id, completed_day) catches the loser.
        Err(err) if is_unique_violation(&err) => Err(AppError::DuplicateCompletion(format!(
            "task {} on {}",
            task_id, day
        ))),
        Err(err) => Err(err.into()),
    }
}

#[instrument]
pub async fn get_recent_completions(
    pool: &Pool<Sqlite>,
    user_id: i64,
    limit: i64,
) -> Result<Vec<CompletedTask>, AppError> {
    info!("Getting recent completions");
    let rows = sqlx::query_as::<_, DbCompletedTask>(
        "SELECT id, user_id, task_id, points_awarded, completed_day, completed_at
         FROM completed_tasks
         WHERE user_id = ?
         ORDER BY completed_at DESC, id DESC
         LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CompletedTask::from).collect())
}

// ---------------------------------------------------------------------------
// Quests
// ---------------------------------------------------------------------------

#[instrument]
pub async fn get_active_quest(pool: &Pool<Sqlite>) -> Result<Option<Quest>, AppError> {
    info!("Getting active quest");
    let row = sqlx::query_as::<_, DbQuest>(
        "SELECT id, title, storyline, bonus_xp, task_id, is_active FROM quests
         WHERE is_active = 1
         ORDER BY id DESC
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Quest::from))
}

#[instrument]
pub async fn quest_bonus_for_task(
    pool: &Pool<Sqlite>,
    task_id: i64,
) -> Result<Option<i64>, AppError> {
    info!("Looking up quest bonus for task");
    let bonus = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT bonus_xp FROM quests WHERE task_id = ? AND is_active = 1 LIMIT 1",
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?;

    Ok(bonus.map(|b| b.unwrap_or(10)))
}

#[instrument]
pub async fn get_quest(pool: &Pool<Sqlite>, id: i64) -> Result<Quest, AppError> {
    info!("Getting quest");
    let row = sqlx::query_as::<_, DbQuest>(
        "SELECT id, title, storyline, bonus_xp, task_id, is_active FROM quests WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(quest) => Ok(Quest::from(quest)),
        _ => Err(AppError::NotFound(format!(
            "Quest with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn create_quest(
    pool: &Pool<Sqlite>,
    title: &str,
    storyline: &str,
    bonus_xp: i64,
    task_id: i64,
) -> Result<i64, AppError> {
    info!("Creating quest");
    // The quest must target an existing task.
    get_task(pool, task_id).await?;

    let res =
        sqlx::query("INSERT INTO quests (title, storyline, bonus_xp, task_id) VALUES (?, ?, ?, ?)")
            .bind(title)
            .bind(storyline)
            .bind(bonus_xp)
            .bind(task_id)
            .execute(pool)
            .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn update_quest(
    pool: &Pool<Sqlite>,
    id: i64,
    title: &str,
    storyline: &str,
    bonus_xp: i64,
    is_active: bool,
) -> Result<(), AppError> {
    info!("Updating quest");
    sqlx::query(
        "UPDATE quests SET title = ?, storyline = ?, bonus_xp = ?, is_active = ? WHERE id = ?",
    )
    .bind(title)
    .bind(storyline)
    .bind(bonus_xp)
    .bind(is_active)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Task completion
// ---------------------------------------------------------------------------

/// Complete a task for a user: award base points plus any active-quest bonus,
/// record the completion, bump XP, advance the streak, and return the
/// refreshed user.
///
/// A failure after the XP increment leaves the increment in place; there is
/// no compensating rollback.
#[instrument]
pub async fn complete_task(
    pool: &Pool<Sqlite>,
    user_id: i64,
    task_id: i64,
) -> Result<User, AppError> {
    info!("Completing task");
    let task = get_task(pool, task_id).await?;

    if !task.is_active {
        return Err(AppError::NotFound(format!(
            "Task with id {} is not active",
            task_id
        )));
    }

    let today = Utc::now().date_naive();

    if find_completion(pool, user_id, task_id, today).await?.is_some() {
        return Err(AppError::DuplicateCompletion(task.title));
    }

    let mut points_awarded = task.points;
    if let Some(bonus_xp) = quest_bonus_for_task(pool, task_id).await? {
        info!(bonus_xp, "Quest task completed, adding bonus XP");
        points_awarded += bonus_xp;
    }

    insert_completion(pool, user_id, task_id, points_awarded, today).await?;

    increment_user_xp(pool, user_id, points_awarded).await?;

    let user = get_user(pool, user_id).await?;
    let update = advance_streak(user.last_checkin_date, user.current_streak, today);
    if update.needs_persist {
        update_streak(pool, user_id, update.streak, today).await?;
    }

    if let Some(team) = get_user_team(pool, user_id).await? {
        cache::invalidate(team.id);
    }

    get_user(pool, user_id).await
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

#[instrument]
pub async fn get_team(pool: &Pool<Sqlite>, team_id: i64) -> Result<Team, AppError> {
    info!("Getting team");
    let row = sqlx::query_as::<_, DbTeam>(
        "SELECT id, name, description, created_by FROM teams WHERE id = ?",
    )
    .bind(team_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(team) => Ok(Team::from(team)),
        _ => Err(AppError::NotFound(format!(
            "Team with id {} not found in database",
            team_id
        ))),
    }
}

#[instrument]
pub async fn get_user_team(pool: &Pool<Sqlite>, user_id: i64) -> Result<Option<Team>, AppError> {
    info!("Getting user's team");
    let row = sqlx::query_as::<_, DbTeam>(
        "SELECT t.id, t.name, t.description, t.created_by
         FROM team_members tm
         JOIN teams t ON t.id = tm.team_id
         WHERE tm.user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Team::from))
}

#[instrument(skip_all, fields(user_id, name))]
pub async fn create_team(
    pool: &Pool<Sqlite>,
    user_id: i64,
    name: &str,
    description: &str,
) -> Result<Team, AppError> {
    info!("Creating team");

    // Creating a team also joins it, so a current membership blocks the
    // create before an orphaned team row can appear.
    if get_user_team(pool, user_id).await?.is_some() {
        return Err(AppError::AlreadyOnTeam);
    }

    let res = sqlx::query("INSERT INTO teams (name, description, created_by) VALUES (?, ?, ?)")
        .bind(name)
        .bind(description)
        .bind(user_id)
        .execute(pool)
        .await?;

    let team_id = res.last_insert_rowid();

    insert_membership(pool, user_id, team_id).await?;

    cache::invalidate(team_id);

    get_team(pool, team_id).await
}

#[instrument]
pub async fn join_team(pool: &Pool<Sqlite>, user_id: i64, team_id: i64) -> Result<(), AppError> {
    info!("Joining team");

    get_team(pool, team_id).await?;

    if get_user_team(pool, user_id).await?.is_some() {
        return Err(AppError::AlreadyOnTeam);
    }

    insert_membership(pool, user_id, team_id).await?;

    cache::invalidate(team_id);

    Ok(())
}

async fn insert_membership(
    pool: &Pool<Sqlite>,
    user_id: i64,
    team_id: i64,
) -> Result<(), AppError> {
    let res = sqlx::query("INSERT INTO team_members (user_id, team_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(team_id)
        .execute(pool)
        .await;

    match res {
        Ok(_) => Ok(()),
        // The unique index on user_id backstops the membership pre-check.
        Err(err) if is_unique_violation(&err) => Err(AppError::AlreadyOnTeam),
        Err(err) => Err(err.into()),
    }
}

#[instrument]
pub async fn leave_team(pool: &Pool<Sqlite>, user_id: i64) -> Result<(), AppError> {
    info!("Leaving team");

    let team = get_user_team(pool, user_id).await?;

    sqlx::query("DELETE FROM team_members WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    if let Some(team) = team {
        cache::invalidate(team.id);
    }

    Ok(())
}

/// Fold membership rows into ranked leaderboard entries. Teams appear in
/// first-seen membership order; the stable sort keeps that order for XP ties,
/// and ranks are dense consecutive positions starting at 1.
pub fn rank_teams(rows: Vec<MembershipXpRow>) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for row in rows {
        let xp = row.xp.unwrap_or(0);

        match index.get(&row.team_id) {
            Some(&i) => entries[i].xp += xp,
            None => {
                index.insert(row.team_id, entries.len());
                entries.push(LeaderboardEntry {
                    team_id: row.team_id,
                    name: row
                        .team_name
                        .unwrap_or_else(|| "Unnamed Team".to_string()),
                    xp,
                    rank: 0,
                });
            }
        }
    }

    entries.sort_by(|a, b| b.xp.cmp(&a.xp));

    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = (i + 1) as i64;
    }

    entries
}

#[instrument]
pub async fn compute_team_leaderboard(
    pool: &Pool<Sqlite>,
) -> Result<Vec<LeaderboardEntry>, AppError> {
    info!("Computing team leaderboard");
    let rows = sqlx::query_as::<_, MembershipXpRow>(
        "SELECT tm.team_id AS team_id, t.name AS team_name, u.xp AS xp
         FROM team_members tm
         LEFT JOIN teams t ON t.id = tm.team_id
         LEFT JOIN users u ON u.id = tm.user_id
         ORDER BY tm.id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rank_teams(rows))
}

/// Total XP of one team's current members, for single-team display. Served
/// from the TTL cache when a fresh entry exists.
#[instrument]
pub async fn team_total_xp(pool: &Pool<Sqlite>, team_id: i64) -> Result<i64, AppError> {
    if let Some(total_xp) = cache::lookup(team_id) {
        info!(team_id, "Serving team XP from cache");
        return Ok(total_xp);
    }

    info!("Summing team XP");
    let total_xp = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(u.xp), 0)
         FROM team_members tm
         JOIN users u ON u.id = tm.user_id
         WHERE tm.team_id = ?",
    )
    .bind(team_id)
    .fetch_one(pool)
    .await?;

    cache::store(team_id, total_xp);

    Ok(total_xp)
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
