use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

#[derive(Serialize, Clone)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub points: i64,
    pub is_active: bool,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTask {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub points: Option<i64>,
    pub is_active: Option<bool>,
}

impl From<DbTask> for Task {
    fn from(task: DbTask) -> Self {
        Self {
            id: task.id.unwrap_or_default(),
            title: task.title.unwrap_or_default(),
            description: task.description.unwrap_or_default(),
            points: task.points.unwrap_or_default(),
            is_active: task.is_active.unwrap_or_default(),
        }
    }
}

#[derive(Serialize, Clone)]
pub struct CompletedTask {
    pub id: i64,
    pub user_id: i64,
    pub task_id: i64,
    pub points_awarded: i64,
    pub completed_day: NaiveDate,
    pub completed_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbCompletedTask {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub task_id: Option<i64>,
    pub points_awarded: Option<i64>,
    pub completed_day: Option<NaiveDate>,
    pub completed_at: Option<NaiveDateTime>,
}

impl From<DbCompletedTask> for CompletedTask {
    fn from(db: DbCompletedTask) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            task_id: db.task_id.unwrap_or_default(),
            points_awarded: db.points_awarded.unwrap_or_default(),
            completed_day: db.completed_day.unwrap_or_else(|| Utc::now().date_naive()),
            completed_at: db
                .completed_at
                .map(|dt| {
                    chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(dt, chrono::Utc)
                })
                .unwrap_or_else(chrono::Utc::now),
        }
    }
}

#[derive(Serialize, Clone)]
pub struct Quest {
    pub id: i64,
    pub title: String,
    pub storyline: String,
    pub bonus_xp: i64,
    pub task_id: i64,
    pub is_active: bool,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbQuest {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub storyline: Option<String>,
    pub bonus_xp: Option<i64>,
    pub task_id: Option<i64>,
    pub is_active: Option<bool>,
}

impl From<DbQuest> for Quest {
    fn from(quest: DbQuest) -> Self {
        Self {
            id: quest.id.unwrap_or_default(),
            title: quest.title.unwrap_or_default(),
            storyline: quest.storyline.unwrap_or_default(),
            bonus_xp: quest.bonus_xp.unwrap_or(10),
            task_id: quest.task_id.unwrap_or_default(),
            is_active: quest.is_active.unwrap_or_default(),
        }
    }
}

#[derive(Serialize, Clone)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_by: i64,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTeam {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<i64>,
}

impl From<DbTeam> for Team {
    fn from(team: DbTeam) -> Self {
        Self {
            id: team.id.unwrap_or_default(),
            name: team.name.unwrap_or_default(),
            description: team.description.unwrap_or_default(),
            created_by: team.created_by.unwrap_or_default(),
        }
    }
}

/// One membership row joined against its team and member, as read by the
/// leaderboard scan. Team name and member XP come through LEFT JOINs and may
/// be absent.
#[derive(sqlx::FromRow, Clone)]
pub struct MembershipXpRow {
    pub team_id: i64,
    pub team_name: Option<String>,
    pub xp: Option<i64>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub team_id: i64,
    pub name: String,
    pub xp: i64,
    pub rank: i64,
}
