use chrono::{NaiveDate, Utc};
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User, UserSession};
use crate::badges::{BADGE_TIERS, BadgeInfo, badge_info};
use crate::db::{
    authenticate_user, complete_task, compute_team_leaderboard, create_quest, create_task,
    create_team, create_user, create_user_session, find_user_by_username, get_active_quest,
    get_active_tasks, get_completed_task_ids, get_quest, get_recent_completions, get_task,
    get_team, get_user, get_user_team, invalidate_session, join_team, leave_team,
    set_sober_start_date, team_total_xp, update_profile_photo, update_quest, update_task,
    update_username,
};
use crate::error::AppError;
use crate::models::{CompletedTask, LeaderboardEntry, Task, Team};
use crate::validation::AppErrorExt;
use crate::validation::JsonValidateExt;
use crate::validation::PermissionCheckExt;
use crate::validation::ValidationResponse;

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub xp: i64,
    pub current_streak: i64,
    pub last_checkin_date: Option<NaiveDate>,
    pub profile_photo: Option<String>,
    pub sober_start_date: Option<NaiveDate>,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.to_string(),
            xp: user.xp,
            current_streak: user.current_streak,
            last_checkin_date: user.last_checkin_date,
            profile_photo: user.profile_photo.clone(),
            sober_start_date: user.sober_start_date,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct TaskData {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub points: i64,
}

impl From<Task> for TaskData {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            points: task.points,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct QuestData {
    pub title: String,
    pub storyline: String,
    pub bonus_xp: i64,
    pub task: TaskData,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub user: UserData,
    pub tasks: Vec<TaskData>,
    pub completed_today: Vec<i64>,
    pub daily_quest: Option<QuestData>,
    pub badge: BadgeInfo,
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LoginResponse>, Custom<Json<ValidationResponse>>> {
    use rocket::http::{Cookie, SameSite};

    let validated = login.validate_custom()?;

    match authenticate_user(db, &validated.username, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            // Create session token
            let token = UserSession::generate_token();
            let expires_at = Utc::now() + chrono::Duration::hours(1);

            create_user_session(db, user.id, &token, expires_at.naive_utc())
                .await
                .validate_custom()?;

            let cookie = Cookie::build(("session_token", token))
                .same_site(SameSite::Lax)
                .http_only(true)
                .max_age(rocket::time::Duration::hours(1));
            cookies.add_private(cookie);

            cookies.add_private(
                Cookie::build(("user_id", user.id.to_string()))
                    .same_site(SameSite::Lax)
                    .http_only(true)
                    .max_age(rocket::time::Duration::hours(1)),
            );

            cookies.add_private(
                Cookie::build(("logged_in", validated.username))
                    .same_site(SameSite::Lax)
                    .max_age(rocket::time::Duration::hours(1)),
            );

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(user)),
                error: None,
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Invalid username or password".to_string()),
        })),
    }
}

#[post("/logout")]
pub async fn api_logout(
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Status {
    let token = cookies
        .get_private("session_token")
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        let _ = invalidate_session(db, &token).await;
    }

    cookies.remove_private(rocket::http::Cookie::build("session_token"));
    cookies.remove_private(rocket::http::Cookie::build("user_id"));
    cookies.remove_private(rocket::http::Cookie::build("logged_in"));

    Status::Ok
}

#[derive(Deserialize, Validate, Clone)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32, message = "Username must be 3 to 32 characters"))]
    username: String,
    #[validate(email(message = "A valid email address is required"))]
    email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
}

#[post("/register", data = "<registration>")]
pub async fn api_register(
    registration: Json<RegisterRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    let validated = registration.validate_custom()?;

    let existing_user = find_user_by_username(db, &validated.username)
        .await
        .validate_custom()?;

    if existing_user.is_some() {
        return Err(Custom(
            Status::Conflict,
            Json(ValidationResponse::with_error(
                "username",
                "Username already exists",
            )),
        ));
    }

    create_user(
        db,
        &validated.username,
        &validated.email,
        &validated.password,
        "member",
    )
    .await
    .validate_custom()?;

    Ok(Status::Created)
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<UserData> {
    Json(UserData::from(user))
}

#[get("/me", rank = 2)]
pub async fn api_me_unauthorized() -> Status {
    Status::Unauthorized
}

#[get("/dashboard")]
pub async fn api_get_dashboard(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<DashboardResponse>, Status> {
    user.require_permission(Permission::ViewOwnProfile)?;

    let today = Utc::now().date_naive();

    // Profile, task catalog and today's completions are independent reads.
    let (profile, tasks, completed_today) = tokio::join!(
        get_user(db, user.id),
        get_active_tasks(db),
        get_completed_task_ids(db, user.id, today),
    );

    let profile = profile?;
    let tasks = tasks?;
    let completed_today = completed_today?;

    let daily_quest = match get_active_quest(db).await? {
        Some(quest) => match get_task(db, quest.task_id).await {
            Ok(task) => Some(QuestData {
                title: quest.title,
                storyline: quest.storyline,
                bonus_xp: quest.bonus_xp,
                task: TaskData::from(task),
            }),
            // A quest pointing at a vanished task is dropped from the
            // dashboard rather than failing the whole view.
            Err(AppError::NotFound(_)) => None,
            Err(err) => return Err(err.into()),
        },
        None => None,
    };

    let badge = badge_info(profile.xp);

    Ok(Json(DashboardResponse {
        user: UserData::from(profile),
        tasks: tasks.into_iter().map(TaskData::from).collect(),
        completed_today,
        daily_quest,
        badge,
    }))
}

#[post("/tasks/<id>/complete")]
pub async fn api_complete_task(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserData>, Status> {
    user.require_permission(Permission::CompleteTasks)?;

    let updated = complete_task(db, user.id, id).await?;

    Ok(Json(UserData::from(updated)))
}

#[get("/leaderboard")]
pub async fn api_get_leaderboard(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<LeaderboardEntry>>, Status> {
    user.require_permission(Permission::ViewLeaderboard)?;

    let entries = compute_team_leaderboard(db).await?;

    Ok(Json(entries))
}

#[derive(Serialize, Deserialize)]
pub struct TeamResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_by: i64,
}

impl From<Team> for TeamResponse {
    fn from(team: Team) -> Self {
        Self {
            id: team.id,
            name: team.name,
            description: team.description,
            created_by: team.created_by,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct TeamDetailResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_by: i64,
    pub total_xp: i64,
}

#[derive(Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 64, message = "Team name must be 1 to 64 characters"))]
    name: String,
    #[validate(length(max = 500, message = "Description is too long"))]
    description: String,
}

#[post("/teams", data = "<request>")]
pub async fn api_create_team(
    request: Json<CreateTeamRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TeamResponse>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::JoinTeams).validate_custom()?;

    let validated = request.validate_custom()?;

    let team = create_team(db, user.id, &validated.name, &validated.description)
        .await
        .validate_custom()?;

    Ok(Json(TeamResponse::from(team)))
}

#[post("/teams/<id>/join")]
pub async fn api_join_team(id: i64, user: User, db: &State<Pool<Sqlite>>) -> Result<Status, Status> {
    user.require_permission(Permission::JoinTeams)?;

    join_team(db, user.id, id).await?;

    Ok(Status::Ok)
}

#[post("/teams/leave")]
pub async fn api_leave_team(user: User, db: &State<Pool<Sqlite>>) -> Result<Status, Status> {
    leave_team(db, user.id).await?;

    Ok(Status::Ok)
}

#[get("/teams/mine")]
pub async fn api_get_my_team(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Option<TeamResponse>>, Status> {
    let team = get_user_team(db, user.id).await?;

    Ok(Json(team.map(TeamResponse::from)))
}

#[get("/teams/<id>")]
pub async fn api_get_team(
    id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TeamDetailResponse>, Status> {
    let team = get_team(db, id).await?;
    let total_xp = team_total_xp(db, id).await?;

    Ok(Json(TeamDetailResponse {
        id: team.id,
        name: team.name,
        description: team.description,
        created_by: team.created_by,
        total_xp,
    }))
}

#[derive(Deserialize)]
pub struct SoberDateRequest {
    sober_date: NaiveDate,
}

#[put("/profile/sober-date", data = "<request>")]
pub async fn api_update_sober_date(
    request: Json<SoberDateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserData>, Status> {
    user.require_permission(Permission::EditOwnProfile)?;

    let updated = set_sober_start_date(db, user.id, Some(request.sober_date)).await?;

    Ok(Json(UserData::from(updated)))
}

#[delete("/profile/sober-date")]
pub async fn api_clear_sober_date(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserData>, Status> {
    user.require_permission(Permission::EditOwnProfile)?;

    let updated = set_sober_start_date(db, user.id, None).await?;

    Ok(Json(UserData::from(updated)))
}

#[derive(Deserialize, Validate, Clone)]
pub struct ProfileUpdateRequest {
    #[validate(length(min = 3, max = 32, message = "Username must be 3 to 32 characters"))]
    username: Option<String>,
    profile_photo: Option<String>,
}

#[put("/profile", data = "<profile>")]
pub async fn api_update_profile(
    profile: Json<ProfileUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserData>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::EditOwnProfile)
        .validate_custom()?;

    let validated = profile.validate_custom()?;

    if let Some(username) = &validated.username {
        update_username(db, user.id, username).await.validate_custom()?;
    }

    if let Some(photo) = &validated.profile_photo {
        update_profile_photo(db, user.id, Some(photo))
            .await
            .validate_custom()?;
    }

    let updated = get_user(db, user.id).await.validate_custom()?;

    Ok(Json(UserData::from(updated)))
}

#[derive(Serialize, Deserialize)]
pub struct CompletionData {
    pub id: i64,
    pub task_id: i64,
    pub points_awarded: i64,
    pub completed_day: NaiveDate,
    pub completed_at: String,
}

impl From<CompletedTask> for CompletionData {
    fn from(completion: CompletedTask) -> Self {
        Self {
            id: completion.id,
            task_id: completion.task_id,
            points_awarded: completion.points_awarded,
            completed_day: completion.completed_day,
            completed_at: completion.completed_at.to_rfc3339(),
        }
    }
}

#[get("/profile/completions?<limit>")]
pub async fn api_get_completions(
    limit: Option<i64>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<CompletionData>>, Status> {
    user.require_permission(Permission::ViewOwnProfile)?;

    let limit = limit.unwrap_or(30).clamp(1, 100);

    let completions = get_recent_completions(db, user.id, limit).await?;

    Ok(Json(
        completions.into_iter().map(CompletionData::from).collect(),
    ))
}

#[derive(Serialize)]
pub struct BadgeTierData {
    pub name: &'static str,
    pub threshold: i64,
    pub description: &'static str,
}

#[derive(Serialize)]
pub struct BadgeCatalogResponse {
    pub badges: Vec<BadgeTierData>,
    pub standing: BadgeInfo,
}

#[get("/badges")]
pub async fn api_get_badges(user: User) -> Json<BadgeCatalogResponse> {
    let badges = BADGE_TIERS
        .iter()
        .map(|tier| BadgeTierData {
            name: tier.name,
            threshold: tier.threshold,
            description: tier.description,
        })
        .collect();

    Json(BadgeCatalogResponse {
        badges,
        standing: badge_info(user.xp),
    })
}

#[derive(Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 100, message = "Title must be 1 to 100 characters"))]
    title: String,
    description: String,
    #[validate(range(min = 1, message = "Points must be positive"))]
    points: i64,
}

#[post("/admin/tasks", data = "<request>")]
pub async fn api_create_task(
    request: Json<CreateTaskRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ManageTasks)
        .validate_custom()?;

    let validated = request.validate_custom()?;

    create_task(db, &validated.title, &validated.description, validated.points)
        .await
        .validate_custom()?;

    Ok(Status::Created)
}

#[derive(Deserialize)]
pub struct TaskUpdateRequest {
    title: Option<String>,
    description: Option<String>,
    points: Option<i64>,
    is_active: Option<bool>,
}

#[put("/admin/tasks/<id>", data = "<update>")]
pub async fn api_update_task(
    id: i64,
    update: Json<TaskUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    user.require_permission(Permission::ManageTasks)?;

    let task = get_task(db, id).await?;

    let title = update.title.clone().unwrap_or(task.title);
    let description = update.description.clone().unwrap_or(task.description);
    let points = update.points.unwrap_or(task.points);
    let is_active = update.is_active.unwrap_or(task.is_active);

    update_task(db, id, &title, &description, points, is_active).await?;

    Ok(Status::Ok)
}

#[derive(Deserialize, Validate)]
pub struct CreateQuestRequest {
    #[validate(length(min = 1, max = 100, message = "Title must be 1 to 100 characters"))]
    title: String,
    storyline: String,
    bonus_xp: Option<i64>,
    task_id: i64,
}

#[post("/admin/quests", data = "<request>")]
pub async fn api_create_quest(
    request: Json<CreateQuestRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ManageQuests)
        .validate_custom()?;

    let validated = request.validate_custom()?;

    create_quest(
        db,
        &validated.title,
        &validated.storyline,
        validated.bonus_xp.unwrap_or(10),
        validated.task_id,
    )
    .await
    .validate_custom()?;

    Ok(Status::Created)
}

#[derive(Deserialize)]
pub struct QuestUpdateRequest {
    title: Option<String>,
    storyline: Option<String>,
    bonus_xp: Option<i64>,
    is_active: Option<bool>,
}

#[put("/admin/quests/<id>", data = "<update>")]
pub async fn api_update_quest(
    id: i64,
    update: Json<QuestUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    user.require_permission(Permission::ManageQuests)?;

    let quest = get_quest(db, id).await?;

    let title = update.title.clone().unwrap_or(quest.title);
    let storyline = update.storyline.clone().unwrap_or(quest.storyline);
    let bonus_xp = update.bonus_xp.unwrap_or(quest.bonus_xp);
    let is_active = update.is_active.unwrap_or(quest.is_active);

    update_quest(db, id, &title, &storyline, bonus_xp, is_active).await?;

    Ok(Status::Ok)
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
