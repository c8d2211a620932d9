#[cfg(test)]
pub mod test_utils {
    use crate::api::LoginResponse;
    use crate::auth::{Role, User};
    use crate::db::{
        create_quest, create_task, create_team, create_user, get_user, join_team, update_task,
    };
    use crate::error::AppError;
    use crate::init_rocket;
    use chrono::NaiveDate;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;
    use sqlx::{Pool, Sqlite, sqlite::SqlitePoolOptions};
    use std::collections::HashMap;
    use std::sync::Once;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        tasks: Vec<TestTask>,
        quests: Vec<TestQuest>,
        teams: Vec<TestTeam>,
    }

    pub struct TestUser {
        pub username: String,
        pub role: Role,
        pub xp: i64,
    }

    pub struct TestTask {
        pub title: String,
        pub points: i64,
        pub active: bool,
    }

    pub struct TestQuest {
        pub title: String,
        pub task_title: String,
        pub bonus_xp: i64,
    }

    pub struct TestTeam {
        pub name: String,
        pub member_usernames: Vec<String>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn member(self, username: &str) -> Self {
            self.member_with_xp(username, 0)
        }

        pub fn member_with_xp(mut self, username: &str, xp: i64) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: Role::Member,
                xp,
            });
            self
        }

        pub fn admin(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: Role::Admin,
                xp: 0,
            });
            self
        }

        pub fn task(mut self, title: &str, points: i64) -> Self {
            self.tasks.push(TestTask {
                title: title.to_string(),
                points,
                active: true,
            });
            self
        }

        pub fn inactive_task(mut self, title: &str, points: i64) -> Self {
            self.tasks.push(TestTask {
                title: title.to_string(),
                points,
                active: false,
            });
            self
        }

        pub fn quest(mut self, title: &str, task_title: &str, bonus_xp: i64) -> Self {
            self.quests.push(TestQuest {
                title: title.to_string(),
                task_title: task_title.to_string(),
                bonus_xp,
            });
            self
        }

        pub fn team(mut self, name: &str, member_usernames: &[&str]) -> Self {
            self.teams.push(TestTeam {
                name: name.to_string(),
                member_usernames: member_usernames.iter().map(|u| u.to_string()).collect(),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder().is_test(true).try_init();
            });

            // A single connection keeps every query on the same in-memory
            // database.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut task_id_map: HashMap<String, i64> = HashMap::new();
            let mut team_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let email = format!("{}@example.com", user.username);

                let user_id = create_user(
                    &pool,
                    &user.username,
                    &email,
                    STANDARD_PASSWORD,
                    user.role.as_str(),
                )
                .await?;

                if user.xp > 0 {
                    sqlx::query("UPDATE users SET xp = ? WHERE id = ?")
                        .bind(user.xp)
                        .bind(user_id)
                        .execute(&pool)
                        .await?;
                }

                user_id_map.insert(user.username.clone(), user_id);
            }

            for task in &self.tasks {
                let task_id = create_task(&pool, &task.title, "", task.points).await?;

                if !task.active {
                    update_task(&pool, task_id, &task.title, "", task.points, false).await?;
                }

                task_id_map.insert(task.title.clone(), task_id);
            }

            for quest in &self.quests {
                let task_id = task_id_map
                    .get(&quest.task_title)
                    .copied()
                    .ok_or_else(|| AppError::NotFound(quest.task_title.clone()))?;

                create_quest(&pool, &quest.title, "", quest.bonus_xp, task_id).await?;
            }

            for team in &self.teams {
                let mut members = team.member_usernames.iter();

                let creator = members
                    .next()
                    .and_then(|u| user_id_map.get(u).copied())
                    .ok_or_else(|| AppError::NotFound(team.name.clone()))?;

                let created = create_team(&pool, creator, &team.name, "").await?;

                for username in members {
                    let member_id = user_id_map
                        .get(username)
                        .copied()
                        .ok_or_else(|| AppError::NotFound(username.clone()))?;

                    join_team(&pool, member_id, created.id).await?;
                }

                team_id_map.insert(team.name.clone(), created.id);
            }

            Ok(TestDb {
                pool,
                user_id_map,
                task_id_map,
                team_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub task_id_map: HashMap<String, i64>,
        pub team_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }

        pub fn task_id(&self, title: &str) -> Option<i64> {
            self.task_id_map.get(title).copied()
        }

        pub fn team_id(&self, name: &str) -> Option<i64> {
            self.team_id_map.get(name).copied()
        }

        pub async fn get_user_by_name(&self, username: &str) -> Result<User, AppError> {
            let id = self
                .user_id(username)
                .ok_or_else(|| AppError::NotFound(username.to_string()))?;

            get_user(&self.pool, id).await
        }

        pub async fn set_user_xp(&self, username: &str, xp: i64) -> Result<(), AppError> {
            let id = self
                .user_id(username)
                .ok_or_else(|| AppError::NotFound(username.to_string()))?;

            sqlx::query("UPDATE users SET xp = ? WHERE id = ?")
                .bind(xp)
                .bind(id)
                .execute(&self.pool)
                .await?;

            Ok(())
        }

        pub async fn set_checkin_state(
            &self,
            username: &str,
            last_checkin_date: Option<NaiveDate>,
            current_streak: i64,
        ) -> Result<(), AppError> {
            let id = self
                .user_id(username)
                .ok_or_else(|| AppError::NotFound(username.to_string()))?;

            sqlx::query("UPDATE users SET last_checkin_date = ?, current_streak = ? WHERE id = ?")
                .bind(last_checkin_date)
                .bind(current_streak)
                .bind(id)
                .execute(&self.pool)
                .await?;

            Ok(())
        }
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .member("alice")
            .member("bob")
            .member("carol")
            .admin("admin_user")
            .task("Attend a meeting", 15)
            .task("Morning meditation", 20)
            .task("Write in journal", 10)
            .quest("The Daily Trial", "Morning meditation", 10)
            .build()
            .await
            .expect("Failed to build standard test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = init_rocket(test_db.pool.clone()).await;

        let client = Client::tracked(rocket)
            .await
            .expect("Failed to build test client");

        (client, test_db)
    }

    pub async fn login_test_user(client: &Client, username: &str) {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": username,
                    "password": STANDARD_PASSWORD
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);

        let body = response.into_string().await.expect("Empty login response");
        let login_response: LoginResponse =
            serde_json::from_str(&body).expect("Malformed login response");

        assert!(login_response.success, "Login failed for {}", username);
    }
}
