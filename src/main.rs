#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod badges;
mod cache;
mod db;
mod env;
mod error;
mod models;
mod streak;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use api::{
    api_clear_sober_date, api_complete_task, api_create_quest, api_create_task, api_create_team,
    api_get_badges, api_get_completions, api_get_dashboard, api_get_leaderboard, api_get_my_team,
    api_get_team, api_join_team, api_leave_team, api_login, api_logout, api_me,
    api_me_unauthorized, api_register, api_update_profile, api_update_quest,
    api_update_sober_date, api_update_task, health,
};
use auth::unauthorized_api;
use db::clean_expired_sessions;
use once_cell::sync::Lazy;
use rocket::{Build, Rocket, tokio};
use std::sync::Mutex;
use telemetry::{OtelGuard, TelemetryFairing, init_tracing};

use sqlx::SqlitePool;
use tracing::{error, info};

pub static TELEMETRY_GUARD: Lazy<Mutex<Option<OtelGuard>>> = Lazy::new(|| Mutex::new(None));

#[launch]
async fn rocket() -> _ {
    if let Err(e) = env::load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }

    *TELEMETRY_GUARD.lock().unwrap() = init_tracing();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_default();

    let pool = SqlitePool::connect(&database_url)
        .await
        .expect("Failed to connect to SQLite database");

    let pool_clone = pool.clone();

    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool_clone).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
        }
    });

    info!("Running database migrations...");
    match sqlx::migrate!("./migrations").run(&pool).await {
        Ok(_) => info!("Migrations completed successfully"),
        Err(e) => {
            error!("Failed to run migrations: {}", e);
            panic!("Database migration failed: {}", e);
        }
    }

    init_rocket(pool).await
}

pub async fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    info!("Starting recovery quest");

    rocket::build()
        .manage(pool)
        .mount(
            "/api",
            routes![
                api_login,
                api_logout,
                api_register,
                api_me,
                api_me_unauthorized,
                api_get_dashboard,
                api_complete_task,
                api_get_leaderboard,
                api_create_team,
                api_join_team,
                api_leave_team,
                api_get_my_team,
                api_get_team,
                api_update_sober_date,
                api_clear_sober_date,
                api_update_profile,
                api_get_completions,
                api_get_badges,
                api_create_task,
                api_update_task,
                api_create_quest,
                api_update_quest,
            ],
        )
        .register("/api", catchers![unauthorized_api])
        .mount("/api", routes![health])
        .attach(TelemetryFairing)
}
