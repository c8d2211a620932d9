#[cfg(test)]
mod tests {
    use crate::db::{
        clean_expired_sessions, create_user_session, get_session_by_token, invalidate_session,
    };
    use crate::error::AppError;
    use crate::test::test_utils::TestDbBuilder;
    use chrono::{Duration, NaiveDateTime, Utc};
    use rocket::tokio;
    use sqlx::{Pool, Sqlite};
    use uuid::Uuid;

    async fn create_test_session() -> (i64, String, NaiveDateTime, Pool<Sqlite>) {
        let test_db = TestDbBuilder::new()
            .member("session_user")
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("session_user").expect("User not found");

        let token = format!("test_token_{}", Uuid::new_v4());

        let expires_at = (Utc::now() + Duration::hours(1)).naive_utc();

        (user_id, token, expires_at, test_db.pool)
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (user_id, token, expires_at, pool) = create_test_session().await;

        let session_id = create_user_session(&pool, user_id, &token, expires_at)
            .await
            .expect("Failed to create session");

        assert!(session_id > 0, "Session ID should be positive");

        let session = get_session_by_token(&pool, &token)
            .await
            .expect("Failed to get session");

        assert_eq!(session.user_id, user_id);
        assert_eq!(session.token, token);

        let expires_diff =
            (session.expires_at.and_utc().timestamp() - expires_at.and_utc().timestamp()).abs();
        assert!(
            expires_diff <= 1,
            "Expiration timestamps should match within 1 second"
        );
    }

    #[tokio::test]
    async fn test_get_nonexistent_session() {
        let (_, _, _, pool) = create_test_session().await;

        let result = get_session_by_token(&pool, "missing_token").await;

        assert!(matches!(result, Err(AppError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_session_validity_tracks_expiry() {
        let (user_id, token, _, pool) = create_test_session().await;

        let expired_at = (Utc::now() - Duration::hours(1)).naive_utc();
        create_user_session(&pool, user_id, &token, expired_at)
            .await
            .expect("Failed to create expired session");

        let session = get_session_by_token(&pool, &token)
            .await
            .expect("Should be able to retrieve expired session");

        assert!(!session.is_valid(), "Expired session should be invalid");

        let valid_token = format!("test_token_{}", Uuid::new_v4());
        let expires_at = (Utc::now() + Duration::hours(1)).naive_utc();
        create_user_session(&pool, user_id, &valid_token, expires_at)
            .await
            .expect("Failed to create valid session");

        let valid_session = get_session_by_token(&pool, &valid_token)
            .await
            .expect("Should be able to retrieve valid session");

        assert!(valid_session.is_valid(), "Future session should be valid");
    }

    #[tokio::test]
    async fn test_invalidate_session() {
        let (user_id, token, expires_at, pool) = create_test_session().await;

        create_user_session(&pool, user_id, &token, expires_at)
            .await
            .expect("Failed to create session");

        invalidate_session(&pool, &token)
            .await
            .expect("Failed to invalidate session");

        let result = get_session_by_token(&pool, &token).await;

        assert!(matches!(result, Err(AppError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_clean_expired_sessions() {
        let (user_id, token, _, pool) = create_test_session().await;

        let expired_at = (Utc::now() - Duration::hours(2)).naive_utc();
        create_user_session(&pool, user_id, &token, expired_at)
            .await
            .expect("Failed to create expired session");

        let live_token = format!("test_token_{}", Uuid::new_v4());
        let expires_at = (Utc::now() + Duration::hours(1)).naive_utc();
        create_user_session(&pool, user_id, &live_token, expires_at)
            .await
            .expect("Failed to create live session");

        let cleaned = clean_expired_sessions(&pool)
            .await
            .expect("Failed to clean sessions");

        assert_eq!(cleaned, 1, "Exactly one expired session should be removed");

        let live = get_session_by_token(&pool, &live_token).await;
        assert!(live.is_ok(), "Live session must survive the sweep");
    }
}
