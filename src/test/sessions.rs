#[cfg(test)]
mod tests {
    use crate::{
        auth::{Role, UserSession},
        db::{
            clean_expired_sessions, create_user_session, get_session_by_token, invalidate_session,
        },
        error::AppError,
        test::test_db::TestDbBuilder,
    };
    use chrono::{Duration, NaiveDateTime, Utc};
    use rocket::tokio;
    use sqlx::{Pool, Sqlite};

    const EMAIL: &str = "session_user@example.com";

    async fn create_test_session() -> (String, NaiveDateTime, Pool<Sqlite>) {
        let test_db = TestDbBuilder::new()
            .student(EMAIL, "Session", "User")
            .build()
            .await
            .expect("Failed to build test database");

        let token = UserSession::generate_token();
        let expires_at = (Utc::now() + Duration::hours(1)).naive_utc();

        (token, expires_at, test_db.pool)
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (token, expires_at, pool) = create_test_session().await;

        let session_id = create_user_session(&pool, EMAIL, Role::Student, &token, expires_at)
            .await
            .expect("Failed to create session");

        assert!(session_id > 0, "Session ID should be positive");

        let session = get_session_by_token(&pool, &token)
            .await
            .expect("Failed to get session");

        assert_eq!(session.email, EMAIL);
        assert_eq!(session.role, Role::Student);
        assert_eq!(session.token, token);
        assert!(session.is_valid());

        let expires_diff =
            (session.expires_at.and_utc().timestamp() - expires_at.and_utc().timestamp()).abs();
        assert!(
            expires_diff <= 1,
            "Expiration timestamps should match within 1 second"
        );
    }

    #[tokio::test]
    async fn test_get_nonexistent_session() {
        let (_, _, pool) = create_test_session().await;

        let result = get_session_by_token(&pool, "no_such_token").await;

        assert!(matches!(result, Err(AppError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_invalidate_session() {
        let (token, expires_at, pool) = create_test_session().await;

        create_user_session(&pool, EMAIL, Role::Student, &token, expires_at)
            .await
            .expect("Failed to create session");

        invalidate_session(&pool, &token)
            .await
            .expect("Failed to invalidate session");

        let result = get_session_by_token(&pool, &token).await;
        assert!(result.is_err(), "Session should be gone after logout");
    }

    #[tokio::test]
    async fn test_clean_expired_sessions() {
        let (token, expires_at, pool) = create_test_session().await;
        let expired_token = UserSession::generate_token();
        let expired_at = (Utc::now() - Duration::hours(1)).naive_utc();

        create_user_session(&pool, EMAIL, Role::Student, &token, expires_at)
            .await
            .unwrap();
        create_user_session(&pool, EMAIL, Role::Student, &expired_token, expired_at)
            .await
            .unwrap();

        let expired = get_session_by_token(&pool, &expired_token).await.unwrap();
        assert!(!expired.is_valid());

        let removed = clean_expired_sessions(&pool).await.unwrap();
        assert_eq!(removed, 1);

        assert!(get_session_by_token(&pool, &token).await.is_ok());
        assert!(get_session_by_token(&pool, &expired_token).await.is_err());
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let first = UserSession::generate_token();
        let second = UserSession::generate_token();

        assert_eq!(first.len(), 64);
        assert_ne!(first, second);
    }
}
