mod common;

use axum_furniture_api::{
    dto::auth::{LoginRequest, RegisterRequest},
    error::AppError,
    services::auth_service,
};

fn register_payload() -> RegisterRequest {
    RegisterRequest {
        email: "ana@example.com".to_string(),
        password: "correct horse".to_string(),
        username: "ana".to_string(),
    }
}

#[tokio::test]
async fn register_login_refresh_logout_flow() -> anyhow::Result<()> {
    let state = match common::setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let (auth, refresh_token) = auth_service::register_user(&state, register_payload()).await?;
    assert_eq!(auth.user.email, "ana@example.com");
    assert!(!auth.access_token.is_empty());

    // Duplicate email is a conflict and must not create a second row.
    let err = auth_service::register_user(&state, register_payload())
        .await
        .expect_err("duplicate email");
    assert!(matches!(err, AppError::Conflict(_)));
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind("ana@example.com")
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(count.0, 1);

    // Wrong password is unauthorized, unknown email is not-found.
    let err = auth_service::login_user(
        &state,
        LoginRequest {
            email: "ana@example.com".to_string(),
            password: "wrong horse".to_string(),
        },
    )
    .await
    .expect_err("wrong password");
    assert!(matches!(err, AppError::Unauthorized(_)));

    let err = auth_service::login_user(
        &state,
        LoginRequest {
            email: "nobody@example.com".to_string(),
            password: "irrelevant".to_string(),
        },
    )
    .await
    .expect_err("unknown email");
    assert!(matches!(err, AppError::NotFound));

    // A fresh login rotates the stored refresh token; the registration one
    // is no longer accepted.
    let (_, login_refresh) = auth_service::login_user(
        &state,
        LoginRequest {
            email: "ana@example.com".to_string(),
            password: "correct horse".to_string(),
        },
    )
    .await?;
    let err = auth_service::refresh_access_token(&state, &refresh_token)
        .await
        .expect_err("rotated out");
    assert!(matches!(err, AppError::Unauthorized(_)));

    let access = auth_service::refresh_access_token(&state, &login_refresh).await?;
    assert!(!access.is_empty());

    // Logout clears the stored token, so refresh stops working.
    auth_service::logout_user(&state, &login_refresh).await?;
    let err = auth_service::refresh_access_token(&state, &login_refresh)
        .await
        .expect_err("revoked by logout");
    assert!(matches!(err, AppError::Unauthorized(_)));

    Ok(())
}
