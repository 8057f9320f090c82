use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    config::AppConfig,
    dto::auth::{
        AccessClaims, AuthResponse, LoginRequest, RefreshClaims, RegisterRequest,
    },
    error::{AppError, AppResult},
    models::{UserRole, UserRow},
    state::AppState,
};

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn issue_access_token(config: &AppConfig, user_id: Uuid, role: UserRole) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::minutes(config.access_token_ttl_minutes))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = AccessClaims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.access_token_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn issue_refresh_token(config: &AppConfig, user_id: Uuid) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(config.refresh_token_ttl_days))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = RefreshClaims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

/// Any verification failure (expired, tampered, wrong secret) collapses into
/// one generic invalid-token error.
pub fn verify_refresh_token(config: &AppConfig, token: &str) -> AppResult<Uuid> {
    let decoded = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid refresh token".into()))?;

    Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid refresh token".into()))
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<(AuthResponse, String)> {
    let RegisterRequest {
        email,
        password,
        username,
    } = payload;

    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(&state.pool)
        .await?;

    if exist.is_some() {
        return Err(AppError::Conflict("Email is already registered".to_string()));
    }

    let password_hash = hash_password(&password)?;
    let id = Uuid::new_v4();
    let access_token = issue_access_token(&state.config, id, UserRole::User)?;
    let refresh_token = issue_refresh_token(&state.config, id)?;

    let user: UserRow = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, username, refresh_token)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(email.as_str())
    .bind(password_hash)
    .bind(username.as_str())
    .bind(refresh_token.as_str())
    .fetch_one(&state.pool)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "user_register",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok((
        AuthResponse {
            user: user.into(),
            access_token,
        },
        refresh_token,
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<(AuthResponse, String)> {
    let LoginRequest { email, password } = payload;

    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(&state.pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    if !verify_password(&user.password_hash, &password)? {
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    }

    let role = user.role();
    let access_token = issue_access_token(&state.config, user.id, role)?;
    let refresh_token = issue_refresh_token(&state.config, user.id)?;

    // One active refresh token per user; logging in elsewhere invalidates the
    // previous one.
    let user: UserRow = sqlx::query_as(
        "UPDATE users SET refresh_token = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(user.id)
    .bind(refresh_token.as_str())
    .fetch_one(&state.pool)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "user_login",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok((
        AuthResponse {
            user: user.into(),
            access_token,
        },
        refresh_token,
    ))
}

/// Mint a fresh access token for a refresh token that both verifies and
/// matches the one stored on the user row, so logout actually revokes.
pub async fn refresh_access_token(state: &AppState, token: &str) -> AppResult<String> {
    let user_id = verify_refresh_token(&state.config, token)?;

    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::Unauthorized("Invalid refresh token".into())),
    };

    if user.refresh_token.as_deref() != Some(token) {
        return Err(AppError::Unauthorized("Invalid refresh token".into()));
    }

    issue_access_token(&state.config, user.id, user.role())
}

pub async fn logout_user(state: &AppState, token: &str) -> AppResult<()> {
    let user_id = verify_refresh_token(&state.config, token)?;

    sqlx::query(
        "UPDATE users SET refresh_token = NULL, updated_at = now() WHERE id = $1 AND refresh_token = $2",
    )
    .bind(user_id)
    .bind(token)
    .execute(&state.pool)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user_id),
        "user_logout",
        Some("users"),
        Some(serde_json::json!({ "user_id": user_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://unused".into(),
            host: "127.0.0.1".into(),
            port: 0,
            access_token_secret: "access-test-secret".into(),
            refresh_token_secret: "refresh-test-secret".into(),
            access_token_ttl_minutes: 30,
            refresh_token_ttl_days: 7,
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password(&hash, "hunter2").unwrap());
        assert!(!verify_password(&hash, "hunter3").unwrap());
    }

    #[test]
    fn access_token_carries_user_id_and_role() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let token = issue_access_token(&config, user_id, UserRole::Admin).unwrap();

        let decoded = decode::<AccessClaims>(
            &token,
            &DecodingKey::from_secret(config.access_token_secret.as_bytes()),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(decoded.claims.sub, user_id.to_string());
        assert_eq!(decoded.claims.role, "ADMIN");
    }

    #[test]
    fn refresh_token_round_trips_through_verify() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let token = issue_refresh_token(&config, user_id).unwrap();
        assert_eq!(verify_refresh_token(&config, &token).unwrap(), user_id);
    }

    #[test]
    fn access_token_is_not_a_valid_refresh_token() {
        let config = test_config();
        let token = issue_access_token(&config, Uuid::new_v4(), UserRole::User).unwrap();
        assert!(verify_refresh_token(&config, &token).is_err());
    }

    #[test]
    fn tampered_refresh_token_is_rejected() {
        let config = test_config();
        let mut token = issue_refresh_token(&config, Uuid::new_v4()).unwrap();
        token.push('x');
        assert!(verify_refresh_token(&config, &token).is_err());
    }
}
