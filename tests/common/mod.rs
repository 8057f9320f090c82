#![allow(dead_code)]

use axum_furniture_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    middleware::auth::AuthUser,
    models::UserRole,
    state::AppState,
};
use uuid::Uuid;

/// Build an [`AppState`] against the test database, or `None` when no
/// database is configured so the caller can skip.
pub async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    sqlx::query(
        "TRUNCATE TABLE order_items, orders, cart_items, carts, user_favorites, reviews, audit_logs, products, categories, users RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    let config = AppConfig {
        database_url,
        host: "127.0.0.1".to_string(),
        port: 0,
        access_token_secret: "test-access-secret".to_string(),
        refresh_token_secret: "test-refresh-secret".to_string(),
        access_token_ttl_minutes: 30,
        refresh_token_ttl_days: 7,
    };

    Ok(Some(AppState { pool, orm, config }))
}

pub async fn create_user(state: &AppState, email: &str, role: UserRole) -> anyhow::Result<AuthUser> {
    let (user_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO users (id, email, password_hash, username, role) VALUES ($1, $2, 'dummy', $3, $4) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(email.split('@').next().unwrap_or("user"))
    .bind(role.as_str())
    .fetch_one(&state.pool)
    .await?;

    Ok(AuthUser { user_id, role })
}

pub async fn create_category(state: &AppState, name: &str) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO categories (id, name, description) VALUES ($1, $2, 'test category') RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(&state.pool)
    .await?;
    Ok(id)
}

pub async fn create_product(
    state: &AppState,
    category_id: Uuid,
    name: &str,
    price: i64,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO products (id, name, price, stock, category_id, colors, sizes, overview)
        VALUES ($1, $2, $3, 50, $4, ARRAY['Red','Blue'], ARRAY['S','M','L'], '[]'::jsonb)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(price)
    .bind(category_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(id)
}
