use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::users::{FavoriteProductList, UpdateProfileRequest, UserList},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Product, UserPublic, UserRow},
    response::{ApiResponse, PageMeta},
    routes::params::Pagination,
};

pub async fn list_users(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let rows: Vec<UserRow> = sqlx::query_as(
        "SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    let items = rows.into_iter().map(UserPublic::from).collect();
    let meta = PageMeta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", UserList { items }, Some(meta)))
}

pub async fn search_users(
    pool: &DbPool,
    user: &AuthUser,
    search: Option<String>,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let search = search
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("search is required".to_string()))?;
    let pattern = format!("%{}%", search.trim());
    let (page, limit, offset) = pagination.normalize();

    let rows: Vec<UserRow> = sqlx::query_as(
        r#"
        SELECT * FROM users
        WHERE username ILIKE $1 OR email ILIKE $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(pattern.as_str())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE username ILIKE $1 OR email ILIKE $1")
            .bind(pattern.as_str())
            .fetch_one(pool)
            .await?;

    let items = rows.into_iter().map(UserPublic::from).collect();
    let meta = PageMeta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", UserList { items }, Some(meta)))
}

pub async fn get_me(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<UserPublic>> {
    let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(pool)
        .await?;
    let row = row.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", row.into(), None))
}

pub async fn update_me(
    pool: &DbPool,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<UserPublic>> {
    if payload.is_empty() {
        return Err(AppError::BadRequest("no profile fields provided".to_string()));
    }

    let row: Option<UserRow> = sqlx::query_as(
        r#"
        UPDATE users
        SET username = COALESCE($2, username),
            first_name = COALESCE($3, first_name),
            last_name = COALESCE($4, last_name),
            phone = COALESCE($5, phone),
            address = COALESCE($6, address),
            avatar = COALESCE($7, avatar),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(payload.username)
    .bind(payload.first_name)
    .bind(payload.last_name)
    .bind(payload.phone)
    .bind(payload.address)
    .bind(payload.avatar)
    .fetch_optional(pool)
    .await?;
    let row = row.ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("Profile updated", row.into(), None))
}

pub async fn delete_me(
    pool: &DbPool,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "user_delete",
        Some("users"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Account deleted",
        serde_json::json!({}),
        None,
    ))
}

pub async fn list_favorites(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<FavoriteProductList>> {
    let (page, limit, offset) = pagination.normalize();

    let products: Vec<Product> = sqlx::query_as(
        r#"
        SELECT p.*
        FROM user_favorites f
        JOIN products p ON p.id = f.product_id
        WHERE f.user_id = $1
        ORDER BY f.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_favorites WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(pool)
        .await?;

    let meta = PageMeta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "OK",
        FavoriteProductList { items: products },
        Some(meta),
    ))
}

pub async fn add_favorite(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(pool)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::BadRequest("product not found".to_string())),
    };

    sqlx::query(
        r#"
        INSERT INTO user_favorites (user_id, product_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, product_id) DO NOTHING
        "#,
    )
    .bind(user.user_id)
    .bind(product_id)
    .execute(pool)
    .await?;

    Ok(ApiResponse::success("Added to favorites", product, None))
}

pub async fn remove_favorite(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM user_favorites WHERE user_id = $1 AND product_id = $2")
        .bind(user.user_id)
        .bind(product_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Removed from favorites",
        serde_json::json!({}),
        None,
    ))
}
