use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Category,
    response::{ApiResponse, PageMeta},
    routes::params::{CategoryQuery, Pagination},
};

pub async fn list_categories(
    pool: &DbPool,
    pagination: Pagination,
) -> AppResult<ApiResponse<CategoryList>> {
    let (page, limit, offset) = pagination.normalize();

    let items: Vec<Category> = sqlx::query_as(
        "SELECT * FROM categories ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
        .fetch_one(pool)
        .await?;

    let meta = PageMeta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", CategoryList { items }, Some(meta)))
}

pub async fn search_categories(
    pool: &DbPool,
    query: CategoryQuery,
) -> AppResult<ApiResponse<CategoryList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let pattern = query
        .name
        .as_ref()
        .map(|n| format!("%{}%", n.trim()))
        .unwrap_or_else(|| "%".to_string());

    let items: Vec<Category> = sqlx::query_as(
        r#"
        SELECT * FROM categories
        WHERE name ILIKE $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(pattern.as_str())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories WHERE name ILIKE $1")
        .bind(pattern.as_str())
        .fetch_one(pool)
        .await?;

    let meta = PageMeta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", CategoryList { items }, Some(meta)))
}

pub async fn create_category(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }

    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM categories WHERE name = $1")
        .bind(payload.name.as_str())
        .fetch_optional(pool)
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict("Category name already exists".to_string()));
    }

    let category: Category = sqlx::query_as(
        "INSERT INTO categories (id, name, description) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(payload.name)
    .bind(payload.description)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "category_create",
        Some("categories"),
        Some(serde_json::json!({ "category_id": category.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Category created", category, None))
}

pub async fn update_category(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;

    let existing: Option<Category> = sqlx::query_as("SELECT * FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let existing = existing.ok_or(AppError::NotFound)?;

    let name = payload.name.unwrap_or(existing.name);
    let description = payload.description.or(existing.description);

    let conflict: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM categories WHERE name = $1 AND id <> $2")
            .bind(name.as_str())
            .bind(id)
            .fetch_optional(pool)
            .await?;
    if conflict.is_some() {
        return Err(AppError::Conflict("Category name already exists".to_string()));
    }

    let category: Category = sqlx::query_as(
        "UPDATE categories SET name = $2, description = $3, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success("Category updated", category, None))
}

pub async fn delete_category(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let in_use: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE category_id = $1")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if in_use.0 > 0 {
        return Err(AppError::Conflict(
            "Category is referenced by products".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "category_delete",
        Some("categories"),
        Some(serde_json::json!({ "category_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Category deleted", serde_json::json!({}), None))
}
