use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::reviews::{CreateReviewRequest, ReviewList, UpdateReviewRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Review, UserRole},
    response::{ApiResponse, PageMeta},
    routes::params::SearchQuery,
};

fn validate_rating(rating: f32) -> AppResult<()> {
    if !(0.0..=5.0).contains(&rating) {
        return Err(AppError::BadRequest(
            "rating must be between 0 and 5".to_string(),
        ));
    }
    Ok(())
}

/// Keep the denormalized product rating in sync with the review mean.
async fn refresh_product_rating(pool: &DbPool, product_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE products
        SET rating = (SELECT AVG(rating) FROM reviews WHERE product_id = $1),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(product_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_reviews(pool: &DbPool, query: SearchQuery) -> AppResult<ApiResponse<ReviewList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let pattern = query
        .search
        .as_ref()
        .map(|s| format!("%{}%", s.trim()))
        .unwrap_or_else(|| "%".to_string());

    let items: Vec<Review> = sqlx::query_as(
        r#"
        SELECT * FROM reviews
        WHERE comment ILIKE $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(pattern.as_str())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reviews WHERE comment ILIKE $1")
        .bind(pattern.as_str())
        .fetch_one(pool)
        .await?;

    let meta = PageMeta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", ReviewList { items }, Some(meta)))
}

pub async fn list_by_product(
    pool: &DbPool,
    product_id: Uuid,
) -> AppResult<ApiResponse<ReviewList>> {
    let items: Vec<Review> =
        sqlx::query_as("SELECT * FROM reviews WHERE product_id = $1 ORDER BY created_at DESC")
            .bind(product_id)
            .fetch_all(pool)
            .await?;

    Ok(ApiResponse::success("OK", ReviewList { items }, None))
}

pub async fn create_review(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    validate_rating(payload.rating)?;

    let product: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(pool)
        .await?;
    if product.is_none() {
        return Err(AppError::BadRequest("product not found".to_string()));
    }

    let review: Review = sqlx::query_as(
        r#"
        INSERT INTO reviews (id, product_id, user_id, rating, comment)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payload.product_id)
    .bind(user.user_id)
    .bind(payload.rating)
    .bind(payload.comment)
    .fetch_one(pool)
    .await?;

    refresh_product_rating(pool, review.product_id).await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "review_create",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": review.id, "product_id": review.product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Review created", review, None))
}

pub async fn update_review(
    pool: &DbPool,
    user: &AuthUser,
    review_id: Uuid,
    payload: UpdateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    let existing: Option<Review> = sqlx::query_as("SELECT * FROM reviews WHERE id = $1")
        .bind(review_id)
        .fetch_optional(pool)
        .await?;
    let existing = existing.ok_or(AppError::NotFound)?;

    if existing.user_id != user.user_id && user.role != UserRole::Admin {
        return Err(AppError::Forbidden);
    }

    let rating = payload.rating.unwrap_or(existing.rating);
    validate_rating(rating)?;
    let comment = payload.comment.or(existing.comment);

    let review: Review = sqlx::query_as(
        "UPDATE reviews SET rating = $2, comment = $3, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(review_id)
    .bind(rating)
    .bind(comment)
    .fetch_one(pool)
    .await?;

    refresh_product_rating(pool, review.product_id).await?;

    Ok(ApiResponse::success("Review updated", review, None))
}

pub async fn delete_review(
    pool: &DbPool,
    user: &AuthUser,
    review_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing: Option<Review> = sqlx::query_as("SELECT * FROM reviews WHERE id = $1")
        .bind(review_id)
        .fetch_optional(pool)
        .await?;
    let existing = existing.ok_or(AppError::NotFound)?;

    if existing.user_id != user.user_id && user.role != UserRole::Admin {
        return Err(AppError::Forbidden);
    }

    sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(review_id)
        .execute(pool)
        .await?;

    refresh_product_rating(pool, existing.product_id).await?;

    Ok(ApiResponse::success("Review deleted", serde_json::json!({}), None))
}
