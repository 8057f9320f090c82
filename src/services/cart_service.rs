use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::cart::{CartDto, CartItemInput, CartLine, RemoveCartItemRequest, UpdateCartItemRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::ProductSummary,
    response::ApiResponse,
};

#[derive(FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CartLineRow {
    product_id: Uuid,
    quantity: i32,
    price: i64,
    discount_price: Option<i64>,
    color: String,
    size: String,
    name: String,
    product_price: i64,
    product_discount_price: Option<i64>,
    images: Vec<String>,
    colors: Vec<String>,
    sizes: Vec<String>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        CartLine {
            product: ProductSummary {
                id: row.product_id,
                name: row.name,
                price: row.product_price,
                discount_price: row.product_discount_price,
                images: row.images,
                colors: row.colors,
                sizes: row.sizes,
            },
            product_id: row.product_id,
            quantity: row.quantity,
            price: row.price,
            discount_price: row.discount_price,
            color: row.color,
            size: row.size,
        }
    }
}

/// The user's cart with product display fields resolved onto each line, or
/// `None` when no cart exists yet.
async fn fetch_cart(pool: &DbPool, user_id: Uuid) -> AppResult<Option<CartDto>> {
    let cart: Option<CartRow> =
        sqlx::query_as("SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    let cart = match cart {
        Some(c) => c,
        None => return Ok(None),
    };

    let rows: Vec<CartLineRow> = sqlx::query_as(
        r#"
        SELECT ci.product_id, ci.quantity, ci.price, ci.discount_price, ci.color, ci.size,
               p.name, p.price AS product_price, p.discount_price AS product_discount_price,
               p.images, p.colors, p.sizes
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.created_at
        "#,
    )
    .bind(cart.id)
    .fetch_all(pool)
    .await?;

    Ok(Some(CartDto {
        id: cart.id,
        user_id: cart.user_id,
        items: rows.into_iter().map(CartLine::from).collect(),
        created_at: cart.created_at,
        updated_at: cart.updated_at,
    }))
}

async fn require_cart(pool: &DbPool, user_id: Uuid) -> AppResult<CartDto> {
    fetch_cart(pool, user_id).await?.ok_or(AppError::NotFound)
}

fn validate_items(items: &[CartItemInput]) -> AppResult<()> {
    for item in items {
        if item.quantity < 1 {
            return Err(AppError::BadRequest(
                "quantity must be greater than 0".to_string(),
            ));
        }
        if item.price < 0 {
            return Err(AppError::BadRequest("price must not be negative".to_string()));
        }
    }
    Ok(())
}

async fn ensure_products_exist(pool: &DbPool, ids: &[Uuid]) -> AppResult<()> {
    let ids: Vec<Uuid> = ids.to_vec();
    let found: (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT id) FROM products WHERE id = ANY($1)")
        .bind(&ids)
        .fetch_one(pool)
        .await?;

    let mut distinct = ids;
    distinct.sort();
    distinct.dedup();
    if found.0 != distinct.len() as i64 {
        return Err(AppError::BadRequest("product not found".to_string()));
    }
    Ok(())
}

pub async fn get_cart(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartDto>> {
    match fetch_cart(pool, user.user_id).await? {
        Some(cart) => Ok(ApiResponse::success("OK", cart, None)),
        None => Ok(ApiResponse::empty("OK")),
    }
}

/// Full replacement: upsert the cart row and overwrite the item list
/// wholesale. Lines sharing a (product, color, size) tuple in the payload are
/// merged additively so the tuple stays unique.
pub async fn replace_cart(
    pool: &DbPool,
    user: &AuthUser,
    items: Vec<CartItemInput>,
) -> AppResult<ApiResponse<CartDto>> {
    validate_items(&items)?;
    let product_ids: Vec<Uuid> = items.iter().map(|i| i.product).collect();
    if !product_ids.is_empty() {
        ensure_products_exist(pool, &product_ids).await?;
    }

    let mut txn = pool.begin().await?;

    let (cart_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO carts (id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE SET updated_at = now()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .fetch_one(&mut *txn)
    .await?;

    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(&mut *txn)
        .await?;

    for item in &items {
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity, price, discount_price, color, size)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (cart_id, product_id, color, size)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cart_id)
        .bind(item.product)
        .bind(item.quantity)
        .bind(item.price)
        .bind(item.discount_price)
        .bind(item.color.as_str())
        .bind(item.size.as_str())
        .execute(&mut *txn)
        .await?;
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_replace",
        Some("carts"),
        Some(serde_json::json!({ "items": items.len() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let cart = require_cart(pool, user.user_id).await?;
    Ok(ApiResponse::success("OK", cart, None))
}

/// Merge one line into the cart. A single conditional upsert keyed by the
/// (product, color, size) tuple does the arithmetic, so concurrent adds to
/// the same cart cannot lose updates or duplicate lines.
pub async fn add_item(
    pool: &DbPool,
    user: &AuthUser,
    item: CartItemInput,
) -> AppResult<ApiResponse<CartDto>> {
    validate_items(std::slice::from_ref(&item))?;

    let product_exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(item.product)
        .fetch_optional(pool)
        .await?;
    if product_exist.is_none() {
        return Err(AppError::BadRequest("product not found".to_string()));
    }

    let mut txn = pool.begin().await?;

    let (cart_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO carts (id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE SET updated_at = now()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .fetch_one(&mut *txn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO cart_items (id, cart_id, product_id, quantity, price, discount_price, color, size)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (cart_id, product_id, color, size)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(cart_id)
    .bind(item.product)
    .bind(item.quantity)
    .bind(item.price)
    .bind(item.discount_price)
    .bind(item.color.as_str())
    .bind(item.size.as_str())
    .execute(&mut *txn)
    .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_add_item",
        Some("cart_items"),
        Some(serde_json::json!({
            "product_id": item.product,
            "color": item.color,
            "size": item.size,
            "quantity": item.quantity,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let cart = require_cart(pool, user.user_id).await?;
    Ok(ApiResponse::success("OK", cart, None))
}

/// Absolute quantity set on an exact tuple match; zero or less removes the
/// line. Missing cart and missing line are both not-found.
pub async fn update_item_quantity(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartDto>> {
    let cart: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM carts WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_optional(pool)
        .await?;
    let (cart_id,) = cart.ok_or(AppError::NotFound)?;

    let result = if payload.quantity <= 0 {
        sqlx::query(
            "DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2 AND color = $3 AND size = $4",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(payload.color.as_str())
        .bind(payload.size.as_str())
        .execute(pool)
        .await?
    } else {
        sqlx::query(
            "UPDATE cart_items SET quantity = $5 WHERE cart_id = $1 AND product_id = $2 AND color = $3 AND size = $4",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(payload.color.as_str())
        .bind(payload.size.as_str())
        .bind(payload.quantity)
        .execute(pool)
        .await?
    };

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_update_item",
        Some("cart_items"),
        Some(serde_json::json!({
            "product_id": product_id,
            "color": payload.color,
            "size": payload.size,
            "quantity": payload.quantity,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let cart = require_cart(pool, user.user_id).await?;
    Ok(ApiResponse::success("OK", cart, None))
}

/// Remove one line by tuple. No error when nothing matches; the cart itself
/// must exist.
pub async fn remove_item(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
    payload: RemoveCartItemRequest,
) -> AppResult<ApiResponse<CartDto>> {
    let cart: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM carts WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_optional(pool)
        .await?;
    let (cart_id,) = cart.ok_or(AppError::NotFound)?;

    sqlx::query(
        "DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2 AND color = $3 AND size = $4",
    )
    .bind(cart_id)
    .bind(product_id)
    .bind(payload.color.as_str())
    .bind(payload.size.as_str())
    .execute(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_remove_item",
        Some("cart_items"),
        Some(serde_json::json!({
            "product_id": product_id,
            "color": payload.color,
            "size": payload.size,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let cart = require_cart(pool, user.user_id).await?;
    Ok(ApiResponse::success("Removed from cart", cart, None))
}

/// Empty the item list but keep the cart row.
pub async fn clear_cart(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartDto>> {
    let cart: Option<(Uuid,)> = sqlx::query_as(
        "UPDATE carts SET updated_at = now() WHERE user_id = $1 RETURNING id",
    )
    .bind(user.user_id)
    .fetch_optional(pool)
    .await?;
    let (cart_id,) = cart.ok_or(AppError::NotFound)?;

    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(pool)
        .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_clear",
        Some("carts"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let cart = require_cart(pool, user.user_id).await?;
    Ok(ApiResponse::success("Cart cleared", cart, None))
}

/// Remove the cart row entirely (items cascade).
pub async fn delete_cart(
    pool: &DbPool,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM carts WHERE user_id = $1")
        .bind(user.user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_delete",
        Some("carts"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Cart deleted",
        serde_json::json!({}),
        None,
    ))
}
