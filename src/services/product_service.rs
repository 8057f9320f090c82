use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::products::{
        CategoryRef, CreateProductRequest, ProductCard, ProductList, UpdateProductRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, PageMeta},
    routes::params::{Pagination, ProductQuery},
};

#[derive(FromRow)]
struct ProductCardRow {
    id: Uuid,
    name: String,
    price: i64,
    discount_price: Option<i64>,
    stock: i32,
    description: Option<String>,
    images: Vec<String>,
    rating: Option<f32>,
    created_at: DateTime<Utc>,
    category_id: Uuid,
    category_name: String,
}

impl From<ProductCardRow> for ProductCard {
    fn from(row: ProductCardRow) -> Self {
        ProductCard {
            id: row.id,
            name: row.name,
            price: row.price,
            discount_price: row.discount_price,
            stock: row.stock,
            description: row.description,
            images: row.images,
            rating: row.rating,
            category: CategoryRef {
                id: row.category_id,
                name: row.category_name,
            },
            created_at: row.created_at,
        }
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    if let Some(name) = query.name.as_ref().filter(|s| !s.trim().is_empty()) {
        builder.push(" AND p.name ILIKE ");
        builder.push_bind(format!("%{}%", name.trim()));
    }
    if let Some(category_id) = query.category_id {
        builder.push(" AND p.category_id = ");
        builder.push_bind(category_id);
    }
    if let Some(min_price) = query.min_price {
        builder.push(" AND p.price >= ");
        builder.push_bind(min_price);
    }
    if let Some(max_price) = query.max_price {
        builder.push(" AND p.price <= ");
        builder.push_bind(max_price);
    }
}

async fn fetch_cards(pool: &DbPool, query: &ProductQuery) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let mut builder = QueryBuilder::new(
        r#"
        SELECT p.id, p.name, p.price, p.discount_price, p.stock, p.description,
               p.images, p.rating, p.created_at, c.id AS category_id, c.name AS category_name
        FROM products p
        JOIN categories c ON c.id = p.category_id
        WHERE 1 = 1
        "#,
    );
    push_filters(&mut builder, query);
    builder.push(" ORDER BY p.created_at DESC LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);

    let rows: Vec<ProductCardRow> = builder.build_query_as().fetch_all(pool).await?;

    let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM products p WHERE 1 = 1");
    push_filters(&mut count_builder, query);
    let total: (i64,) = count_builder.build_query_as().fetch_one(pool).await?;

    let items = rows.into_iter().map(ProductCard::from).collect();
    let meta = PageMeta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "OK",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn list_products(
    pool: &DbPool,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    let query = ProductQuery {
        page: pagination.page,
        limit: pagination.limit,
        name: None,
        category_id: None,
        min_price: None,
        max_price: None,
    };
    fetch_cards(pool, &query).await
}

pub async fn search_products(
    pool: &DbPool,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    fetch_cards(pool, &query).await
}

pub async fn get_product(pool: &DbPool, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let product = product.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", product, None))
}

fn validate_product_fields(
    price: i64,
    discount_price: Option<i64>,
    stock: i32,
    colors: &[String],
    sizes: &[String],
) -> AppResult<()> {
    if price < 1 {
        return Err(AppError::BadRequest("price must be at least 1".to_string()));
    }
    if let Some(discount) = discount_price {
        if discount < 0 {
            return Err(AppError::BadRequest(
                "discountPrice must not be negative".to_string(),
            ));
        }
    }
    if stock < 0 {
        return Err(AppError::BadRequest("stock must not be negative".to_string()));
    }
    if colors.is_empty() {
        return Err(AppError::BadRequest("colors are required".to_string()));
    }
    if sizes.is_empty() {
        return Err(AppError::BadRequest("sizes are required".to_string()));
    }
    Ok(())
}

pub async fn create_product(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    validate_product_fields(
        payload.price,
        payload.discount_price,
        payload.stock,
        &payload.colors,
        &payload.sizes,
    )?;

    let category: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM categories WHERE id = $1")
        .bind(payload.category_id)
        .fetch_optional(pool)
        .await?;
    if category.is_none() {
        return Err(AppError::BadRequest("category not found".to_string()));
    }

    let id = Uuid::new_v4();
    let product: Product = sqlx::query_as(
        r#"
        INSERT INTO products
            (id, name, price, discount_price, stock, category_id, description,
             images, colors, sizes, overview, voucher_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.name)
    .bind(payload.price)
    .bind(payload.discount_price)
    .bind(payload.stock)
    .bind(payload.category_id)
    .bind(payload.description)
    .bind(&payload.images)
    .bind(&payload.colors)
    .bind(&payload.sizes)
    .bind(sqlx::types::Json(payload.overview))
    .bind(payload.voucher_id)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Product created", product, None))
}

pub async fn update_product(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let existing: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let existing = existing.ok_or(AppError::NotFound)?;

    let name = payload.name.unwrap_or(existing.name);
    let price = payload.price.unwrap_or(existing.price);
    let discount_price = payload.discount_price.or(existing.discount_price);
    let stock = payload.stock.unwrap_or(existing.stock);
    let category_id = payload.category_id.unwrap_or(existing.category_id);
    let description = payload.description.or(existing.description);
    let images = payload.images.unwrap_or(existing.images);
    let colors = payload.colors.unwrap_or(existing.colors);
    let sizes = payload.sizes.unwrap_or(existing.sizes);
    let overview = payload.overview.unwrap_or(existing.overview);
    let voucher_id = payload.voucher_id.or(existing.voucher_id);

    validate_product_fields(price, discount_price, stock, &colors, &sizes)?;

    if category_id != existing.category_id {
        let category: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM categories WHERE id = $1")
            .bind(category_id)
            .fetch_optional(pool)
            .await?;
        if category.is_none() {
            return Err(AppError::BadRequest("category not found".to_string()));
        }
    }

    let product: Product = sqlx::query_as(
        r#"
        UPDATE products
        SET name = $2, price = $3, discount_price = $4, stock = $5, category_id = $6,
            description = $7, images = $8, colors = $9, sizes = $10, overview = $11,
            voucher_id = $12, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(price)
    .bind(discount_price)
    .bind(stock)
    .bind(category_id)
    .bind(description)
    .bind(&images)
    .bind(&colors)
    .bind(&sizes)
    .bind(sqlx::types::Json(overview))
    .bind(voucher_id)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Product updated", product, None))
}

pub async fn delete_product(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Product deleted", serde_json::json!({}), None))
}
