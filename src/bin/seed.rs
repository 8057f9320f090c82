use axum_furniture_api::{
    config::AppConfig, db::create_pool, models::OverviewSection, services::auth_service,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin123", "ADMIN").await?;
    let user_id = ensure_user(&pool, "user@example.com", "user123", "USER").await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash =
        auth_service::hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, username, role)
        VALUES ($1, $2, $3, split_part($2, '@', 1), $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn ensure_category(
    pool: &sqlx::PgPool,
    name: &str,
    description: &str,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO categories (id, name, description)
        VALUES ($1, $2, $3)
        ON CONFLICT (name) DO UPDATE SET description = EXCLUDED.description
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(description)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let sofas = ensure_category(pool, "Sofas", "Living room seating").await?;
    let tables = ensure_category(pool, "Tables", "Dining and coffee tables").await?;
    let lighting = ensure_category(pool, "Lighting", "Lamps and fixtures").await?;

    let products = vec![
        (
            "Oslo Fabric Sofa",
            1_200_000_i64,
            12,
            sofas,
            "Three-seater with washable covers",
            vec!["Grey", "Navy", "Beige"],
            vec!["2-seat", "3-seat"],
        ),
        (
            "Walnut Coffee Table",
            450_000,
            30,
            tables,
            "Solid walnut, oiled finish",
            vec!["Walnut", "Oak"],
            vec!["90cm", "120cm"],
        ),
        (
            "Arc Floor Lamp",
            320_000,
            45,
            lighting,
            "Adjustable arm, brass base",
            vec!["Brass", "Black"],
            vec!["One size"],
        ),
    ];

    for (name, price, stock, category_id, description, colors, sizes) in products {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await?;
        if exists.is_some() {
            continue;
        }

        let overview: Vec<OverviewSection> = Vec::new();
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, stock, category_id, description, colors, sizes, overview)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(price)
        .bind(stock)
        .bind(category_id)
        .bind(description)
        .bind(&colors.iter().map(|s| s.to_string()).collect::<Vec<_>>())
        .bind(&sizes.iter().map(|s| s.to_string()).collect::<Vec<_>>())
        .bind(sqlx::types::Json(overview))
        .execute(pool)
        .await?;
    }

    println!("Seeded catalog");
    Ok(())
}
