mod common;

use axum_furniture_api::{
    dto::orders::{CreateOrderRequest, OrderItemInput, UpdateOrderRequest},
    error::AppError,
    models::{OrderStatus, PaymentMethod, PaymentStatus, UserRole},
    routes::params::{OrderSearchQuery, Pagination},
    services::order_service,
};
use uuid::Uuid;

fn order_payload(product: Uuid) -> CreateOrderRequest {
    CreateOrderRequest {
        items: vec![OrderItemInput {
            product,
            quantity: 2,
            price: 1_000,
            color: Some("Red".to_string()),
            size: Some("L".to_string()),
        }],
        payment_method: PaymentMethod::Cash,
        payment_status: None,
        status: None,
        shipping_method: None,
        shipping_address: Some("12 Riverside Lane, Da Nang".to_string()),
        note: None,
    }
}

// Snapshot pricing, lifecycle enforcement, and condition search in one flow.
#[tokio::test]
async fn order_snapshot_and_lifecycle_flow() -> anyhow::Result<()> {
    let state = match common::setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let user = common::create_user(&state, "buyer@example.com", UserRole::User).await?;
    let admin = common::create_user(&state, "admin@example.com", UserRole::Admin).await?;
    let category = common::create_category(&state, "Lighting").await?;
    let product = common::create_product(&state, category, "Arc Lamp", 1_000).await?;

    let resp = order_service::create_order(&state, &user, order_payload(product)).await?;
    let order = resp.data.expect("created order");
    assert_eq!(order.total_amount, 2_000);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].subtotal, 2_000);

    // Changing the live product price must not rewrite order history.
    sqlx::query("UPDATE products SET price = 9999 WHERE id = $1")
        .bind(product)
        .execute(&state.pool)
        .await?;
    let resp = order_service::get_order(&state, &user, order.id).await?;
    let fetched = resp.data.expect("fetched order");
    assert_eq!(fetched.items[0].price, 1_000);
    assert_eq!(fetched.items[0].subtotal, 2_000);
    assert_eq!(fetched.total_amount, 2_000);

    // The owner sees the order, a stranger gets not-found.
    let stranger = common::create_user(&state, "stranger@example.com", UserRole::User).await?;
    let err = order_service::get_order(&state, &stranger, order.id)
        .await
        .expect_err("foreign order");
    assert!(matches!(err, AppError::NotFound));

    // Status must follow the lifecycle table.
    let err = order_service::update_order(
        &state,
        &admin,
        order.id,
        UpdateOrderRequest {
            status: Some(OrderStatus::Delivered),
            payment_status: None,
            shipping_method: None,
            shipping_address: None,
            note: None,
        },
    )
    .await
    .expect_err("PENDING cannot jump to DELIVERED");
    assert!(matches!(err, AppError::BadRequest(_)));

    let resp = order_service::update_order(
        &state,
        &admin,
        order.id,
        UpdateOrderRequest {
            status: Some(OrderStatus::Processing),
            payment_status: Some(PaymentStatus::Paid),
            shipping_method: None,
            shipping_address: None,
            note: None,
        },
    )
    .await?;
    let updated = resp.data.expect("updated order");
    assert_eq!(updated.status, OrderStatus::Processing);
    assert_eq!(updated.payment_status, PaymentStatus::Paid);

    // Search: exact enum matches plus substring on the shipping address.
    let resp = order_service::search_orders(
        &state,
        &admin,
        OrderSearchQuery {
            page: None,
            limit: None,
            payment_method: Some(PaymentMethod::Cash),
            payment_status: Some(PaymentStatus::Paid),
            status: None,
            shipping_address: Some("riverside".to_string()),
        },
    )
    .await?;
    let found = resp.data.expect("search results");
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].id, order.id);
    let meta = resp.pagination.expect("search meta");
    assert_eq!(meta.total, 1);

    // Non-admins cannot use the admin surfaces.
    let err = order_service::list_orders(&state, &user, Pagination::new(None, None))
        .await
        .expect_err("admin only");
    assert!(matches!(err, AppError::Forbidden));

    // The user's own listing works and resolves items.
    let resp = order_service::list_my_orders(&state, &user, Pagination::new(None, None)).await?;
    let mine = resp.data.expect("my orders");
    assert_eq!(mine.items.len(), 1);
    assert_eq!(mine.items[0].items.len(), 1);

    // Hard delete.
    order_service::delete_order(&state, &admin, order.id).await?;
    let err = order_service::get_order(&state, &admin, order.id)
        .await
        .expect_err("order is gone");
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}
