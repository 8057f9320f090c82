mod common;

use axum_furniture_api::{
    dto::cart::{CartItemInput, RemoveCartItemRequest, UpdateCartItemRequest},
    error::AppError,
    models::UserRole,
    services::cart_service,
};
use uuid::Uuid;

fn line(product: Uuid, quantity: i32, color: &str, size: &str) -> CartItemInput {
    CartItemInput {
        product,
        quantity,
        price: 1_200_000,
        discount_price: None,
        color: color.to_string(),
        size: size.to_string(),
    }
}

// Integration flow over the tuple-merge invariant: one line per
// (product, color, size), additive merge, absolute set, zero removes.
#[tokio::test]
async fn cart_merge_and_quantity_flow() -> anyhow::Result<()> {
    let state = match common::setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let user = common::create_user(&state, "cart-user@example.com", UserRole::User).await?;
    let category = common::create_category(&state, "Sofas").await?;
    let product = common::create_product(&state, category, "Oslo Sofa", 1_200_000).await?;

    // First add creates the cart with a single line.
    let resp = cart_service::add_item(&state.pool, &user, line(product, 2, "Red", "L")).await?;
    let cart = resp.data.expect("cart after first add");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 2);

    // Same tuple merges additively instead of duplicating the line.
    let resp = cart_service::add_item(&state.pool, &user, line(product, 3, "Red", "L")).await?;
    let cart = resp.data.expect("cart after merge");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 5);

    // A different color is a distinct purchasable unit.
    let resp = cart_service::add_item(&state.pool, &user, line(product, 1, "Blue", "L")).await?;
    let cart = resp.data.expect("cart after second tuple");
    assert_eq!(cart.items.len(), 2);

    // Absolute set, not increment.
    let resp = cart_service::update_item_quantity(
        &state.pool,
        &user,
        product,
        UpdateCartItemRequest {
            color: "Blue".to_string(),
            size: "L".to_string(),
            quantity: 7,
        },
    )
    .await?;
    let cart = resp.data.expect("cart after set");
    let blue = cart
        .items
        .iter()
        .find(|l| l.color == "Blue")
        .expect("blue line");
    assert_eq!(blue.quantity, 7);

    // Quantity zero removes the line entirely.
    let resp = cart_service::update_item_quantity(
        &state.pool,
        &user,
        product,
        UpdateCartItemRequest {
            color: "Red".to_string(),
            size: "L".to_string(),
            quantity: 0,
        },
    )
    .await?;
    let cart = resp.data.expect("cart after removal");
    assert_eq!(cart.items.len(), 1);
    assert!(cart.items.iter().all(|l| l.color != "Red"));

    // Repeating the call on the removed tuple is not-found.
    let err = cart_service::update_item_quantity(
        &state.pool,
        &user,
        product,
        UpdateCartItemRequest {
            color: "Red".to_string(),
            size: "L".to_string(),
            quantity: 0,
        },
    )
    .await
    .expect_err("tuple is gone");
    assert!(matches!(err, AppError::NotFound));

    // Removing a tuple that never existed is a silent no-op.
    let resp = cart_service::remove_item(
        &state.pool,
        &user,
        product,
        RemoveCartItemRequest {
            color: "Green".to_string(),
            size: "XXL".to_string(),
        },
    )
    .await?;
    let cart = resp.data.expect("cart after no-op remove");
    assert_eq!(cart.items.len(), 1);

    // Clear keeps the cart row but empties the items.
    let resp = cart_service::clear_cart(&state.pool, &user).await?;
    let cart = resp.data.expect("cleared cart");
    assert!(cart.items.is_empty());

    // Delete removes the cart document itself.
    cart_service::delete_cart(&state.pool, &user).await?;
    let resp = cart_service::get_cart(&state.pool, &user).await?;
    assert!(resp.data.is_none());

    Ok(())
}

#[tokio::test]
async fn cart_replace_is_wholesale() -> anyhow::Result<()> {
    let state = match common::setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let user = common::create_user(&state, "replace-user@example.com", UserRole::User).await?;
    let category = common::create_category(&state, "Tables").await?;
    let product = common::create_product(&state, category, "Walnut Table", 450_000).await?;

    cart_service::add_item(&state.pool, &user, line(product, 4, "Red", "M")).await?;

    // Replacement overwrites the list; the old Red/M line must not survive.
    let resp = cart_service::replace_cart(
        &state.pool,
        &user,
        vec![line(product, 1, "Blue", "S"), line(product, 2, "Blue", "M")],
    )
    .await?;
    let cart = resp.data.expect("replaced cart");
    assert_eq!(cart.items.len(), 2);
    assert!(cart.items.iter().all(|l| l.color == "Blue"));

    // Invalid quantity rejects the whole payload.
    let err = cart_service::replace_cart(&state.pool, &user, vec![line(product, 0, "Red", "S")])
        .await
        .expect_err("zero quantity");
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}
