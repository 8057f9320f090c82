mod common;

use axum_furniture_api::{
    dto::reviews::{CreateReviewRequest, UpdateReviewRequest},
    error::AppError,
    models::UserRole,
    services::review_service,
};

#[tokio::test]
async fn reviews_maintain_the_product_rating() -> anyhow::Result<()> {
    let state = match common::setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let alice = common::create_user(&state, "alice@example.com", UserRole::User).await?;
    let bob = common::create_user(&state, "bob@example.com", UserRole::User).await?;
    let category = common::create_category(&state, "Sofas").await?;
    let product = common::create_product(&state, category, "Oslo Sofa", 1_200_000).await?;

    let err = review_service::create_review(
        &state.pool,
        &alice,
        CreateReviewRequest {
            product_id: product,
            rating: 5.5,
            comment: None,
        },
    )
    .await
    .expect_err("rating above 5");
    assert!(matches!(err, AppError::BadRequest(_)));

    review_service::create_review(
        &state.pool,
        &alice,
        CreateReviewRequest {
            product_id: product,
            rating: 4.0,
            comment: Some("Very comfortable".to_string()),
        },
    )
    .await?;
    let resp = review_service::create_review(
        &state.pool,
        &bob,
        CreateReviewRequest {
            product_id: product,
            rating: 2.0,
            comment: Some("Covers pill quickly".to_string()),
        },
    )
    .await?;
    let bobs_review = resp.data.expect("bob's review");

    let (rating,): (Option<f32>,) = sqlx::query_as("SELECT rating FROM products WHERE id = $1")
        .bind(product)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(rating, Some(3.0));

    // Only the author (or an admin) may edit.
    let err = review_service::update_review(
        &state.pool,
        &alice,
        bobs_review.id,
        UpdateReviewRequest {
            rating: Some(5.0),
            comment: None,
        },
    )
    .await
    .expect_err("not the author");
    assert!(matches!(err, AppError::Forbidden));

    review_service::delete_review(&state.pool, &bob, bobs_review.id).await?;
    let (rating,): (Option<f32>,) = sqlx::query_as("SELECT rating FROM products WHERE id = $1")
        .bind(product)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(rating, Some(4.0));

    Ok(())
}
