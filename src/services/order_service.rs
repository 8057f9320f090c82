use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::LockType;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        CreateOrderRequest, OrderDto, OrderLine, OrderList, ProductRef, UpdateOrderRequest,
        UserSummary,
    },
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{OrderStatus, PaymentMethod, PaymentStatus, ShippingMethod, UserRole},
    response::{ApiResponse, PageMeta},
    routes::params::{OrderSearchQuery, Pagination},
    state::AppState,
};

fn bad_column(column: &str) -> AppError {
    AppError::Internal(anyhow::anyhow!("unexpected {column} value in orders row"))
}

fn order_from_entity(
    model: OrderModel,
    items: Vec<OrderLine>,
    user: Option<UserSummary>,
) -> AppResult<OrderDto> {
    let payment_method = PaymentMethod::parse(&model.payment_method)
        .ok_or_else(|| bad_column("payment_method"))?;
    let payment_status = PaymentStatus::parse(&model.payment_status)
        .ok_or_else(|| bad_column("payment_status"))?;
    let status = OrderStatus::parse(&model.status).ok_or_else(|| bad_column("status"))?;
    let shipping_method = match model.shipping_method.as_deref() {
        Some(value) => {
            Some(ShippingMethod::parse(value).ok_or_else(|| bad_column("shipping_method"))?)
        }
        None => None,
    };

    Ok(OrderDto {
        id: model.id,
        user_id: model.user_id,
        user,
        items,
        total_amount: model.total_amount,
        payment_method,
        payment_status,
        status,
        shipping_method,
        shipping_address: model.shipping_address,
        note: model.note,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn lines_from_items(
    items: Vec<OrderItemModel>,
    products: &HashMap<Uuid, ProductRef>,
) -> Vec<OrderLine> {
    items
        .into_iter()
        .map(|item| OrderLine {
            product: products.get(&item.product_id).cloned(),
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.price,
            subtotal: item.subtotal,
            color: item.color,
            size: item.size,
        })
        .collect()
}

async fn product_refs(state: &AppState, ids: &[Uuid]) -> AppResult<HashMap<Uuid, ProductRef>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let ids: Vec<Uuid> = ids.to_vec();
    let rows: Vec<ProductRef> =
        sqlx::query_as("SELECT id, name, price, images FROM products WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&state.pool)
            .await?;
    Ok(rows.into_iter().map(|p| (p.id, p)).collect())
}

async fn user_summaries(state: &AppState, ids: &[Uuid]) -> AppResult<HashMap<Uuid, UserSummary>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let ids: Vec<Uuid> = ids.to_vec();
    let rows: Vec<UserSummary> = sqlx::query_as(
        r#"
        SELECT id, username, first_name, last_name, email, phone, address, avatar
        FROM users WHERE id = ANY($1)
        "#,
    )
    .bind(&ids)
    .fetch_all(&state.pool)
    .await?;
    Ok(rows.into_iter().map(|u| (u.id, u)).collect())
}

/// Resolve line items (and optionally the ordering user) for a page of
/// orders with one batched query per collection.
async fn populate_orders(
    state: &AppState,
    orders: Vec<OrderModel>,
    with_user: bool,
) -> AppResult<Vec<OrderDto>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids))
        .all(&state.orm)
        .await?;

    let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products = product_refs(state, &product_ids).await?;

    let users = if with_user {
        let user_ids: Vec<Uuid> = orders.iter().map(|o| o.user_id).collect();
        user_summaries(state, &user_ids).await?
    } else {
        HashMap::new()
    };

    let mut grouped: HashMap<Uuid, Vec<OrderItemModel>> = HashMap::new();
    for item in items {
        grouped.entry(item.order_id).or_default().push(item);
    }

    orders
        .into_iter()
        .map(|order| {
            let lines = lines_from_items(grouped.remove(&order.id).unwrap_or_default(), &products);
            let user = users.get(&order.user_id).cloned();
            order_from_entity(order, lines, user)
        })
        .collect()
}

async fn populate_one(state: &AppState, order: OrderModel) -> AppResult<OrderDto> {
    populate_orders(state, vec![order], true)
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order population returned nothing")))
}

/// Snapshot the payload's line items into a new order. Prices and subtotals
/// are copied by value here, so later catalog changes never rewrite history.
/// The caller's cart is untouched; stock is not adjusted.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderDto>> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("items are required".to_string()));
    }

    let mut total_amount: i64 = 0;
    for item in &payload.items {
        if item.quantity < 1 {
            return Err(AppError::BadRequest(
                "quantity must be greater than 0".to_string(),
            ));
        }
        if item.price < 0 {
            return Err(AppError::BadRequest("price must not be negative".to_string()));
        }
        total_amount += item.price * item.quantity as i64;
    }

    let status = payload.status.unwrap_or(OrderStatus::Pending);
    let payment_status = payload.payment_status.unwrap_or(PaymentStatus::Pending);

    let txn = state.orm.begin().await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total_amount: Set(total_amount),
        status: Set(status.as_str().into()),
        payment_method: Set(payload.payment_method.as_str().into()),
        payment_status: Set(payment_status.as_str().into()),
        shipping_method: Set(payload.shipping_method.map(|m| m.as_str().to_string())),
        shipping_address: Set(payload.shipping_address.clone()),
        note: Set(payload.note.clone()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut item_models: Vec<OrderItemModel> = Vec::new();
    for item in &payload.items {
        let subtotal = item.price * item.quantity as i64;
        let model = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(item.product),
            quantity: Set(item.quantity),
            price: Set(item.price),
            subtotal: Set(subtotal),
            color: Set(item.color.clone()),
            size: Set(item.size.clone()),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        item_models.push(model);
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total_amount": total_amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let product_ids: Vec<Uuid> = item_models.iter().map(|i| i.product_id).collect();
    let products = product_refs(state, &product_ids).await?;
    let users = user_summaries(state, std::slice::from_ref(&user.user_id)).await?;
    let lines = lines_from_items(item_models, &products);
    let dto = order_from_entity(order, lines, users.get(&user.user_id).cloned())?;

    Ok(ApiResponse::success("Order created", dto, None))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Orders::find().order_by_desc(OrderCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = populate_orders(state, orders, true).await?;
    let meta = PageMeta::new(page, limit, total);
    Ok(ApiResponse::success("OK", OrderList { items }, Some(meta)))
}

pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .order_by_desc(OrderCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = populate_orders(state, orders, false).await?;
    let meta = PageMeta::new(page, limit, total);
    Ok(ApiResponse::success("OK", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDto>> {
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    // Non-admin callers only see their own orders; missing and foreign ids
    // are indistinguishable.
    if user.role != UserRole::Admin && order.user_id != user.user_id {
        return Err(AppError::NotFound);
    }

    let dto = populate_one(state, order).await?;
    Ok(ApiResponse::success("OK", dto, None))
}

pub async fn search_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderSearchQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(method) = query.payment_method {
        condition = condition.add(OrderCol::PaymentMethod.eq(method.as_str()));
    }
    if let Some(payment_status) = query.payment_status {
        condition = condition.add(OrderCol::PaymentStatus.eq(payment_status.as_str()));
    }
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }
    if let Some(address) = query.shipping_address.as_ref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", address.trim());
        condition = condition.add(Expr::col(OrderCol::ShippingAddress).ilike(pattern));
    }

    let finder = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = populate_orders(state, orders, true).await?;
    let meta = PageMeta::new(page, limit, total);
    Ok(ApiResponse::success("OK", OrderList { items }, Some(meta)))
}

/// Patch mutable order fields. Status changes must follow the lifecycle
/// table; anything else is rejected rather than silently overwritten.
pub async fn update_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<OrderDto>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if let Some(next) = payload.status {
        let current = OrderStatus::parse(&order.status).ok_or_else(|| bad_column("status"))?;
        if !current.can_transition_to(next) {
            return Err(AppError::BadRequest(format!(
                "Cannot change order status from {} to {}",
                current.as_str(),
                next.as_str()
            )));
        }
    }

    let mut active: OrderActive = order.into();
    if let Some(next) = payload.status {
        active.status = Set(next.as_str().into());
    }
    if let Some(payment_status) = payload.payment_status {
        active.payment_status = Set(payment_status.as_str().into());
    }
    if let Some(shipping_method) = payload.shipping_method {
        active.shipping_method = Set(Some(shipping_method.as_str().to_string()));
    }
    if let Some(address) = payload.shipping_address {
        active.shipping_address = Set(Some(address));
    }
    if let Some(note) = payload.note {
        active.note = Set(Some(note));
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let dto = populate_one(state, order).await?;
    Ok(ApiResponse::success("Order updated", dto, None))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let result = Orders::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_delete",
        Some("orders"),
        Some(serde_json::json!({ "order_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Order deleted", serde_json::json!({}), None))
}
