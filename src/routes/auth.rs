use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{
    dto::auth::{
        AccessTokenResponse, AuthResponse, LoginRequest, LogoutRequest, RefreshRequest,
        RegisterRequest,
    },
    error::{AppError, AppResult},
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub const REFRESH_COOKIE: &str = "refreshToken";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}

fn refresh_cookie(token: String, max_age_days: i64) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(max_age_days))
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Register user", body = ApiResponse<AuthResponse>),
        (status = 409, description = "Email already registered"),
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, CookieJar, Json<ApiResponse<AuthResponse>>)> {
    let (auth, refresh_token) = auth_service::register_user(&state, payload).await?;
    let jar = jar.add(refresh_cookie(
        refresh_token,
        state.config.refresh_token_ttl_days,
    ));
    Ok((
        StatusCode::CREATED,
        jar,
        Json(ApiResponse::success("User registered", auth, None)),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login user", body = ApiResponse<AuthResponse>),
        (status = 401, description = "Invalid credentials"),
        (status = 404, description = "Unknown email"),
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<ApiResponse<AuthResponse>>)> {
    let (auth, refresh_token) = auth_service::login_user(&state, payload).await?;
    let jar = jar.add(refresh_cookie(
        refresh_token,
        state.config.refresh_token_ttl_days,
    ));
    Ok((jar, Json(ApiResponse::success("Logged in", auth, None))))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = ApiResponse<AccessTokenResponse>),
        (status = 401, description = "Invalid refresh token"),
    ),
    tag = "Auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<ApiResponse<AccessTokenResponse>>> {
    let access_token = auth_service::refresh_access_token(&state, &payload.token).await?;
    Ok(Json(ApiResponse::success(
        "OK",
        AccessTokenResponse { access_token },
        None,
    )))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Invalid refresh token"),
    ),
    tag = "Auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Option<Json<LogoutRequest>>,
) -> AppResult<(CookieJar, Json<ApiResponse<serde_json::Value>>)> {
    let token = payload
        .and_then(|Json(p)| p.token)
        .or_else(|| jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()))
        .ok_or_else(|| AppError::BadRequest("token is required".to_string()))?;

    auth_service::logout_user(&state, &token).await?;

    let jar = jar.remove(removal_cookie());
    Ok((
        jar,
        Json(ApiResponse::success("Logged out", serde_json::json!({}), None)),
    ))
}
