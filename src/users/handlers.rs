use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::jwt::{AdminUser, AuthUser, JwtKeys},
    error::ApiError,
    response::{created, ok, ok_message, ApiBody},
    state::AppState,
    users::dto::{
        AdminCreateUserRequest, LoginRequest, LoginResponse, PublicUser, RegisterRequest,
        UpdateUserRequest,
    },
    users::model::Role,
};

pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn profile_router() -> Router<AppState> {
    Router::new().route("/users/:id", put(update_profile))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/users", post(admin_create).get(admin_list))
        .route(
            "/users/:id",
            get(admin_get).put(admin_update).delete(admin_delete),
        )
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiBody<PublicUser>>), ApiError> {
    payload.validate()?;
    let user = state.users.register(payload).await?;
    Ok(created("User created", user))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(StatusCode, Json<ApiBody<LoginResponse>>), ApiError> {
    payload.validate()?;
    let keys = JwtKeys::from_ref(&state);
    let response = state.users.login(payload, &keys).await?;
    Ok(ok(response))
}

/// Authenticated profile update. A non-admin caller may only update their own
/// record, and cannot change roles.
#[instrument(skip(state, payload), fields(caller = %claims.sub))]
async fn update_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateUserRequest>,
) -> Result<(StatusCode, Json<ApiBody<PublicUser>>), ApiError> {
    payload.validate()?;
    if claims.role != Role::Admin {
        if claims.sub != id {
            return Err(ApiError::Forbidden);
        }
        payload.role = None;
    }
    let user = state.users.update(id, payload).await?;
    Ok(ok_message("User updated", user))
}

#[instrument(skip(state, payload), fields(admin = %admin.sub))]
async fn admin_create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<(StatusCode, Json<ApiBody<PublicUser>>), ApiError> {
    payload.validate()?;
    let user = state.users.admin_create(payload).await?;
    Ok(created("User created", user))
}

#[instrument(skip(state), fields(admin = %admin.sub))]
async fn admin_list(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<(StatusCode, Json<ApiBody<Vec<PublicUser>>>), ApiError> {
    let users = state.users.list().await?;
    Ok(ok(users))
}

#[instrument(skip(state), fields(admin = %admin.sub))]
async fn admin_get(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiBody<PublicUser>>), ApiError> {
    let user = state.users.get(id).await?;
    Ok(ok(user))
}

#[instrument(skip(state, payload), fields(admin = %admin.sub))]
async fn admin_update(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<(StatusCode, Json<ApiBody<PublicUser>>), ApiError> {
    payload.validate()?;
    let user = state.users.update(id, payload).await?;
    Ok(ok_message("User updated", user))
}

#[instrument(skip(state), fields(admin = %admin.sub))]
async fn admin_delete(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiBody<Value>>), ApiError> {
    state.users.delete(id).await?;
    Ok((StatusCode::OK, Json(ApiBody::message("User deleted"))))
}
