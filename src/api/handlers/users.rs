use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::{AuthUser, Viewer};
use crate::api::pagination::{PageQuery, paginate};
use crate::entities::{prelude::*, subscriptions, users};
use crate::models::{FollowingUserResponse, PaginatedFollowing, PaginatedUsers, UserResponse};
use crate::services::presenter::Presenter;
use crate::services::relations;
use crate::utils::auth::{hash_password, verify_password};
use crate::utils::validation::FieldErrors;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, QueryTrait, Set,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct SetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SubscriptionsQuery {
    /// 1-based page number
    pub page: Option<u64>,
    /// Page size
    pub limit: Option<u64>,
    /// Number of recipes embedded per user
    pub recipes_limit: Option<u64>,
}

fn not_found() -> AppError {
    AppError::NotFound("Not found.".to_string())
}

#[utoipa::path(
    get,
    path = "/api/users/",
    params(PageQuery),
    responses(
        (status = 200, description = "Users page", body = PaginatedUsers)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<PaginatedUsers>, AppError> {
    let request = query.resolve(state.config.page_size);
    let paginator = Users::find()
        .order_by_asc(users::Column::CreatedAt)
        .order_by_asc(users::Column::Id)
        .paginate(&state.db, request.limit);

    let count = paginator.num_items().await?;
    let page = paginator.fetch_page(request.index()).await?;

    let results = Presenter::new(&state.db, &state.config, viewer.0)
        .users(page)
        .await?;
    Ok(Json(paginate(&uri, request, count, results)))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "User profile", body = UserResponse),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<i32>,
) -> Result<Json<UserResponse>, AppError> {
    let user = Users::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(not_found)?;

    let response = Presenter::new(&state.db, &state.config, viewer.0)
        .user(user)
        .await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/users/me/",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserResponse>, AppError> {
    let user = Users::find_by_id(auth.id)
        .one(&state.db)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(UserResponse::new(user, false)))
}

#[utoipa::path(
    post,
    path = "/api/users/set_password/",
    request_body = SetPasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Wrong current password", body = FieldErrors),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn set_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<StatusCode, AppError> {
    let user = Users::find_by_id(auth.id)
        .one(&state.db)
        .await?
        .ok_or_else(not_found)?;

    let mut errors = FieldErrors::new();
    if !verify_password(&payload.current_password, &user.password_hash) {
        errors.add("current_password", "Invalid password.");
    }
    if payload.new_password.is_empty() {
        errors.add("new_password", "This field may not be blank.");
    }
    errors.into_result()?;

    let mut active: users::ActiveModel = user.into();
    active.password_hash = Set(hash_password(&payload.new_password)?);
    active.update(&state.db).await?;

    tracing::info!("🔐 User {} changed password", auth.id);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/subscribe/",
    params(
        ("id" = i32, Path, description = "User to follow"),
        ("recipes_limit" = Option<u64>, Query, description = "Number of embedded recipes")
    ),
    responses(
        (status = 200, description = "Subscribed", body = FollowingUserResponse),
        (status = 400, description = "Self or duplicate subscription", body = FieldErrors),
        (status = 404, description = "User not found")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i32>,
    Query(query): Query<SubscriptionsQuery>,
) -> Result<Json<FollowingUserResponse>, AppError> {
    let target = relations::subscribe(&state.db, auth.id, id).await?;

    let mut following = Presenter::new(&state.db, &state.config, Some(auth.id))
        .following(vec![target], query.recipes_limit)
        .await?;
    let response = following.pop().ok_or_else(not_found)?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}/subscribe/",
    params(("id" = i32, Path, description = "User to unfollow")),
    responses(
        (status = 204, description = "Unsubscribed"),
        (status = 404, description = "User not found")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn unsubscribe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    relations::unsubscribe(&state.db, auth.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/users/subscriptions/",
    params(SubscriptionsQuery),
    responses(
        (status = 200, description = "Followed users with their recipes", body = PaginatedFollowing),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn subscriptions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<SubscriptionsQuery>,
    uri: Uri,
) -> Result<Json<PaginatedFollowing>, AppError> {
    let request = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .resolve(state.config.page_size);

    let followed_ids = Subscriptions::find()
        .select_only()
        .column(subscriptions::Column::FollowingId)
        .filter(subscriptions::Column::UserId.eq(auth.id));

    let paginator = Users::find()
        .filter(users::Column::Id.in_subquery(followed_ids.into_query()))
        .order_by_asc(users::Column::Id)
        .paginate(&state.db, request.limit);

    let count = paginator.num_items().await?;
    let page = paginator.fetch_page(request.index()).await?;

    let results = Presenter::new(&state.db, &state.config, Some(auth.id))
        .following(page, query.recipes_limit)
        .await?;
    Ok(Json(paginate(&uri, request, count, results)))
}
