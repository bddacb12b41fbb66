use crate::AppState;
use crate::api::error::{AppError, is_unique_violation};
use crate::api::middleware::auth::AuthUser;
use crate::entities::{prelude::*, tokens, users};
use crate::models::CreatedUserResponse;
use crate::utils::auth::{create_jwt, hash_password, verify_password};
use crate::utils::validation::{FieldErrors, validate_username};
use axum::{Extension, Json, extract::State, http::StatusCode};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

const USERNAME_TAKEN: &str = "A user with that username already exists.";
const EMAIL_TAKEN: &str = "A user with that email already exists.";

/// Maps a unique-index failure from a concurrent registration to the same
/// field error the pre-check reports.
fn registration_conflict(err: DbErr) -> AppError {
    if !is_unique_violation(&err) {
        return err.into();
    }
    if err.to_string().contains("email") {
        AppError::field("email", EMAIL_TAKEN)
    } else {
        AppError::field("username", USERNAME_TAKEN)
    }
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(
        length(min = 1, max = 254, message = "Ensure this field has 1 to 254 characters."),
        email(message = "Enter a valid email address.")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(
        length(min = 1, max = 150, message = "Ensure this field has 1 to 150 characters."),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 150, message = "Ensure this field has 1 to 150 characters."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 150, message = "Ensure this field has 1 to 150 characters."))]
    pub last_name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub auth_token: String,
}

#[utoipa::path(
    post,
    path = "/api/users/",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = CreatedUserResponse),
        (status = 400, description = "Invalid or already taken fields", body = FieldErrors)
    ),
    tag = "users"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<CreatedUserResponse>), AppError> {
    let mut errors = match payload.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => FieldErrors::from(e),
    };

    let username_taken = Users::find()
        .filter(users::Column::Username.eq(&payload.username))
        .count(&state.db)
        .await?
        > 0;
    if username_taken {
        errors.add("username", USERNAME_TAKEN);
    }

    let email_taken = Users::find()
        .filter(users::Column::Email.eq(&payload.email))
        .count(&state.db)
        .await?
        > 0;
    if email_taken {
        errors.add("email", EMAIL_TAKEN);
    }

    errors.into_result()?;

    let password_hash = hash_password(&payload.password)?;
    let user = users::ActiveModel {
        username: Set(payload.username),
        email: Set(payload.email),
        first_name: Set(payload.first_name),
        last_name: Set(payload.last_name),
        password_hash: Set(password_hash),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(registration_conflict)?;

    tracing::info!("👤 Registered user {} ({})", user.id, user.username);
    Ok((StatusCode::CREATED, Json(CreatedUserResponse::from(user))))
}

#[utoipa::path(
    post,
    path = "/api/auth/token/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid credentials", body = FieldErrors)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let invalid = || {
        AppError::field(
            "non_field_errors",
            "Unable to log in with provided credentials.",
        )
    };

    let user = Users::find()
        .filter(users::Column::Email.eq(payload.email))
        .one(&state.db)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password_hash) {
        return Err(invalid());
    }

    let issued = create_jwt(
        user.id,
        &state.config.jwt_secret,
        state.config.token_ttl_hours,
    )?;

    let swept = Tokens::delete_many()
        .filter(tokens::Column::UserId.eq(user.id))
        .filter(tokens::Column::ExpiresAt.lte(Utc::now()))
        .exec(&state.db)
        .await?
        .rows_affected;
    if swept > 0 {
        tracing::debug!("🧹 Dropped {} expired tokens of user {}", swept, user.id);
    }

    // The token is honoured only while this row exists
    tokens::ActiveModel {
        id: Set(issued.jti),
        user_id: Set(user.id),
        expires_at: Set(issued.expires_at),
    }
    .insert(&state.db)
    .await?;

    tracing::info!("🔑 User {} logged in", user.id);
    Ok(Json(LoginResponse {
        auth_token: issued.token,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/token/logout/",
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode, AppError> {
    Tokens::delete_by_id(user.jti).exec(&state.db).await?;
    tracing::info!("👋 User {} logged out", user.id);
    Ok(StatusCode::NO_CONTENT)
}
