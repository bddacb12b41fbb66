use crate::AppState;
use crate::api::error::{AppError, is_unique_violation};
use crate::api::middleware::auth::AuthUser;
use crate::entities::{prelude::*, tags};
use crate::models::TagResponse;
use crate::utils::validation::{FieldErrors, validate_hex_color, validate_slug};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

const SLUG_TAKEN: &str = "Tag with this slug already exists.";

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateTagRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 64, message = "Ensure this field has 1 to 64 characters."))]
    pub name: String,
    /// `#RRGGBB`
    #[serde(default)]
    #[validate(custom(function = "validate_hex_color"))]
    pub color: String,
    #[serde(default)]
    #[validate(
        length(max = 50, message = "Ensure this field has no more than 50 characters."),
        custom(function = "validate_slug")
    )]
    pub slug: String,
}

#[utoipa::path(
    get,
    path = "/api/tags/",
    responses(
        (status = 200, description = "All tags", body = [TagResponse])
    ),
    tag = "tags"
)]
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagResponse>>, AppError> {
    let tags = Tags::find()
        .order_by_asc(tags::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/tags/{id}/",
    params(("id" = i32, Path, description = "Tag id")),
    responses(
        (status = 200, description = "Tag", body = TagResponse),
        (status = 404, description = "Tag not found")
    ),
    tag = "tags"
)]
pub async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<TagResponse>, AppError> {
    let tag = Tags::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".to_string()))?;
    Ok(Json(tag.into()))
}

#[utoipa::path(
    post,
    path = "/api/tags/",
    request_body = CreateTagRequest,
    responses(
        (status = 201, description = "Tag created", body = TagResponse),
        (status = 400, description = "Invalid tag", body = FieldErrors),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "tags"
)]
pub async fn create_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<TagResponse>), AppError> {
    let mut errors = match payload.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => FieldErrors::from(e),
    };

    let slug_taken = Tags::find()
        .filter(tags::Column::Slug.eq(&payload.slug))
        .count(&state.db)
        .await?
        > 0;
    if slug_taken {
        errors.add("slug", SLUG_TAKEN);
    }
    errors.into_result()?;

    let tag = insert_tag(&state.db, payload).await?;

    tracing::info!("🏷️ Tag '{}' created by user {}", tag.slug, auth.id);
    Ok((StatusCode::CREATED, Json(tag.into())))
}

/// A slug taken between the pre-check and the insert is the same 400.
async fn insert_tag(
    db: &DatabaseConnection,
    payload: CreateTagRequest,
) -> Result<tags::Model, AppError> {
    tags::ActiveModel {
        name: Set(payload.name),
        color: Set(payload.color),
        slug: Set(payload.slug),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::field("slug", SLUG_TAKEN)
        } else {
            e.into()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::run_migrations;
    use sea_orm::Database;

    fn request(slug: &str) -> CreateTagRequest {
        CreateTagRequest {
            name: "Dinner".to_string(),
            color: "#49B64E".to_string(),
            slug: slug.to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_slug_insert_is_a_field_error() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        run_migrations(&db).await.unwrap();

        insert_tag(&db, request("dinner")).await.unwrap();
        match insert_tag(&db, request("dinner")).await {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("slug").unwrap(), [SLUG_TAKEN.to_string()]);
            }
            other => panic!("expected a slug error, got {:?}", other.map(|t| t.slug)),
        }
    }
}
