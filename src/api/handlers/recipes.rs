use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::{AuthUser, Viewer};
use crate::api::pagination::{PageQuery, paginate, query_pairs};
use crate::entities::{favorites, prelude::*, recipe_tags, recipes, shopping_carts, tags};
use crate::models::{PaginatedRecipes, RecipeResponse, ShortRecipeResponse};
use crate::services::presenter::Presenter;
use crate::services::recipe_service::{RecipePayload, RecipeWriteRequest};
use crate::services::relations::{self, RecipeList};
use crate::services::shopping_list::{self, SHOPPING_LIST_FILENAME};
use crate::utils::validation::FieldErrors;
use axum::{
    Extension, Json, async_trait,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{StatusCode, Uri, header},
    response::IntoResponse,
};
use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait,
    RelationTrait, Select,
};
use serde_json::{Map, Value};

/// Filters of the recipe listing, parsed from the raw query so `tags` may repeat.
#[derive(Debug, Default, PartialEq)]
pub struct RecipeFilter {
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub author: Option<i32>,
    pub tags: Vec<String>,
}

fn truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true")
}

impl RecipeFilter {
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, AppError> {
        let mut filter = RecipeFilter::default();
        for (key, value) in pairs {
            match key.as_str() {
                "is_favorited" => filter.is_favorited = truthy(value),
                "is_in_shopping_cart" => filter.is_in_shopping_cart = truthy(value),
                "author" => {
                    let author = value
                        .trim()
                        .parse()
                        .map_err(|_| AppError::field("author", "Enter a number."))?;
                    filter.author = Some(author);
                }
                "tags" if !value.trim().is_empty() => filter.tags.push(value.trim().to_string()),
                _ => {}
            }
        }
        Ok(filter)
    }

    /// `None` when the filter cannot match anything for this viewer.
    fn apply(self, mut select: Select<Recipes>, viewer: Option<i32>) -> Option<Select<Recipes>> {
        if self.is_favorited {
            let favorited = Favorites::find()
                .select_only()
                .column(favorites::Column::RecipeId)
                .filter(favorites::Column::UserId.eq(viewer?));
            select = select.filter(recipes::Column::Id.in_subquery(favorited.into_query()));
        }
        if self.is_in_shopping_cart {
            let in_cart = ShoppingCarts::find()
                .select_only()
                .column(shopping_carts::Column::RecipeId)
                .filter(shopping_carts::Column::UserId.eq(viewer?));
            select = select.filter(recipes::Column::Id.in_subquery(in_cart.into_query()));
        }
        if let Some(author) = self.author {
            select = select.filter(recipes::Column::AuthorId.eq(author));
        }
        if !self.tags.is_empty() {
            let tagged = RecipeTags::find()
                .select_only()
                .column(recipe_tags::Column::RecipeId)
                .join(
                    sea_orm::JoinType::InnerJoin,
                    recipe_tags::Relation::Tags.def(),
                )
                .filter(tags::Column::Slug.is_in(self.tags));
            select = select.filter(recipes::Column::Id.in_subquery(tagged.into_query()));
        }
        Some(select)
    }
}

fn rejected(status: StatusCode, body: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(body)
    } else {
        AppError::BadRequest(body)
    }
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    rejected(e.status(), e.body_text())
}

/// Accepts a JSON object (image as a data URI) or `multipart/form-data`
/// (binary `image` part, `ingredients`/`tags` as JSON text parts).
#[async_trait]
impl<S: Send + Sync> FromRequest<S> for RecipePayload {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(value) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|e| rejected(e.status(), e.body_text()))?;
            return match value {
                Value::Object(fields) => Ok(RecipePayload::from_json(fields)),
                _ => Err(AppError::BadRequest("Expected a JSON object.".to_string())),
            };
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| rejected(e.status(), e.body_text()))?;

        let mut fields = Map::new();
        let mut image_file = None;
        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "image" && field.file_name().is_some() {
                image_file = Some(field.bytes().await.map_err(bad_multipart)?.to_vec());
                continue;
            }

            let text = field.text().await.map_err(bad_multipart)?;
            let value = match name.as_str() {
                "ingredients" | "tags" => {
                    serde_json::from_str(&text).unwrap_or(Value::String(text))
                }
                _ => Value::String(text),
            };
            fields.insert(name, value);
        }

        Ok(RecipePayload { fields, image_file })
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Not found.".to_string())
}

#[utoipa::path(
    get,
    path = "/api/recipes/",
    params(
        PageQuery,
        ("is_favorited" = Option<String>, Query, description = "1/true: only the caller's favorites"),
        ("is_in_shopping_cart" = Option<String>, Query, description = "1/true: only recipes in the caller's cart"),
        ("author" = Option<i32>, Query, description = "Author id"),
        ("tags" = Option<Vec<String>>, Query, description = "Tag slugs, any of")
    ),
    responses(
        (status = 200, description = "Recipes page, newest first", body = PaginatedRecipes),
        (status = 400, description = "Invalid filter", body = FieldErrors)
    ),
    tag = "recipes"
)]
pub async fn list_recipes(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    uri: Uri,
) -> Result<Json<PaginatedRecipes>, AppError> {
    let pairs = query_pairs(&uri);
    let request = PageQuery::from_pairs(&pairs).resolve(state.config.page_size);
    let filter = RecipeFilter::from_pairs(&pairs)?;

    let Some(select) = filter.apply(Recipes::find(), viewer.0) else {
        return Ok(Json(paginate(&uri, request, 0, Vec::new())));
    };

    let paginator = select
        .order_by_desc(recipes::Column::Id)
        .paginate(&state.db, request.limit);
    let count = paginator.num_items().await?;
    let page = paginator.fetch_page(request.index()).await?;

    let results = Presenter::new(&state.db, &state.config, viewer.0)
        .recipes(page)
        .await?;
    Ok(Json(paginate(&uri, request, count, results)))
}

#[utoipa::path(
    get,
    path = "/api/recipes/{id}/",
    params(("id" = i32, Path, description = "Recipe id")),
    responses(
        (status = 200, description = "Recipe", body = RecipeResponse),
        (status = 404, description = "Recipe not found")
    ),
    tag = "recipes"
)]
pub async fn get_recipe(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<i32>,
) -> Result<Json<RecipeResponse>, AppError> {
    let recipe = Recipes::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(not_found)?;

    let response = Presenter::new(&state.db, &state.config, viewer.0)
        .recipe(recipe)
        .await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/recipes/",
    request_body = RecipeWriteRequest,
    responses(
        (status = 201, description = "Recipe created", body = RecipeResponse),
        (status = 400, description = "Every validation error keyed by field", body = FieldErrors),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "recipes"
)]
pub async fn create_recipe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: RecipePayload,
) -> Result<(StatusCode, Json<RecipeResponse>), AppError> {
    let user_id = auth.id;
    let recipe = state.recipe_service.create_recipe(user_id, payload).await?;

    let response = Presenter::new(&state.db, &state.config, Some(user_id))
        .recipe(recipe)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    patch,
    path = "/api/recipes/{id}/",
    params(("id" = i32, Path, description = "Recipe id")),
    request_body = RecipeWriteRequest,
    responses(
        (status = 200, description = "Recipe updated", body = RecipeResponse),
        (status = 400, description = "Every validation error keyed by field", body = FieldErrors),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Recipe not found")
    ),
    security(("jwt" = [])),
    tag = "recipes"
)]
pub async fn update_recipe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i32>,
    request: Request,
) -> Result<Json<RecipeResponse>, AppError> {
    let user_id = auth.id;
    // Ownership is settled before the body is read
    let recipe = state.recipe_service.get_owned(id, user_id).await?;
    let payload = RecipePayload::from_request(request, &state).await?;
    let recipe = state.recipe_service.update_recipe(recipe, payload).await?;

    let response = Presenter::new(&state.db, &state.config, Some(user_id))
        .recipe(recipe)
        .await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}/",
    params(("id" = i32, Path, description = "Recipe id")),
    responses(
        (status = 204, description = "Recipe deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Recipe not found")
    ),
    security(("jwt" = [])),
    tag = "recipes"
)]
pub async fn delete_recipe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    state.recipe_service.delete_recipe(id, auth.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_to_list(
    state: &AppState,
    list: RecipeList,
    user_id: i32,
    recipe_id: i32,
) -> Result<Json<ShortRecipeResponse>, AppError> {
    let recipe = relations::add_recipe(&state.db, list, user_id, recipe_id).await?;
    let response = Presenter::new(&state.db, &state.config, Some(user_id)).short_recipe(recipe);
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/recipes/{id}/favorite/",
    params(("id" = i32, Path, description = "Recipe id")),
    responses(
        (status = 200, description = "Added to favorites", body = ShortRecipeResponse),
        (status = 400, description = "Already in favorites", body = FieldErrors),
        (status = 404, description = "Recipe not found")
    ),
    security(("jwt" = [])),
    tag = "recipes"
)]
pub async fn add_favorite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<Json<ShortRecipeResponse>, AppError> {
    add_to_list(&state, RecipeList::Favorites, auth.id, id).await
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}/favorite/",
    params(("id" = i32, Path, description = "Recipe id")),
    responses(
        (status = 204, description = "Removed from favorites"),
        (status = 404, description = "Recipe not found")
    ),
    security(("jwt" = [])),
    tag = "recipes"
)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    relations::remove_recipe(&state.db, RecipeList::Favorites, auth.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/recipes/{id}/shopping_cart/",
    params(("id" = i32, Path, description = "Recipe id")),
    responses(
        (status = 200, description = "Added to the shopping cart", body = ShortRecipeResponse),
        (status = 400, description = "Already in the shopping cart", body = FieldErrors),
        (status = 404, description = "Recipe not found")
    ),
    security(("jwt" = [])),
    tag = "recipes"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<Json<ShortRecipeResponse>, AppError> {
    add_to_list(&state, RecipeList::ShoppingCart, auth.id, id).await
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}/shopping_cart/",
    params(("id" = i32, Path, description = "Recipe id")),
    responses(
        (status = 204, description = "Removed from the shopping cart"),
        (status = 404, description = "Recipe not found")
    ),
    security(("jwt" = [])),
    tag = "recipes"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    relations::remove_recipe(&state.db, RecipeList::ShoppingCart, auth.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/recipes/download_shopping_cart/",
    responses(
        (status = 200, description = "Summed ingredient list as a text attachment", content_type = "text/plain"),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "recipes"
)]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let items = shopping_list::aggregate(&state.db, auth.id).await?;
    tracing::info!(
        "🛒 User {} downloaded a shopping list of {} items",
        auth.id,
        items.len()
    );

    let disposition = format!("attachment; filename={}", SHOPPING_LIST_FILENAME);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=UTF-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        shopping_list::render(&items),
    ))
}
