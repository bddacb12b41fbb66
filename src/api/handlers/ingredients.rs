use crate::AppState;
use crate::api::error::AppError;
use crate::entities::{ingredients, prelude::*};
use crate::models::IngredientResponse;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use sea_orm::sea_query::{Expr, LikeExpr};
use sea_orm::{EntityTrait, QueryFilter, QueryOrder};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct IngredientQuery {
    /// Case-insensitive name prefix
    pub name: Option<String>,
}

/// `LIKE` pattern matching folded names that start with `prefix`.
fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in ingredients::fold_name(prefix).chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[utoipa::path(
    get,
    path = "/api/ingredients/",
    params(IngredientQuery),
    responses(
        (status = 200, description = "Ingredients, optionally filtered by name prefix", body = [IngredientResponse])
    ),
    tag = "ingredients"
)]
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<IngredientQuery>,
) -> Result<Json<Vec<IngredientResponse>>, AppError> {
    let mut select = Ingredients::find();

    if let Some(prefix) = query.name.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        select = select.filter(
            Expr::col(ingredients::Column::SearchName)
                .like(LikeExpr::new(prefix_pattern(prefix)).escape('\\')),
        );
    }

    let items = select
        .order_by_asc(ingredients::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(items.into_iter().map(IngredientResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/ingredients/{id}/",
    params(("id" = i32, Path, description = "Ingredient id")),
    responses(
        (status = 200, description = "Ingredient", body = IngredientResponse),
        (status = 404, description = "Ingredient not found")
    ),
    tag = "ingredients"
)]
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<IngredientResponse>, AppError> {
    let ingredient = Ingredients::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".to_string()))?;
    Ok(Json(ingredient.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_pattern_escapes_wildcards() {
        assert_eq!(prefix_pattern("Sug"), "sug%");
        assert_eq!(prefix_pattern("50%_"), "50\\%\\_%");
        assert_eq!(prefix_pattern("МУ"), "му%");
    }
}
