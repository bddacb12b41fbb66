use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::entities::{prelude::*, recipe_ingredients, recipe_tags, recipes};
use crate::services::storage::StorageService;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;

pub mod delete;
pub mod types;
pub mod update;
pub mod upload;
pub mod validate;

pub use types::{IngredientAmount, RecipePayload, RecipeWriteRequest, ValidatedRecipe, WriteMode};

pub struct RecipeService {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
    config: AppConfig,
}

impl RecipeService {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn StorageService>, config: AppConfig) -> Self {
        Self {
            db,
            storage,
            config,
        }
    }

    /// Loads a recipe the caller may modify: 404 when missing, 403 for
    /// anyone but the author.
    pub async fn get_owned(&self, id: i32, user_id: i32) -> Result<recipes::Model, AppError> {
        let recipe = Recipes::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Not found.".to_string()))?;

        if recipe.author_id != user_id {
            return Err(AppError::Forbidden(
                "You do not have permission to perform this action.".to_string(),
            ));
        }
        Ok(recipe)
    }

    /// Best-effort removal of a stored image; failures are only logged.
    async fn discard_image(&self, key: &str) {
        if let Err(e) = self.storage.delete_file(key).await {
            tracing::warn!("⚠️ Failed to delete image {}: {}", key, e);
        }
    }
}

/// Replaces every ingredient row of a recipe with `items`.
async fn replace_ingredients<C: ConnectionTrait>(
    conn: &C,
    recipe_id: i32,
    items: &[IngredientAmount],
) -> Result<(), AppError> {
    RecipeIngredients::delete_many()
        .filter(recipe_ingredients::Column::RecipeId.eq(recipe_id))
        .exec(conn)
        .await?;

    if items.is_empty() {
        return Ok(());
    }

    let rows = items.iter().map(|item| recipe_ingredients::ActiveModel {
        recipe_id: Set(recipe_id),
        ingredient_id: Set(item.ingredient_id),
        amount: Set(item.amount),
        ..Default::default()
    });
    RecipeIngredients::insert_many(rows)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

/// Replaces the tag set of a recipe with `tag_ids`.
async fn replace_tags<C: ConnectionTrait>(
    conn: &C,
    recipe_id: i32,
    tag_ids: &[i32],
) -> Result<(), AppError> {
    RecipeTags::delete_many()
        .filter(recipe_tags::Column::RecipeId.eq(recipe_id))
        .exec(conn)
        .await?;

    if tag_ids.is_empty() {
        return Ok(());
    }

    let rows = tag_ids.iter().map(|tag_id| recipe_tags::ActiveModel {
        recipe_id: Set(recipe_id),
        tag_id: Set(*tag_id),
    });
    RecipeTags::insert_many(rows)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}
