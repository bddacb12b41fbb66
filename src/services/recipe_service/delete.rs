use crate::api::error::AppError;
use crate::entities::{favorites, prelude::*, recipe_ingredients, recipe_tags, shopping_carts};
use sea_orm::{ColumnTrait, EntityTrait, ModelTrait, QueryFilter, TransactionTrait};

use super::RecipeService;

impl RecipeService {
    /// Deletes the recipe with its join rows, then its stored image.
    pub async fn delete_recipe(&self, id: i32, user_id: i32) -> Result<(), AppError> {
        let recipe = self.get_owned(id, user_id).await?;
        let image = recipe.image.clone();

        let txn = self.db.begin().await?;

        RecipeIngredients::delete_many()
            .filter(recipe_ingredients::Column::RecipeId.eq(id))
            .exec(&txn)
            .await?;
        RecipeTags::delete_many()
            .filter(recipe_tags::Column::RecipeId.eq(id))
            .exec(&txn)
            .await?;
        Favorites::delete_many()
            .filter(favorites::Column::RecipeId.eq(id))
            .exec(&txn)
            .await?;
        ShoppingCarts::delete_many()
            .filter(shopping_carts::Column::RecipeId.eq(id))
            .exec(&txn)
            .await?;
        recipe.delete(&txn).await?;

        txn.commit().await?;

        self.discard_image(&image).await;
        tracing::info!("🗑️ Recipe {} deleted by user {}", id, user_id);
        Ok(())
    }
}
