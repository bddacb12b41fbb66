use crate::api::error::AppError;
use crate::entities::recipes;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};

use super::types::*;
use super::{RecipeService, replace_ingredients, replace_tags};

impl RecipeService {
    /// Partial update of a recipe loaded with [`RecipeService::get_owned`].
    /// Lists present in the payload replace the stored sets; absent scalars
    /// keep their values.
    pub async fn update_recipe(
        &self,
        recipe: recipes::Model,
        payload: RecipePayload,
    ) -> Result<recipes::Model, AppError> {
        let id = recipe.id;
        let data = self.validate(payload, WriteMode::Update).await?;

        let new_image = match data.image {
            Some(image) => {
                let key = image.storage_key();
                self.storage.upload_file(&key, image.data).await?;
                Some(key)
            }
            None => None,
        };

        let old_image = recipe.image.clone();
        let updated = async {
            let txn = self.db.begin().await?;

            let mut active: recipes::ActiveModel = recipe.clone().into();
            let mut changed = false;
            if let Some(name) = data.name {
                active.name = Set(name);
                changed = true;
            }
            if let Some(text) = data.text {
                active.text = Set(text);
                changed = true;
            }
            if let Some(cooking_time) = data.cooking_time {
                active.cooking_time = Set(cooking_time);
                changed = true;
            }
            if let Some(key) = &new_image {
                active.image = Set(key.clone());
                changed = true;
            }

            let updated = if changed {
                active.update(&txn).await?
            } else {
                recipe
            };

            if let Some(ingredients) = &data.ingredients {
                replace_ingredients(&txn, id, ingredients).await?;
            }
            if let Some(tags) = &data.tags {
                replace_tags(&txn, id, tags).await?;
            }

            txn.commit().await?;
            Ok::<_, AppError>(updated)
        }
        .await;

        match (updated, new_image) {
            (Ok(updated), Some(_)) => {
                self.discard_image(&old_image).await;
                tracing::info!("✏️ Recipe {} updated with a new image", id);
                Ok(updated)
            }
            (Ok(updated), None) => {
                tracing::info!("✏️ Recipe {} updated", id);
                Ok(updated)
            }
            (Err(e), Some(key)) => {
                self.discard_image(&key).await;
                Err(e)
            }
            (Err(e), None) => Err(e),
        }
    }
}
