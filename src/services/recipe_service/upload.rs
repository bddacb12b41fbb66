use crate::api::error::AppError;
use crate::entities::recipes;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};

use super::types::*;
use super::{RecipeService, replace_ingredients, replace_tags};

impl RecipeService {
    pub async fn create_recipe(
        &self,
        author_id: i32,
        payload: RecipePayload,
    ) -> Result<recipes::Model, AppError> {
        let ValidatedRecipe {
            name: Some(name),
            text: Some(text),
            cooking_time: Some(cooking_time),
            image: Some(image),
            ingredients: Some(ingredients),
            tags: Some(tags),
        } = self.validate(payload, WriteMode::Create).await?
        else {
            return Err(AppError::Internal(
                "validated recipe is missing a required field".to_string(),
            ));
        };

        let key = image.storage_key();
        self.storage.upload_file(&key, image.data).await?;
        tracing::debug!("💾 Stored recipe image {} ({})", key, image.mime_type);

        let inserted = async {
            let txn = self.db.begin().await?;

            let recipe = recipes::ActiveModel {
                author_id: Set(author_id),
                name: Set(name),
                text: Set(text),
                image: Set(key.clone()),
                cooking_time: Set(cooking_time),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            replace_ingredients(&txn, recipe.id, &ingredients).await?;
            replace_tags(&txn, recipe.id, &tags).await?;

            txn.commit().await?;
            Ok::<_, AppError>(recipe)
        }
        .await;

        match inserted {
            Ok(recipe) => {
                tracing::info!(
                    "🍳 Recipe {} created by user {} ({} ingredients, {} tags)",
                    recipe.id,
                    author_id,
                    ingredients.len(),
                    tags.len()
                );
                Ok(recipe)
            }
            Err(e) => {
                self.discard_image(&key).await;
                Err(e)
            }
        }
    }
}
