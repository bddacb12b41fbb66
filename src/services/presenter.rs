use crate::config::AppConfig;
use crate::entities::{
    favorites, prelude::*, recipe_ingredients, recipe_tags, recipes, shopping_carts,
    subscriptions, users,
};
use crate::models::{
    FollowingUserResponse, RecipeIngredientResponse, RecipeResponse, ShortRecipeResponse,
    TagResponse, UserResponse,
};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use std::collections::{HashMap, HashSet};

/// Turns stored rows into API responses for one viewer. Per-viewer flags are
/// loaded in batch for the whole page.
pub struct Presenter<'a> {
    db: &'a DatabaseConnection,
    config: &'a AppConfig,
    viewer: Option<i32>,
}

impl<'a> Presenter<'a> {
    pub fn new(db: &'a DatabaseConnection, config: &'a AppConfig, viewer: Option<i32>) -> Self {
        Self { db, config, viewer }
    }

    pub async fn user(&self, user: users::Model) -> Result<UserResponse, DbErr> {
        let mut users = self.users(vec![user]).await?;
        users
            .pop()
            .ok_or_else(|| DbErr::Custom("user vanished while rendering".to_string()))
    }

    pub async fn users(&self, users: Vec<users::Model>) -> Result<Vec<UserResponse>, DbErr> {
        let ids: Vec<i32> = users.iter().map(|u| u.id).collect();
        let followed = self.followed_among(&ids).await?;

        Ok(users
            .into_iter()
            .map(|user| {
                let is_subscribed = followed.contains(&user.id);
                UserResponse::new(user, is_subscribed)
            })
            .collect())
    }

    pub fn short_recipe(&self, recipe: recipes::Model) -> ShortRecipeResponse {
        ShortRecipeResponse {
            id: recipe.id,
            image: self.config.media_url_for(&recipe.image),
            name: recipe.name,
            cooking_time: recipe.cooking_time,
        }
    }

    pub async fn recipe(&self, recipe: recipes::Model) -> Result<RecipeResponse, DbErr> {
        let mut recipes = self.recipes(vec![recipe]).await?;
        recipes
            .pop()
            .ok_or_else(|| DbErr::Custom("recipe vanished while rendering".to_string()))
    }

    pub async fn recipes(&self, recipes: Vec<recipes::Model>) -> Result<Vec<RecipeResponse>, DbErr> {
        if recipes.is_empty() {
            return Ok(Vec::new());
        }

        let recipe_ids: Vec<i32> = recipes.iter().map(|r| r.id).collect();
        let author_ids: Vec<i32> = recipes
            .iter()
            .map(|r| r.author_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let authors: HashMap<i32, UserResponse> = self
            .users(
                Users::find()
                    .filter(users::Column::Id.is_in(author_ids))
                    .all(self.db)
                    .await?,
            )
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut tags: HashMap<i32, Vec<TagResponse>> = HashMap::new();
        for (link, tag) in RecipeTags::find()
            .filter(recipe_tags::Column::RecipeId.is_in(recipe_ids.clone()))
            .order_by_asc(recipe_tags::Column::TagId)
            .find_also_related(Tags)
            .all(self.db)
            .await?
        {
            if let Some(tag) = tag {
                tags.entry(link.recipe_id).or_default().push(tag.into());
            }
        }

        let mut ingredients: HashMap<i32, Vec<RecipeIngredientResponse>> = HashMap::new();
        for (row, ingredient) in RecipeIngredients::find()
            .filter(recipe_ingredients::Column::RecipeId.is_in(recipe_ids.clone()))
            .order_by_asc(recipe_ingredients::Column::Id)
            .find_also_related(Ingredients)
            .all(self.db)
            .await?
        {
            if let Some(ingredient) = ingredient {
                ingredients
                    .entry(row.recipe_id)
                    .or_default()
                    .push(RecipeIngredientResponse {
                        id: ingredient.id,
                        name: ingredient.name,
                        measurement_unit: ingredient.measurement_unit,
                        amount: row.amount,
                    });
            }
        }

        let (favorited, in_cart) = match self.viewer {
            Some(viewer) => (
                Favorites::find()
                    .select_only()
                    .column(favorites::Column::RecipeId)
                    .filter(favorites::Column::UserId.eq(viewer))
                    .filter(favorites::Column::RecipeId.is_in(recipe_ids.clone()))
                    .into_tuple::<i32>()
                    .all(self.db)
                    .await?
                    .into_iter()
                    .collect::<HashSet<_>>(),
                ShoppingCarts::find()
                    .select_only()
                    .column(shopping_carts::Column::RecipeId)
                    .filter(shopping_carts::Column::UserId.eq(viewer))
                    .filter(shopping_carts::Column::RecipeId.is_in(recipe_ids))
                    .into_tuple::<i32>()
                    .all(self.db)
                    .await?
                    .into_iter()
                    .collect::<HashSet<_>>(),
            ),
            None => (HashSet::new(), HashSet::new()),
        };

        recipes
            .into_iter()
            .map(|recipe| -> Result<RecipeResponse, DbErr> {
                let author = authors.get(&recipe.author_id).cloned().ok_or_else(|| {
                    DbErr::RecordNotFound(format!("author {} of recipe {}", recipe.author_id, recipe.id))
                })?;
                Ok(RecipeResponse {
                    id: recipe.id,
                    tags: tags.remove(&recipe.id).unwrap_or_default(),
                    author,
                    ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
                    is_favorited: favorited.contains(&recipe.id),
                    is_in_shopping_cart: in_cart.contains(&recipe.id),
                    image: self.config.media_url_for(&recipe.image),
                    name: recipe.name,
                    text: recipe.text,
                    cooking_time: recipe.cooking_time,
                })
            })
            .collect()
    }

    /// Followed users with their newest recipes, `recipes_limit` per user.
    pub async fn following(
        &self,
        users: Vec<users::Model>,
        recipes_limit: Option<u64>,
    ) -> Result<Vec<FollowingUserResponse>, DbErr> {
        let mut out = Vec::with_capacity(users.len());

        for user in self.users(users).await? {
            let query = Recipes::find()
                .filter(recipes::Column::AuthorId.eq(user.id))
                .order_by_desc(recipes::Column::Id);

            let recipes_count = query.clone().count(self.db).await?;
            let recipes = match recipes_limit {
                Some(limit) => query.limit(limit).all(self.db).await?,
                None => query.all(self.db).await?,
            };

            let recipes = recipes.into_iter().map(|r| self.short_recipe(r)).collect();
            out.push(FollowingUserResponse::new(user, recipes, recipes_count));
        }

        Ok(out)
    }

    async fn followed_among(&self, ids: &[i32]) -> Result<HashSet<i32>, DbErr> {
        let Some(viewer) = self.viewer else {
            return Ok(HashSet::new());
        };
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let followed = Subscriptions::find()
            .select_only()
            .column(subscriptions::Column::FollowingId)
            .filter(subscriptions::Column::UserId.eq(viewer))
            .filter(subscriptions::Column::FollowingId.is_in(ids.to_vec()))
            .into_tuple::<i32>()
            .all(self.db)
            .await?;

        Ok(followed.into_iter().collect())
    }
}
