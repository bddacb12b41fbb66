use crate::api::error::{AppError, is_unique_violation};
use crate::entities::{favorites, prelude::*, recipes, shopping_carts, subscriptions, users};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};

const NON_FIELD: &str = "non_field_errors";

/// Per-user recipe collections toggled through `POST`/`DELETE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn duplicate_message(self) -> &'static str {
        match self {
            RecipeList::Favorites => "Recipe is already in favorites.",
            RecipeList::ShoppingCart => "Recipe is already in shopping cart.",
        }
    }

    fn label(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping cart",
        }
    }

    async fn contains(
        self,
        db: &DatabaseConnection,
        user_id: i32,
        recipe_id: i32,
    ) -> Result<bool, DbErr> {
        let count = match self {
            RecipeList::Favorites => {
                Favorites::find()
                    .filter(favorites::Column::UserId.eq(user_id))
                    .filter(favorites::Column::RecipeId.eq(recipe_id))
                    .count(db)
                    .await?
            }
            RecipeList::ShoppingCart => {
                ShoppingCarts::find()
                    .filter(shopping_carts::Column::UserId.eq(user_id))
                    .filter(shopping_carts::Column::RecipeId.eq(recipe_id))
                    .count(db)
                    .await?
            }
        };
        Ok(count > 0)
    }
}

async fn find_recipe(db: &DatabaseConnection, recipe_id: i32) -> Result<recipes::Model, AppError> {
    Recipes::find_by_id(recipe_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".to_string()))
}

async fn find_user(db: &DatabaseConnection, user_id: i32) -> Result<users::Model, AppError> {
    Users::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".to_string()))
}

/// Adds a recipe to one of the caller's lists. A second add is a 400, also
/// when two requests race past the pre-check.
pub async fn add_recipe(
    db: &DatabaseConnection,
    list: RecipeList,
    user_id: i32,
    recipe_id: i32,
) -> Result<recipes::Model, AppError> {
    let recipe = find_recipe(db, recipe_id).await?;

    if list.contains(db, user_id, recipe_id).await? {
        return Err(AppError::field(NON_FIELD, list.duplicate_message()));
    }

    let inserted = match list {
        RecipeList::Favorites => favorites::ActiveModel {
            user_id: Set(user_id),
            recipe_id: Set(recipe_id),
            ..Default::default()
        }
        .insert(db)
        .await
        .map(|_| ()),
        RecipeList::ShoppingCart => shopping_carts::ActiveModel {
            user_id: Set(user_id),
            recipe_id: Set(recipe_id),
            ..Default::default()
        }
        .insert(db)
        .await
        .map(|_| ()),
    };

    match inserted {
        Ok(()) => {
            tracing::info!(
                "⭐ User {} added recipe {} to {}",
                user_id,
                recipe_id,
                list.label()
            );
            Ok(recipe)
        }
        Err(e) if is_unique_violation(&e) => {
            Err(AppError::field(NON_FIELD, list.duplicate_message()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Removes a recipe from one of the caller's lists. Missing rows are fine.
pub async fn remove_recipe(
    db: &DatabaseConnection,
    list: RecipeList,
    user_id: i32,
    recipe_id: i32,
) -> Result<(), AppError> {
    find_recipe(db, recipe_id).await?;

    let result = match list {
        RecipeList::Favorites => {
            Favorites::delete_many()
                .filter(favorites::Column::UserId.eq(user_id))
                .filter(favorites::Column::RecipeId.eq(recipe_id))
                .exec(db)
                .await?
        }
        RecipeList::ShoppingCart => {
            ShoppingCarts::delete_many()
                .filter(shopping_carts::Column::UserId.eq(user_id))
                .filter(shopping_carts::Column::RecipeId.eq(recipe_id))
                .exec(db)
                .await?
        }
    };

    tracing::debug!(
        "User {} removed recipe {} from {} ({} rows)",
        user_id,
        recipe_id,
        list.label(),
        result.rows_affected
    );
    Ok(())
}

/// `user_id` starts following `target_id`; returns the followed user.
pub async fn subscribe(
    db: &DatabaseConnection,
    user_id: i32,
    target_id: i32,
) -> Result<users::Model, AppError> {
    let target = find_user(db, target_id).await?;

    if user_id == target_id {
        return Err(AppError::field(NON_FIELD, "You can't subscribe to yourself."));
    }

    let duplicate = || AppError::field(NON_FIELD, "You are already subscribed to this user.");

    let existing = Subscriptions::find()
        .filter(subscriptions::Column::UserId.eq(user_id))
        .filter(subscriptions::Column::FollowingId.eq(target_id))
        .count(db)
        .await?;
    if existing > 0 {
        return Err(duplicate());
    }

    let inserted = subscriptions::ActiveModel {
        user_id: Set(user_id),
        following_id: Set(target_id),
        ..Default::default()
    }
    .insert(db)
    .await;

    match inserted {
        Ok(_) => {
            tracing::info!("👥 User {} subscribed to user {}", user_id, target_id);
            Ok(target)
        }
        Err(e) if is_unique_violation(&e) => Err(duplicate()),
        Err(e) => Err(e.into()),
    }
}

pub async fn unsubscribe(
    db: &DatabaseConnection,
    user_id: i32,
    target_id: i32,
) -> Result<(), AppError> {
    find_user(db, target_id).await?;

    Subscriptions::delete_many()
        .filter(subscriptions::Column::UserId.eq(user_id))
        .filter(subscriptions::Column::FollowingId.eq(target_id))
        .exec(db)
        .await?;

    Ok(())
}
