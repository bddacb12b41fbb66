use crate::entities::{ingredients, tags, users};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct UserResponse {
    pub email: String,
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserResponse {
    pub fn new(user: users::Model, is_subscribed: bool) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }
}

/// Returned by registration; never carries the password.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedUserResponse {
    pub email: String,
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<users::Model> for CreatedUserResponse {
    fn from(user: users::Model) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct TagResponse {
    pub id: i32,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<tags::Model> for TagResponse {
    fn from(tag: tags::Model) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            color: tag.color,
            slug: tag.slug,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct IngredientResponse {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
}

impl From<ingredients::Model> for IngredientResponse {
    fn from(ingredient: ingredients::Model) -> Self {
        Self {
            id: ingredient.id,
            name: ingredient.name,
            measurement_unit: ingredient.measurement_unit,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct RecipeIngredientResponse {
    /// Ingredient id, not the join row id.
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecipeResponse {
    pub id: i32,
    pub tags: Vec<TagResponse>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct ShortRecipeResponse {
    pub id: i32,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

/// A followed author together with a preview of their recipes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FollowingUserResponse {
    pub email: String,
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<ShortRecipeResponse>,
    pub recipes_count: u64,
}

impl FollowingUserResponse {
    pub fn new(user: UserResponse, recipes: Vec<ShortRecipeResponse>, recipes_count: u64) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed: user.is_subscribed,
            recipes,
            recipes_count,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[aliases(
    PaginatedRecipes = Paginated<RecipeResponse>,
    PaginatedUsers = Paginated<UserResponse>,
    PaginatedFollowing = Paginated<FollowingUserResponse>
)]
pub struct Paginated<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}
