use crate::entities::{ingredients, prelude::*, recipe_ingredients, shopping_carts};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, JoinType, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait,
};

pub const SHOPPING_LIST_FILENAME: &str = "shopping_cart.txt";

/// One aggregated line of the shopping list.
#[derive(Debug, Clone, PartialEq, FromQueryResult)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Sums ingredient amounts over every recipe in the user's cart, grouped by
/// (name, unit) and ordered by name.
pub async fn aggregate(db: &DatabaseConnection, user_id: i32) -> Result<Vec<ShoppingListItem>, DbErr> {
    let cart_recipes = Query::select()
        .column(shopping_carts::Column::RecipeId)
        .from(shopping_carts::Entity)
        .and_where(shopping_carts::Column::UserId.eq(user_id))
        .to_owned();

    RecipeIngredients::find()
        .select_only()
        .column_as(ingredients::Column::Name, "name")
        .column_as(ingredients::Column::MeasurementUnit, "measurement_unit")
        .column_as(
            Expr::col((recipe_ingredients::Entity, recipe_ingredients::Column::Amount)).sum(),
            "amount",
        )
        .join(
            JoinType::InnerJoin,
            recipe_ingredients::Relation::Ingredients.def(),
        )
        .filter(recipe_ingredients::Column::RecipeId.in_subquery(cart_recipes))
        .group_by(ingredients::Column::Name)
        .group_by(ingredients::Column::MeasurementUnit)
        .order_by_asc(ingredients::Column::Name)
        .order_by_asc(ingredients::Column::MeasurementUnit)
        .into_model::<ShoppingListItem>()
        .all(db)
        .await
}

/// `"<name>, <unit> - <amount>"` per line, joined by `\n`.
pub fn render(items: &[ShoppingListItem]) -> String {
    items
        .iter()
        .map(|item| format!("{}, {} - {}", item.name, item.measurement_unit, item.amount))
        .collect::<Vec<_>>()
        .join("\n")
}
