use crate::entities::{
    favorites, ingredients, recipe_ingredients, recipe_tags, recipes, shopping_carts,
    subscriptions, tags, tokens, users,
};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;
use std::time::Duration;
use tracing::info;

const DEFAULT_DATABASE_URL: &str = "sqlite://recipes.db?mode=rwc";

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    info!("🔄 Running auto-migrations...");

    // Order matters for foreign keys: Users -> Recipes -> join tables
    let stmts = vec![
        (
            "users",
            schema
                .create_table_from_entity(users::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "tokens",
            schema
                .create_table_from_entity(tokens::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "tags",
            schema
                .create_table_from_entity(tags::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "ingredients",
            schema
                .create_table_from_entity(ingredients::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "recipes",
            schema
                .create_table_from_entity(recipes::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "recipe_ingredients",
            schema
                .create_table_from_entity(recipe_ingredients::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "recipe_tags",
            schema
                .create_table_from_entity(recipe_tags::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "favorites",
            schema
                .create_table_from_entity(favorites::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "shopping_carts",
            schema
                .create_table_from_entity(shopping_carts::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "subscriptions",
            schema
                .create_table_from_entity(subscriptions::Entity)
                .if_not_exists()
                .to_owned(),
        ),
    ];

    for (name, stmt) in stmts {
        let stmt = builder.build(&stmt);
        db.execute(stmt).await?;
        info!("   - Table '{}' checked/created", name);
    }

    // Composite uniqueness is not expressible on the entities themselves
    let indexes = [
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_favorites_user_recipe ON favorites(user_id, recipe_id)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_shopping_carts_user_recipe ON shopping_carts(user_id, recipe_id)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_subscriptions_user_following ON subscriptions(user_id, following_id)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_recipe_ingredients_pair ON recipe_ingredients(recipe_id, ingredient_id)",
        "CREATE INDEX IF NOT EXISTS idx_ingredients_name ON ingredients(name)",
        "CREATE INDEX IF NOT EXISTS idx_ingredients_search_name ON ingredients(search_name)",
        "CREATE INDEX IF NOT EXISTS idx_recipes_author_id ON recipes(author_id)",
        "CREATE INDEX IF NOT EXISTS idx_tokens_user_id ON tokens(user_id)",
    ];

    for query in indexes {
        db.execute(sea_orm::Statement::from_string(builder, query.to_owned()))
            .await?;
        tracing::debug!("   - Executed schema update: {}", query);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::prelude::*;
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        run_migrations(&db).await.unwrap();
        run_migrations(&db).await.unwrap();

        ingredients::ActiveModel {
            name: Set("flour".to_string()),
            measurement_unit: Set("g".to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        assert_eq!(Ingredients::find().all(&db).await.unwrap().len(), 1);
    }
}
