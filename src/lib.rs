pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::api::middleware::auth::{auth_middleware, optional_auth_middleware};
use crate::config::AppConfig;
use crate::services::recipe_service::RecipeService;
use crate::services::storage::StorageService;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::me,
        api::handlers::users::set_password,
        api::handlers::users::subscribe,
        api::handlers::users::unsubscribe,
        api::handlers::users::subscriptions,
        api::handlers::tags::list_tags,
        api::handlers::tags::get_tag,
        api::handlers::tags::create_tag,
        api::handlers::ingredients::list_ingredients,
        api::handlers::ingredients::get_ingredient,
        api::handlers::recipes::list_recipes,
        api::handlers::recipes::get_recipe,
        api::handlers::recipes::create_recipe,
        api::handlers::recipes::update_recipe,
        api::handlers::recipes::delete_recipe,
        api::handlers::recipes::add_favorite,
        api::handlers::recipes::remove_favorite,
        api::handlers::recipes::add_to_cart,
        api::handlers::recipes::remove_from_cart,
        api::handlers::recipes::download_shopping_cart,
        api::handlers::media::serve_media,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::auth::RegisterRequest,
            api::handlers::auth::LoginRequest,
            api::handlers::auth::LoginResponse,
            api::handlers::users::SetPasswordRequest,
            api::handlers::tags::CreateTagRequest,
            api::handlers::health::HealthResponse,
            services::recipe_service::types::RecipeWriteRequest,
            services::recipe_service::types::IngredientAmountRequest,
            utils::validation::FieldErrors,
            models::UserResponse,
            models::CreatedUserResponse,
            models::TagResponse,
            models::IngredientResponse,
            models::RecipeIngredientResponse,
            models::RecipeResponse,
            models::ShortRecipeResponse,
            models::FollowingUserResponse,
            models::PaginatedRecipes,
            models::PaginatedUsers,
            models::PaginatedFollowing,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Token login and logout"),
        (name = "users", description = "Accounts and subscriptions"),
        (name = "tags", description = "Recipe tags"),
        (name = "ingredients", description = "Ingredient catalog"),
        (name = "recipes", description = "Recipes, favorites and the shopping cart"),
        (name = "media", description = "Stored images"),
        (name = "system", description = "Health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub recipe_service: Arc<RecipeService>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn StorageService>, config: AppConfig) -> Self {
        let recipe_service = Arc::new(RecipeService::new(
            db.clone(),
            storage.clone(),
            config.clone(),
        ));
        Self {
            db,
            storage,
            recipe_service,
            config,
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    layer.allow_origin(origins)
}

pub fn create_app(state: AppState) -> Router {
    use api::handlers::{auth, health, ingredients, media, recipes, tags, users};

    let required = || from_fn_with_state(state.clone(), auth_middleware);
    let optional = || from_fn_with_state(state.clone(), optional_auth_middleware);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health::health_check))
        .route("/media/*key", get(media::serve_media))
        // Auth
        .route("/api/auth/token/login/", post(auth::login))
        .route(
            "/api/auth/token/logout/",
            post(auth::logout).layer(required()),
        )
        // Users
        .route(
            "/api/users/",
            get(users::list_users)
                .layer(optional())
                .post(auth::register),
        )
        .route("/api/users/me/", get(users::me).layer(required()))
        .route(
            "/api/users/set_password/",
            post(users::set_password).layer(required()),
        )
        .route(
            "/api/users/subscriptions/",
            get(users::subscriptions).layer(required()),
        )
        .route("/api/users/:id/", get(users::get_user).layer(optional()))
        .route(
            "/api/users/:id/subscribe/",
            post(users::subscribe)
                .delete(users::unsubscribe)
                .layer(required()),
        )
        // Catalog. Write methods get the required layer before GET joins,
        // so anonymous bodies are never read.
        .route(
            "/api/tags/",
            post(tags::create_tag)
                .layer(required())
                .get(tags::list_tags)
                .layer(optional()),
        )
        .route("/api/tags/:id/", get(tags::get_tag).layer(optional()))
        .route(
            "/api/ingredients/",
            get(ingredients::list_ingredients).layer(optional()),
        )
        .route(
            "/api/ingredients/:id/",
            get(ingredients::get_ingredient).layer(optional()),
        )
        // Recipes
        .route(
            "/api/recipes/",
            post(recipes::create_recipe)
                .layer(required())
                .get(recipes::list_recipes)
                .layer(optional()),
        )
        .route(
            "/api/recipes/download_shopping_cart/",
            get(recipes::download_shopping_cart).layer(required()),
        )
        .route(
            "/api/recipes/:id/",
            patch(recipes::update_recipe)
                .delete(recipes::delete_recipe)
                .layer(required())
                .get(recipes::get_recipe)
                .layer(optional()),
        )
        .route(
            "/api/recipes/:id/favorite/",
            post(recipes::add_favorite)
                .delete(recipes::remove_favorite)
                .layer(required()),
        )
        .route(
            "/api/recipes/:id/shopping_cart/",
            post(recipes::add_to_cart)
                .delete(recipes::remove_from_cart)
                .layer(required()),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config))
        // Base64 inflates images by a third; leave room for the other fields
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_image_size * 2,
        ))
        .with_state(state)
}
