mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::setup;
use recipe_backend::entities::{prelude::*, tokens};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::json;

#[tokio::test]
async fn test_register_login_logout_cycle() {
    let t = setup().await;
    let (id, token) = t.user("alice").await;

    let (status, me) = t.call("GET", "/api/users/me/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], id);
    assert_eq!(me["username"], "alice");
    assert_eq!(me["email"], "alice@example.com");
    assert!(me.get("password").is_none());
    assert!(me.get("password_hash").is_none());

    let (status, _) = t
        .call("POST", "/api/auth/token/logout/", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Revoked tokens stop working everywhere
    let (status, _) = t.call("GET", "/api/users/me/", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t.call("GET", "/api/tags/", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_bad_fields() {
    let t = setup().await;
    t.user("alice").await;

    let (status, body) = t
        .call(
            "POST",
            "/api/users/",
            None,
            Some(json!({
                "email": "alice@example.com",
                "username": "alice",
                "first_name": "A",
                "last_name": "B",
                "password": "pw",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["username"],
        json!(["A user with that username already exists."])
    );
    assert_eq!(
        body["email"],
        json!(["A user with that email already exists."])
    );

    let (status, body) = t
        .call(
            "POST",
            "/api/users/",
            None,
            Some(json!({
                "email": "not-an-email",
                "username": "bad name",
                "first_name": "A",
                "last_name": "B",
                "password": "pw",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("email").is_some());
    assert!(body.get("username").is_some());
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let t = setup().await;
    t.user("alice").await;

    let (status, body) = t
        .call(
            "POST",
            "/api/auth/token/login/",
            None,
            Some(json!({"email": "alice@example.com", "password": "wrong"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["non_field_errors"],
        json!(["Unable to log in with provided credentials."])
    );
}

#[tokio::test]
async fn test_set_password() {
    let t = setup().await;
    let (_, token) = t.user("alice").await;

    let (status, body) = t
        .call(
            "POST",
            "/api/users/set_password/",
            Some(&token),
            Some(json!({"current_password": "nope", "new_password": "N3w-secret"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["current_password"], json!(["Invalid password."]));

    let (status, _) = t
        .call(
            "POST",
            "/api/users/set_password/",
            Some(&token),
            Some(json!({"current_password": "Sup3r-secret", "new_password": "N3w-secret"})),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t
        .call(
            "POST",
            "/api/auth/token/login/",
            None,
            Some(json!({"email": "alice@example.com", "password": "N3w-secret"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_user_listing_and_profile() {
    let t = setup().await;
    let (alice_id, _) = t.user("alice").await;
    t.user("bob").await;

    let (status, page) = t.call("GET", "/api/users/?limit=1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 2);
    assert_eq!(page["results"][0]["username"], "alice");
    assert_eq!(page["next"], "/api/users/?page=2&limit=1");

    let (status, user) = t
        .call("GET", &format!("/api/users/{}/", alice_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["is_subscribed"], false);

    let (status, _) = t.call("GET", "/api/users/999/", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.call("GET", "/api/users/me/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tags_and_ingredients() {
    let t = setup().await;
    let (_, token) = t.user("alice").await;
    t.ingredient("Sugar", "g").await;
    t.ingredient("sugar syrup", "ml").await;
    t.ingredient("salt", "g").await;

    let (status, items) = t
        .call("GET", "/api/ingredients/?name=SUG", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Sugar", "sugar syrup"]);

    let (_, all) = t.call("GET", "/api/ingredients/", None, None).await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let tag = json!({"name": "Breakfast", "color": "#E26C2D", "slug": "breakfast"});
    let (status, _) = t.call("POST", "/api/tags/", None, Some(tag.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, created) = t
        .call("POST", "/api/tags/", Some(&token), Some(tag.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["slug"], "breakfast");

    let (status, body) = t.call("POST", "/api/tags/", Some(&token), Some(tag)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["slug"], json!(["Tag with this slug already exists."]));

    let (status, body) = t
        .call(
            "POST",
            "/api/tags/",
            Some(&token),
            Some(json!({"name": "Odd", "color": "red", "slug": "odd slug"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["color"], json!(["Color value is invalid"]));
    assert!(body.get("slug").is_some());

    let (status, tags) = t.call("GET", "/api/tags/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tags.as_array().unwrap().len(), 1);

    let (status, fetched) = t
        .call("GET", &format!("/api/tags/{}/", created["id"]), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["color"], "#E26C2D");
}

#[tokio::test]
async fn test_health_and_openapi() {
    let t = setup().await;

    let (status, body) = t.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");

    let (status, doc) = t.call("GET", "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"].get("/api/recipes/").is_some());
    assert!(doc["paths"].get("/api/recipes/download_shopping_cart/").is_some());
}

#[tokio::test]
async fn test_ingredient_prefix_search_folds_non_ascii_case() {
    let t = setup().await;
    let flour = t.ingredient("Мука", "г").await;
    t.ingredient("Молоко", "мл").await;

    for prefix in ["Му", "му", "МУ"] {
        let (status, items) = t
            .call("GET", &format!("/api/ingredients/?name={}", urlencode(prefix)), None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(items, json!([{"id": flour, "name": "Мука", "measurement_unit": "г"}]), "{}", prefix);
    }
}

fn urlencode(value: &str) -> String {
    serde_urlencoded::to_string([("v", value)])
        .unwrap()
        .trim_start_matches("v=")
        .to_string()
}

#[tokio::test]
async fn test_login_drops_expired_tokens() {
    let t = setup().await;
    let (id, _) = t.user("alice").await;
    let id = id as i32;

    tokens::ActiveModel {
        id: Set("stale".to_string()),
        user_id: Set(id),
        expires_at: Set(Utc::now() - Duration::hours(1)),
    }
    .insert(&t.db)
    .await
    .unwrap();

    let (status, _) = t
        .call(
            "POST",
            "/api/auth/token/login/",
            None,
            Some(json!({"email": "alice@example.com", "password": "Sup3r-secret"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert!(Tokens::find_by_id("stale".to_string()).one(&t.db).await.unwrap().is_none());
    // Both live tokens survive
    let live = Tokens::find()
        .filter(tokens::Column::UserId.eq(id))
        .count(&t.db)
        .await
        .unwrap();
    assert_eq!(live, 2);
}

#[tokio::test]
async fn test_media_directory_is_not_found() {
    let t = setup().await;
    std::fs::create_dir_all(t.media.path().join("recipes").join("images")).unwrap();

    let (status, _) = t.call("GET", "/media/recipes", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = t.call("GET", "/media/recipes/images", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
