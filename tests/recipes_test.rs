mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{PNG_DATA_URI, setup};
use recipe_backend::entities::{prelude::*, recipe_ingredients};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

#[tokio::test]
async fn test_create_recipe_persists_every_ingredient() {
    let t = setup().await;
    let (author_id, token) = t.user("chef").await;
    let flour = t.ingredient("flour", "g").await;
    let milk = t.ingredient("milk", "ml").await;
    let breakfast = t.tag("breakfast").await;

    let body = t
        .recipe(
            &token,
            "Pancakes",
            json!([{"id": flour, "amount": 200}, {"id": milk, "amount": "300"}]),
            json!([breakfast]),
        )
        .await;

    assert_eq!(body["name"], "Pancakes");
    assert_eq!(body["author"]["id"], author_id);
    assert_eq!(body["author"]["is_subscribed"], false);
    assert_eq!(body["is_favorited"], false);
    assert_eq!(body["is_in_shopping_cart"], false);
    assert_eq!(body["tags"][0]["slug"], "breakfast");
    assert_eq!(body["ingredients"].as_array().unwrap().len(), 2);
    assert_eq!(body["ingredients"][1]["id"], milk);
    assert_eq!(body["ingredients"][1]["amount"], 300);
    assert_eq!(body["ingredients"][1]["measurement_unit"], "ml");

    let recipe_id = body["id"].as_i64().unwrap() as i32;
    let rows = RecipeIngredients::find()
        .filter(recipe_ingredients::Column::RecipeId.eq(recipe_id))
        .count(&t.db)
        .await
        .unwrap();
    assert_eq!(rows, 2);

    // The image is stored and served back
    let image_url = body["image"].as_str().unwrap();
    assert!(image_url.starts_with("/media/recipes/images/"));
    assert!(image_url.ends_with(".png"));
    assert!(t.media_path(image_url).exists());

    let response = t
        .send(Request::get(image_url).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
}

#[tokio::test]
async fn test_create_recipe_reports_all_errors_together() {
    let t = setup().await;
    let (_, token) = t.user("chef").await;
    let flour = t.ingredient("flour", "g").await;

    let (status, body) = t
        .call(
            "POST",
            "/api/recipes/",
            Some(&token),
            Some(json!({
                "ingredients": [
                    {"id": flour, "amount": 0},
                    {"id": 999, "amount": 5},
                    {"id": flour, "amount": "abc"},
                ],
                "tags": [],
                "image": PNG_DATA_URI,
                "text": "  ",
                "cooking_time": 0,
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["name"], json!(["This field is required."]));
    assert_eq!(body["text"], json!(["This field may not be blank."]));
    assert_eq!(
        body["cooking_time"],
        json!(["Ensure this value is greater than or equal to 1."])
    );
    assert_eq!(body["tags"], json!(["Missing field or empty value."]));

    let ingredient_errors = body["ingredients"].as_array().unwrap();
    assert!(ingredient_errors.contains(&json!("Field 'amount' must be greater than 0.")));
    assert!(ingredient_errors.contains(&json!("Ingredient with id = 999 not found.")));
    assert!(ingredient_errors.contains(&json!("Field 'amount' must be a number.")));

    assert_eq!(Recipes::find().count(&t.db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_create_recipe_rejects_non_image() {
    let t = setup().await;
    let (_, token) = t.user("chef").await;
    let flour = t.ingredient("flour", "g").await;
    let tag = t.tag("lunch").await;

    let (status, body) = t
        .call(
            "POST",
            "/api/recipes/",
            Some(&token),
            Some(json!({
                "ingredients": [{"id": flour, "amount": 1}],
                "tags": [tag],
                "image": "data:image/png;base64,aGVsbG8gd29ybGQ=",
                "name": "Not an image",
                "text": "text",
                "cooking_time": 5,
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["image"][0]
        .as_str()
        .unwrap()
        .starts_with("Upload a valid image."));
}

#[tokio::test]
async fn test_multipart_create() {
    let t = setup().await;
    let (_, token) = t.user("chef").await;
    let flour = t.ingredient("flour", "g").await;
    let tag = t.tag("lunch").await;

    let png = base64_png();
    let boundary = "recipe-boundary";
    let mut body = Vec::new();
    for (name, value) in [
        ("name", "Bread".to_string()),
        ("text", "Knead.".to_string()),
        ("cooking_time", "45".to_string()),
        ("ingredients", json!([{"id": flour, "amount": 500}]).to_string()),
        ("tags", json!([tag]).to_string()),
    ] {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"bread.png\"\r\nContent-Type: image/png\r\n\r\n",
            boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(&png);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let response = t
        .send(
            Request::post("/api/recipes/")
                .header(header::AUTHORIZATION, format!("Token {}", token))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(Recipes::find().count(&t.db).await.unwrap(), 1);
}

fn base64_png() -> Vec<u8> {
    use base64::Engine;
    let payload = PNG_DATA_URI.split_once(',').unwrap().1;
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .unwrap()
}

#[tokio::test]
async fn test_update_replaces_ingredients_and_keeps_other_fields() {
    let t = setup().await;
    let (_, token) = t.user("chef").await;
    let flour = t.ingredient("flour", "g").await;
    let milk = t.ingredient("milk", "ml").await;
    let eggs = t.ingredient("eggs", "pcs").await;
    let tag = t.tag("breakfast").await;

    let created = t
        .recipe(
            &token,
            "Pancakes",
            json!([{"id": flour, "amount": 200}, {"id": milk, "amount": 300}]),
            json!([tag]),
        )
        .await;
    let id = created["id"].as_i64().unwrap();
    let old_image = created["image"].as_str().unwrap().to_string();

    let (status, body) = t
        .call(
            "PATCH",
            &format!("/api/recipes/{}/", id),
            Some(&token),
            Some(json!({"ingredients": [{"id": eggs, "amount": 3}]})),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["name"], "Pancakes");
    assert_eq!(body["cooking_time"], 30);
    assert_eq!(body["tags"].as_array().unwrap().len(), 1);
    assert_eq!(body["ingredients"], json!([{"id": eggs, "name": "eggs", "measurement_unit": "pcs", "amount": 3}]));
    assert_eq!(body["image"], old_image);

    let rows = RecipeIngredients::find()
        .filter(recipe_ingredients::Column::RecipeId.eq(id as i32))
        .count(&t.db)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    // A new image replaces the stored file
    let (status, body) = t
        .call(
            "PATCH",
            &format!("/api/recipes/{}/", id),
            Some(&token),
            Some(json!({"image": PNG_DATA_URI, "name": "Crepes"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Crepes");
    assert_ne!(body["image"], old_image);
    assert!(!t.media_path(&old_image).exists());
    assert!(t.media_path(body["image"].as_str().unwrap()).exists());
}

#[tokio::test]
async fn test_update_with_empty_tags_is_rejected() {
    let t = setup().await;
    let (_, token) = t.user("chef").await;
    let flour = t.ingredient("flour", "g").await;
    let tag = t.tag("breakfast").await;
    let created = t
        .recipe(&token, "Toast", json!([{"id": flour, "amount": 1}]), json!([tag]))
        .await;

    let (status, body) = t
        .call(
            "PATCH",
            &format!("/api/recipes/{}/", created["id"]),
            Some(&token),
            Some(json!({"tags": []})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["tags"], json!(["Missing field or empty value."]));
}

#[tokio::test]
async fn test_only_author_may_modify() {
    let t = setup().await;
    let (_, author) = t.user("author").await;
    let (_, other) = t.user("other").await;
    let flour = t.ingredient("flour", "g").await;
    let tag = t.tag("dinner").await;
    let created = t
        .recipe(&author, "Stew", json!([{"id": flour, "amount": 1}]), json!([tag]))
        .await;
    let uri = format!("/api/recipes/{}/", created["id"]);

    // Forbidden is decided before the payload is validated
    let (status, _) = t
        .call("PATCH", &uri, Some(&other), Some(json!({"cooking_time": 0})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.call("DELETE", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .call("PATCH", &uri, None, Some(json!({"name": "Mine now"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t
        .call("POST", "/api/recipes/", None, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t
        .call("PATCH", "/api/recipes/9999/", Some(&author), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_auth_is_checked_before_the_body_is_read() {
    let t = setup().await;
    let (_, author) = t.user("author").await;
    let (_, other) = t.user("other").await;
    let flour = t.ingredient("flour", "g").await;
    let tag = t.tag("dinner").await;
    let created = t
        .recipe(&author, "Stew", json!([{"id": flour, "amount": 1}]), json!([tag]))
        .await;
    let uri = format!("/api/recipes/{}/", created["id"]);

    let plain = |method: &str, uri: &str, token: Option<&str>| {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "text/plain");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from("not json")).unwrap()
    };

    for anonymous in ["/api/recipes/", "/api/tags/"] {
        let response = t.send(plain("POST", anonymous, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", anonymous);
    }
    let response = t.send(plain("PATCH", &uri, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A non-author never gets as far as a body error
    let response = t.send(plain("PATCH", &uri, Some(&other))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let (status, _) = t
        .call("PATCH", &uri, Some(&other), Some(json!([1, 2])))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The author still gets the body error
    let response = t.send(plain("PATCH", &uri, Some(&author))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Reads stay open to anonymous callers
    let (status, _) = t.call("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t.call("GET", "/api/recipes/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t.call("GET", "/api/tags/", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_cascades_and_removes_image() {
    let t = setup().await;
    let (_, token) = t.user("chef").await;
    let (_, fan) = t.user("fan").await;
    let flour = t.ingredient("flour", "g").await;
    let tag = t.tag("dinner").await;
    let created = t
        .recipe(&token, "Pie", json!([{"id": flour, "amount": 100}]), json!([tag]))
        .await;
    let id = created["id"].as_i64().unwrap();
    let image = created["image"].as_str().unwrap().to_string();

    let (status, _) = t
        .call("POST", &format!("/api/recipes/{}/favorite/", id), Some(&fan), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t
        .call("POST", &format!("/api/recipes/{}/shopping_cart/", id), Some(&fan), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .call("DELETE", &format!("/api/recipes/{}/", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(Recipes::find().count(&t.db).await.unwrap(), 0);
    assert_eq!(RecipeIngredients::find().count(&t.db).await.unwrap(), 0);
    assert_eq!(RecipeTags::find().count(&t.db).await.unwrap(), 0);
    assert_eq!(Favorites::find().count(&t.db).await.unwrap(), 0);
    assert_eq!(ShoppingCarts::find().count(&t.db).await.unwrap(), 0);
    assert!(!t.media_path(&image).exists());

    let (status, _) = t
        .call("GET", &format!("/api/recipes/{}/", id), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_filters_and_pagination() {
    let t = setup().await;
    let (alice_id, alice) = t.user("alice").await;
    let (_, bob) = t.user("bob").await;
    let flour = t.ingredient("flour", "g").await;
    let breakfast = t.tag("breakfast").await;
    let dinner = t.tag("dinner").await;
    let lunch = t.tag("lunch").await;

    let first = t
        .recipe(&alice, "Porridge", json!([{"id": flour, "amount": 1}]), json!([breakfast]))
        .await;
    t.recipe(&alice, "Roast", json!([{"id": flour, "amount": 1}]), json!([dinner]))
        .await;
    t.recipe(&bob, "Salad", json!([{"id": flour, "amount": 1}]), json!([lunch]))
        .await;

    // Newest first, two per page
    let (status, page) = t.call("GET", "/api/recipes/?limit=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 3);
    assert_eq!(page["results"][0]["name"], "Salad");
    assert_eq!(page["results"][1]["name"], "Roast");
    assert_eq!(page["next"], "/api/recipes/?page=2&limit=2");
    assert_eq!(page["previous"], json!(null));

    let (_, page) = t
        .call("GET", "/api/recipes/?tags=breakfast&tags=lunch", None, None)
        .await;
    let names: Vec<_> = page["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Salad", "Porridge"]);

    let (_, page) = t
        .call("GET", &format!("/api/recipes/?author={}", alice_id), None, None)
        .await;
    assert_eq!(page["count"], 2);

    t.call(
        "POST",
        &format!("/api/recipes/{}/favorite/", first["id"]),
        Some(&bob),
        None,
    )
    .await;
    let (_, page) = t
        .call("GET", "/api/recipes/?is_favorited=1", Some(&bob), None)
        .await;
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["name"], "Porridge");
    assert_eq!(page["results"][0]["is_favorited"], true);

    // Anonymous callers have no favorites
    let (status, page) = t
        .call("GET", "/api/recipes/?is_favorited=1", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 0);

    let (status, body) = t
        .call("GET", "/api/recipes/?author=someone", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["author"], json!(["Enter a number."]));
}

#[tokio::test]
async fn test_invalid_token_is_rejected_on_read_routes() {
    let t = setup().await;
    let (status, _) = t
        .call("GET", "/api/recipes/", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
