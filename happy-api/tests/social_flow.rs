mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::unique_email;

#[tokio::test]
async fn like_notifies_owner_once() {
    let Some(app) = common::spawn() else {
        eprintln!("skipping: {} not set", common::DATABASE_URL_VAR);
        return;
    };
    let (_, admin) = app.admin().await;
    let (_, alice) = app.register(&unique_email("alice"), "Alice").await;
    let (_, bob) = app.register(&unique_email("bob"), "Bob").await;
    let restaurant_id = app.create_restaurant(&admin, "Pho Thin").await;
    let review_id = app.create_review(&alice, restaurant_id, 5).await;
    app.call(
        Method::PUT,
        &format!("/api/admin/reviews/{review_id}/status"),
        Some(&admin),
        Some(json!({ "status": "approved" })),
    )
    .await;

    let like_uri = format!("/api/reviews/{review_id}/like");
    let (status, body) = app.call(Method::POST, &like_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["like_count"], 1);

    // The like flag follows the viewer on the restaurant detail and the review itself
    let detail_uri = format!("/api/restaurants/{restaurant_id}");
    let (_, body) = app.call(Method::GET, &detail_uri, Some(&bob), None).await;
    assert_eq!(body["data"]["reviews"][0]["liked_by_viewer"], true);
    assert_eq!(body["data"]["reviews"][0]["like_count"], 1);
    let (_, body) = app.call(Method::GET, &detail_uri, None, None).await;
    assert_eq!(body["data"]["reviews"][0]["liked_by_viewer"], false);
    assert_eq!(body["data"]["reviews"][0]["like_count"], 1);

    let review_uri = format!("/api/reviews/{review_id}");
    let (_, body) = app.call(Method::GET, &review_uri, Some(&bob), None).await;
    assert_eq!(body["data"]["liked_by_viewer"], true);
    let (_, body) = app.call(Method::GET, &review_uri, Some(&alice), None).await;
    assert_eq!(body["data"]["liked_by_viewer"], false);
    assert_eq!(body["data"]["like_count"], 1);

    let (status, body) = app.call(Method::POST, &like_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "E3002");

    // Self-likes count but notify nobody
    let (status, body) = app.call(Method::POST, &like_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["like_count"], 2);

    let (_, body) = app.call(Method::GET, "/api/notifications", Some(&alice), None).await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["type"], "like_review");
    assert_eq!(items[0]["is_read"], false);
    assert_eq!(items[0]["reference_id"], review_id.to_string());
    assert_eq!(items[0]["restaurant"]["name"], "Pho Thin");
    let notification_id = items[0]["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .call(Method::GET, "/api/notifications/unread-count", Some(&alice), None)
        .await;
    assert_eq!(body["data"]["count"], 1);

    // Bob cannot read Alice's notification
    let read_uri = format!("/api/notifications/{notification_id}/read");
    let (status, _) = app.call(Method::PUT, &read_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.call(Method::PUT, &read_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_read"], true);

    let (status, body) = app
        .call(Method::PUT, "/api/notifications/read-all", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updated"], 0);

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/reviews/{review_id}/unlike"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["like_count"], 1);

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/reviews/{review_id}/unlike"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "E3004");
}

#[tokio::test]
async fn read_all_clears_unread() {
    let Some(app) = common::spawn() else {
        return;
    };
    let (_, admin) = app.admin().await;
    let (_, alice) = app.register(&unique_email("alice"), "Alice").await;
    let restaurant_id = app.create_restaurant(&admin, "Bun Bo Hue").await;

    for _ in 0..2 {
        let review_id = app.create_review(&alice, restaurant_id, 4).await;
        app.call(
            Method::PUT,
            &format!("/api/admin/reviews/{review_id}/status"),
            Some(&admin),
            Some(json!({ "status": "approved" })),
        )
        .await;
        let (status, _) = app
            .call(Method::POST, &format!("/api/reviews/{review_id}/like"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = app
        .call(Method::GET, "/api/notifications?unread_only=true", Some(&alice), None)
        .await;
    assert_eq!(body["data"]["total"], 2);

    let (_, body) = app
        .call(Method::PUT, "/api/notifications/read-all", Some(&alice), None)
        .await;
    assert_eq!(body["data"]["updated"], 2);

    let (_, body) = app
        .call(Method::GET, "/api/notifications/unread-count", Some(&alice), None)
        .await;
    assert_eq!(body["data"]["count"], 0);
}

#[tokio::test]
async fn favorites_add_check_remove() {
    let Some(app) = common::spawn() else {
        return;
    };
    let (_, admin) = app.admin().await;
    let (_, alice) = app.register(&unique_email("alice"), "Alice").await;
    let restaurant_id = app.create_restaurant(&admin, "Banh Xeo 46A").await;
    let body = json!({ "restaurant_id": restaurant_id });

    let (status, _) = app
        .call(Method::POST, "/api/favorites", Some(&alice), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, resp) = app
        .call(Method::POST, "/api/favorites", Some(&alice), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error"]["code"], "E4001");

    let check_uri = format!("/api/favorites/check/{restaurant_id}");
    let (_, resp) = app.call(Method::GET, &check_uri, Some(&alice), None).await;
    assert_eq!(resp["data"]["is_favorite"], true);

    let (_, resp) = app.call(Method::GET, "/api/favorites", Some(&alice), None).await;
    assert_eq!(resp["data"]["total"], 1);
    assert_eq!(resp["data"]["items"][0]["restaurant"]["name"], "Banh Xeo 46A");

    let remove_uri = format!("/api/favorites/{restaurant_id}");
    let (status, _) = app.call(Method::DELETE, &remove_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, resp) = app.call(Method::DELETE, &remove_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(resp["error"]["code"], "E4002");

    let (_, resp) = app.call(Method::GET, &check_uri, Some(&alice), None).await;
    assert_eq!(resp["data"]["is_favorite"], false);
}
