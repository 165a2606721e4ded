//! Organization admin and cache-invalidation tests.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use identity_service::models::MemberRole;
use tower::util::ServiceExt;

async fn patch_admin(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> axum::http::Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(uri)
                .header("Content-Type", "application/json")
                .header("X-Admin-Api-Key", TEST_ADMIN_API_KEY)
                .extension(axum::extract::ConnectInfo(std::net::SocketAddr::from((
                    [127, 0, 0, 1],
                    8080,
                ))))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn admin_key_gates_organization_creation() {
    let pool = create_test_pool().await.unwrap();
    cleanup_test_data(&pool).await.unwrap();
    let state = create_test_state(pool).await.unwrap();
    let app = identity_service::build_router(state.clone()).await.unwrap();

    // Without the key
    let response = post_json(
        &app,
        "/organizations",
        serde_json::json!({ "org_name": "Acme Corp" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // With the key
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/organizations")
                .header("Content-Type", "application/json")
                .header("X-Admin-Api-Key", TEST_ADMIN_API_KEY)
                .extension(axum::extract::ConnectInfo(std::net::SocketAddr::from((
                    [127, 0, 0, 1],
                    8080,
                ))))
                .body(Body::from(
                    serde_json::json!({ "org_name": "Acme Corp" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = assert_status(response, StatusCode::CREATED).await;
    assert_eq!(body["org_name"], "Acme Corp");
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn renaming_invalidates_the_cached_display_name() {
    let pool = create_test_pool().await.unwrap();
    cleanup_test_data(&pool).await.unwrap();
    let state = create_test_state(pool).await.unwrap();
    let app = identity_service::build_router(state.clone()).await.unwrap();

    let org = seed_organization(&state, "Acme Corp").await.unwrap();
    let (_invitation, token) = seed_invitation(
        &state,
        org.organization_id,
        "alice@co.com",
        MemberRole::Employee,
        1,
    )
    .await
    .unwrap();

    // Validation warms the cache with the old name
    let response = get_request(&app, &format!("/invitations/{}", token)).await;
    let body = assert_status(response, StatusCode::OK).await;
    assert_eq!(body["organization_name"], "Acme Corp");

    let response = patch_admin(
        &app,
        &format!("/organizations/{}", org.organization_id),
        serde_json::json!({ "org_name": "Acme Inc" }),
    )
    .await;
    assert_status(response, StatusCode::OK).await;

    // The stale entry must be gone after the mutation
    let response = get_request(&app, &format!("/invitations/{}", token)).await;
    let body = assert_status(response, StatusCode::OK).await;
    assert_eq!(body["organization_name"], "Acme Inc");
}
