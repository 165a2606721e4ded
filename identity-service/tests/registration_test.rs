//! Registration and email-confirmation tests.

mod common;

use axum::http::StatusCode;
use common::*;
use identity_service::models::VerificationToken;
use identity_service::utils::{generate_token, hash_token};

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn register_then_verify_then_login() {
    let pool = create_test_pool().await.unwrap();
    cleanup_test_data(&pool).await.unwrap();
    let state = create_test_state(pool).await.unwrap();
    let app = identity_service::build_router(state.clone()).await.unwrap();

    let response = post_json(
        &app,
        "/auth/register",
        serde_json::json!({
            "email": "gina@co.com",
            "password": "password-123",
            "full_name": "Gina Doe"
        }),
    )
    .await;
    let body = assert_status(response, StatusCode::CREATED).await;
    let user_id: uuid::Uuid = body["user_id"].as_str().unwrap().parse().unwrap();

    // Unverified: transport-level success is still not a session
    let response = post_json(
        &app,
        "/auth/login",
        serde_json::json!({ "email": "gina@co.com", "password": "password-123" }),
    )
    .await;
    assert_status(response, StatusCode::FORBIDDEN).await;

    // Confirm via a seeded verification token (the emailed one is mocked away)
    let raw = generate_token();
    let verification = VerificationToken::new(user_id, hash_token(&raw), 24);
    state.db.insert_verification_token(&verification).await.unwrap();

    let response = get_request(&app, &format!("/auth/verify?token={}", raw)).await;
    assert_status(response, StatusCode::OK).await;

    let response = post_json(
        &app,
        "/auth/login",
        serde_json::json!({ "email": "gina@co.com", "password": "password-123" }),
    )
    .await;
    let body = assert_status(response, StatusCode::OK).await;
    assert_eq!(body["email_confirmed"], true);
    assert_eq!(body["full_name"], "Gina Doe");
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn duplicate_registration_conflicts() {
    let pool = create_test_pool().await.unwrap();
    cleanup_test_data(&pool).await.unwrap();
    let state = create_test_state(pool).await.unwrap();
    let app = identity_service::build_router(state.clone()).await.unwrap();

    seed_account(&state, "henry@co.com", "password-123", false)
        .await
        .unwrap();

    let response = post_json(
        &app,
        "/auth/register",
        serde_json::json!({ "email": "henry@co.com", "password": "password-456" }),
    )
    .await;
    assert_status(response, StatusCode::CONFLICT).await;
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn expired_verification_token_is_rejected() {
    let pool = create_test_pool().await.unwrap();
    cleanup_test_data(&pool).await.unwrap();
    let state = create_test_state(pool).await.unwrap();
    let app = identity_service::build_router(state.clone()).await.unwrap();

    let account = seed_account(&state, "iris@co.com", "password-123", false)
        .await
        .unwrap();

    let raw = generate_token();
    let verification = VerificationToken::new(account.user_id, hash_token(&raw), -1);
    state.db.insert_verification_token(&verification).await.unwrap();

    let response = get_request(&app, &format!("/auth/verify?token={}", raw)).await;
    assert_status(response, StatusCode::BAD_REQUEST).await;
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn resend_does_not_leak_account_existence() {
    let pool = create_test_pool().await.unwrap();
    cleanup_test_data(&pool).await.unwrap();
    let state = create_test_state(pool).await.unwrap();
    let app = identity_service::build_router(state.clone()).await.unwrap();

    seed_account(&state, "jane@co.com", "password-123", false)
        .await
        .unwrap();

    let known = post_json(
        &app,
        "/auth/verify/resend",
        serde_json::json!({ "email": "jane@co.com" }),
    )
    .await;
    let known_body = assert_status(known, StatusCode::OK).await;

    let unknown = post_json(
        &app,
        "/auth/verify/resend",
        serde_json::json!({ "email": "nobody@co.com" }),
    )
    .await;
    let unknown_body = assert_status(unknown, StatusCode::OK).await;

    assert_eq!(known_body, unknown_body);
}
