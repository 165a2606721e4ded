//! Invitation validation and acceptance tests: expiry boundary, email
//! mismatch precedence, and at-most-once acceptance.

mod common;

use axum::http::StatusCode;
use common::*;
use identity_service::models::MemberRole;
use identity_service::services::InvitationConsumption;
use identity_service::utils::hash_token;

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn validate_returns_org_and_role_for_a_pending_token() {
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

    let response = get_request(
        &app,
        &format!("/invitations/{}?email=alice@co.com", token),
    )
    .await;
    let body = assert_status(response, StatusCode::OK).await;

    assert_eq!(body["valid"], true);
    assert_eq!(body["organization_id"], org.organization_id.to_string());
    assert_eq!(body["organization_name"], "Acme Corp");
    assert_eq!(body["role"], "employee");
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn validate_reports_expired_past_the_boundary() {
    let pool = create_test_pool().await.unwrap();
    cleanup_test_data(&pool).await.unwrap();
    let state = create_test_state(pool).await.unwrap();
    let app = identity_service::build_router(state.clone()).await.unwrap();

    let org = seed_organization(&state, "Acme Corp").await.unwrap();
    // Negative expiry puts expires_utc one hour in the past
    let (_invitation, token) = seed_invitation(
        &state,
        org.organization_id,
        "alice@co.com",
        MemberRole::Employee,
        -1,
    )
    .await
    .unwrap();

    let response = get_request(&app, &format!("/invitations/{}", token)).await;
    let body = assert_status(response, StatusCode::OK).await;

    assert_eq!(body["valid"], false);
    assert_eq!(body["reason"], "expired");
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn email_mismatch_wins_over_expiry() {
    let pool = create_test_pool().await.unwrap();
    cleanup_test_data(&pool).await.unwrap();
    let state = create_test_state(pool).await.unwrap();
    let app = identity_service::build_router(state.clone()).await.unwrap();

    let org = seed_organization(&state, "Acme Corp").await.unwrap();
    let (_invitation, token) = seed_invitation(
        &state,
        org.organization_id,
        "a@x.com",
        MemberRole::Employee,
        -1,
    )
    .await
    .unwrap();

    let response = get_request(&app, &format!("/invitations/{}?email=b@x.com", token)).await;
    let body = assert_status(response, StatusCode::OK).await;

    assert_eq!(body["valid"], false);
    assert_eq!(body["reason"], "email mismatch");
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn unknown_token_reports_not_found() {
    let pool = create_test_pool().await.unwrap();
    cleanup_test_data(&pool).await.unwrap();
    let state = create_test_state(pool).await.unwrap();
    let app = identity_service::build_router(state.clone()).await.unwrap();

    let response = get_request(&app, "/invitations/deadbeef").await;
    let body = assert_status(response, StatusCode::OK).await;

    assert_eq!(body["valid"], false);
    assert_eq!(body["reason"], "token not found");
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn concurrent_acceptance_is_at_most_once() {
    let pool = create_test_pool().await.unwrap();
    cleanup_test_data(&pool).await.unwrap();
    let state = create_test_state(pool).await.unwrap();

    let org = seed_organization(&state, "Acme Corp").await.unwrap();
    let (_invitation, token) = seed_invitation(
        &state,
        org.organization_id,
        "shared@co.com",
        MemberRole::Employee,
        1,
    )
    .await
    .unwrap();

    // The race: two browser tabs of the invited user accepting at once
    let account = seed_account(&state, "shared@co.com", "password-one", true)
        .await
        .unwrap();
    state
        .db
        .insert_profile(&identity_service::models::Profile::new(
            account.user_id,
            account.email.clone(),
            None,
            true,
        ))
        .await
        .unwrap();

    let token_hash = hash_token(&token);

    let (first, second) = tokio::join!(
        state
            .db
            .consume_invitation(&token_hash, account.user_id, "shared@co.com"),
        state
            .db
            .consume_invitation(&token_hash, account.user_id, "shared@co.com"),
    );

    let results = [first.unwrap(), second.unwrap()];

    let winners = results
        .iter()
        .filter(|c| matches!(c, InvitationConsumption::Accepted { .. }))
        .count();
    let losers = results
        .iter()
        .filter(|c| matches!(c, InvitationConsumption::Rejected))
        .count();

    assert_eq!(winners, 1, "exactly one concurrent accept may win: {results:?}");
    assert_eq!(losers, 1, "the losing accept must be rejected: {results:?}");
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn only_inviting_roles_may_create_invitations() {
    let pool = create_test_pool().await.unwrap();
    cleanup_test_data(&pool).await.unwrap();
    let state = create_test_state(pool).await.unwrap();
    let app = identity_service::build_router(state.clone()).await.unwrap();

    let org = seed_organization(&state, "Acme Corp").await.unwrap();

    // A manager inside the organization
    let manager = seed_account(&state, "mia@co.com", "password-123", true)
        .await
        .unwrap();
    let mut profile = identity_service::models::Profile::new(
        manager.user_id,
        manager.email.clone(),
        None,
        true,
    );
    profile.organization_id = Some(org.organization_id);
    profile.role_code = Some("manager".to_string());
    state.db.insert_profile(&profile).await.unwrap();

    let response = post_json(
        &app,
        "/auth/login",
        serde_json::json!({ "email": "mia@co.com", "password": "password-123" }),
    )
    .await;
    let body = assert_status(response, StatusCode::OK).await;
    let manager_token = body["tokens"]["access_token"].as_str().unwrap().to_string();

    let response = post_json_authed(
        &app,
        "/invitations",
        &manager_token,
        serde_json::json!({
            "organization_id": org.organization_id,
            "email": "newhire@co.com",
            "role": "employee"
        }),
    )
    .await;
    let body = assert_status(response, StatusCode::CREATED).await;
    assert!(body["invite_url"].as_str().unwrap().contains("/join?token="));

    // An employee of the same organization may not invite
    let employee = seed_account(&state, "eve@co.com", "password-123", true)
        .await
        .unwrap();
    let mut profile = identity_service::models::Profile::new(
        employee.user_id,
        employee.email.clone(),
        None,
        true,
    );
    profile.organization_id = Some(org.organization_id);
    profile.role_code = Some("employee".to_string());
    state.db.insert_profile(&profile).await.unwrap();

    let response = post_json(
        &app,
        "/auth/login",
        serde_json::json!({ "email": "eve@co.com", "password": "password-123" }),
    )
    .await;
    let body = assert_status(response, StatusCode::OK).await;
    let employee_token = body["tokens"]["access_token"].as_str().unwrap().to_string();

    let response = post_json_authed(
        &app,
        "/invitations",
        &employee_token,
        serde_json::json!({
            "organization_id": org.organization_id,
            "email": "friend@co.com",
            "role": "employee"
        }),
    )
    .await;
    assert_status(response, StatusCode::FORBIDDEN).await;
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn second_acceptance_reports_already_used() {
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

    seed_account(&state, "alice@co.com", "password-123", true)
        .await
        .unwrap();

    // First join consumes the token
    let response = post_json(
        &app,
        "/auth/join",
        serde_json::json!({
            "token": token,
            "email": "alice@co.com",
            "password": "password-123"
        }),
    )
    .await;
    let body = assert_status(response, StatusCode::OK).await;
    assert_eq!(body["organization_id"], org.organization_id.to_string());
    assert_eq!(body["next"], "employee_welcome");
    let access_token = body["tokens"]["access_token"].as_str().unwrap().to_string();

    // Accepting the same token again must fail with "already used"
    let response = post_json_authed(
        &app,
        &format!("/invitations/{}/accept", token),
        &access_token,
        serde_json::json!({}),
    )
    .await;
    let body = assert_status(response, StatusCode::OK).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "already used");
}
