//! End-to-end tests for `POST /api/v1/ai/summarize` through the full router

mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use common::{expect_json, test_app};
use link_ai::chat::ChatMessage;
use link_ai::privacy::actions;
use serde_json::json;
use uuid::Uuid;

const SUMMARIZE: &str = "/api/v1/ai/summarize";
const CONVERSATION: &str = "11111111-1111-1111-1111-111111111111";

fn conversation() -> Uuid {
    Uuid::parse_str(CONVERSATION).unwrap()
}

#[tokio::test]
async fn test_summary_is_generated_then_served_from_cache() {
    let app = test_app();
    app.privacy.set_consent("user-alice", true, false).await;
    app.chat.seed_conversation(conversation(), 5);
    let token = app.token("user-alice");
    let body = json!({ "conversation_id": CONVERSATION, "limit": 5 });

    let first = expect_json(
        app.send(Method::POST, SUMMARIZE, Some(&token), Some(body.clone()))
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(first["cached_result"], false);
    assert_eq!(first["message_count"], 5);
    assert_eq!(first["tokens_used"], 120);
    assert_eq!(first["conversation_id"], CONVERSATION);
    assert_eq!(first["model"], "llama3.2:latest");

    let second = expect_json(
        app.send(Method::POST, SUMMARIZE, Some(&token), Some(body))
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(second["cached_result"], true);
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["summary"], first["summary"]);
    assert_eq!(second["message_count"], 5);

    assert_eq!(app.provider.call_count(), 1);
    assert_eq!(app.chat.call_count(), 1);

    let recorded: Vec<String> = app
        .privacy
        .audit_entries()
        .await
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        recorded,
        vec![
            actions::AI_SUMMARY_GENERATED.to_string(),
            actions::AI_SUMMARY_CACHE_HIT.to_string()
        ]
    );
}

#[tokio::test]
async fn test_generated_audit_entry_carries_details() {
    let app = test_app();
    app.privacy.set_consent("user-alice", true, true).await;
    app.chat.seed_conversation(conversation(), 3);
    let token = app.token("user-alice");

    let response = app
        .send(
            Method::POST,
            SUMMARIZE,
            Some(&token),
            Some(json!({ "conversation_id": CONVERSATION })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let entries = app.privacy.audit_entries().await;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.user_id, "user-alice");
    assert_eq!(entry.resource, format!("conversation:{}", CONVERSATION));
    assert_eq!(entry.details["message_count"], 3);
    assert_eq!(entry.details["tokens_used"], 120);
    assert_eq!(entry.details["anonymized"], true);
    assert_eq!(entry.details["model"], "llama3.2:latest");
    assert!(entry.details.get("processing_time_ms").is_some());

    assert!(app.provider.requests()[0].anonymize);
}

#[tokio::test]
async fn test_missing_consent_is_forbidden_before_any_collaborator() {
    let app = test_app();
    app.chat.seed_conversation(conversation(), 5);
    let token = app.token("user-bob");

    let body = expect_json(
        app.send(
            Method::POST,
            SUMMARIZE,
            Some(&token),
            Some(json!({ "conversation_id": CONVERSATION })),
        )
        .await,
        StatusCode::FORBIDDEN,
    )
    .await;
    assert_eq!(body["code"], "CONSENT_REQUIRED");
    assert_eq!(app.chat.call_count(), 0);
    assert_eq!(app.provider.call_count(), 0);
    assert!(app.cache.is_empty().await);
    assert!(app.privacy.audit_entries().await.is_empty());
}

#[tokio::test]
async fn test_revoked_consent_blocks_cached_summary() {
    let app = test_app();
    app.privacy.set_consent("user-alice", true, false).await;
    app.chat.seed_conversation(conversation(), 4);
    let token = app.token("user-alice");
    let body = json!({ "conversation_id": CONVERSATION });

    let response = app
        .send(Method::POST, SUMMARIZE, Some(&token), Some(body.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    app.privacy.set_consent("user-alice", false, false).await;
    let response = app
        .send(Method::POST, SUMMARIZE, Some(&token), Some(body))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_empty_conversation_is_not_found_without_ai_call() {
    let app = test_app();
    app.privacy.set_consent("user-alice", true, false).await;
    let token = app.token("user-alice");

    let body = expect_json(
        app.send(
            Method::POST,
            SUMMARIZE,
            Some(&token),
            Some(json!({ "conversation_id": Uuid::new_v4().to_string() })),
        )
        .await,
        StatusCode::NOT_FOUND,
    )
    .await;
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(app.chat.call_count(), 1);
    assert_eq!(app.provider.call_count(), 0);
}

#[tokio::test]
async fn test_invalid_bodies_are_validation_errors() {
    let app = test_app();
    app.privacy.set_consent("user-alice", true, false).await;
    let token = app.token("user-alice");

    for body in [
        json!({ "conversation_id": "not-a-uuid" }),
        json!({ "limit": 5 }),
        json!({ "conversation_id": CONVERSATION, "limit": "ten" }),
    ] {
        let response = app
            .send(Method::POST, SUMMARIZE, Some(&token), Some(body))
            .await;
        let json = expect_json(response, StatusCode::BAD_REQUEST).await;
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }
    assert_eq!(app.provider.call_count(), 0);
}

#[tokio::test]
async fn test_limit_is_clamped_to_maximum() {
    let app = test_app();
    app.privacy.set_consent("user-alice", true, false).await;
    app.chat.seed_conversation(conversation(), 150);
    let token = app.token("user-alice");

    let body = expect_json(
        app.send(
            Method::POST,
            SUMMARIZE,
            Some(&token),
            Some(json!({ "conversation_id": CONVERSATION, "limit": 1000 })),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["message_count"], 100);
}

#[tokio::test]
async fn test_ai_failure_is_ai_service_error_and_not_cached() {
    let app = test_app();
    app.privacy.set_consent("user-alice", true, false).await;
    app.chat.seed_conversation(conversation(), 5);
    app.provider.set_failing(true);
    let token = app.token("user-alice");

    let body = expect_json(
        app.send(
            Method::POST,
            SUMMARIZE,
            Some(&token),
            Some(json!({ "conversation_id": CONVERSATION })),
        )
        .await,
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .await;
    assert_eq!(body["code"], "AI_SERVICE_ERROR");
    assert!(app.cache.is_empty().await);
}

#[tokio::test]
async fn test_audit_failure_does_not_fail_request() {
    let app = test_app();
    app.privacy.set_consent("user-alice", true, false).await;
    app.privacy.set_audit_failing(true);
    app.chat.seed_conversation(conversation(), 2);
    let token = app.token("user-alice");

    let response = app
        .send(
            Method::POST,
            SUMMARIZE,
            Some(&token),
            Some(json!({ "conversation_id": CONVERSATION })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_anonymized_prompt_reaches_provider() {
    let app = test_app();
    app.privacy.set_consent("user-alice", true, true).await;
    app.chat.insert_messages(
        conversation(),
        vec![ChatMessage {
            id: Uuid::new_v4(),
            conversation_id: conversation(),
            sender_id: "user-carol".to_string(),
            sender_name: "Carol".to_string(),
            content: "Lunch at noon?".to_string(),
            created_at: Utc::now(),
        }],
    );
    let token = app.token("user-alice");

    let body = expect_json(
        app.send(
            Method::POST,
            SUMMARIZE,
            Some(&token),
            Some(json!({ "conversation_id": CONVERSATION })),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["metadata"]["anonymized"], true);
    assert!(app.provider.requests()[0].anonymize);
}
