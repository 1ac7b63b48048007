mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, TestApp};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
struct CaseInfo {
    id: Uuid,
}

#[derive(Deserialize)]
struct MessageInfo {
    sender_id: Uuid,
    #[serde(rename = "type")]
    message_type: String,
    content: String,
    sender: SenderSummary,
}

#[derive(Deserialize)]
struct SenderSummary {
    email: String,
}

async fn create_case(app: &TestApp, token: &str) -> Result<CaseInfo> {
    let response = app
        .post_json(
            "/api/cases",
            &json!({"title": "Noisy neighbours", "type": "other"}),
            Some(token),
        )
        .await?;
    anyhow::ensure!(response.status() == StatusCode::CREATED, "case creation failed");
    let body = body_to_vec(response.into_body()).await?;
    Ok(serde_json::from_slice(&body)?)
}

#[tokio::test]
async fn thread_reads_oldest_first() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let tenant_id = app
        .insert_user("tenant@example.com", "a-password-1", "tenant")
        .await?;
    app.insert_user("landlord@example.com", "a-password-1", "landlord")
        .await?;
    let tenant_token = app
        .login_token("tenant@example.com", "a-password-1")
        .await?;
    let landlord_token = app
        .login_token("landlord@example.com", "a-password-1")
        .await?;

    let case = create_case(&app, &tenant_token).await?;
    let response = app
        .post_json(
            &format!("/api/cases/{}/participants", case.id),
            &json!({"email": "landlord@example.com", "role": "landlord"}),
            Some(&tenant_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    for (token, content) in [
        (&tenant_token, "The heating is still broken."),
        (&landlord_token, "A plumber is booked for Friday."),
        (&tenant_token, "Thanks, I will be home."),
    ] {
        let response = app
            .post_json(
                &format!("/api/cases/{}/messages", case.id),
                &json!({"content": content}),
                Some(token),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .get(&format!("/api/cases/{}/messages", case.id), Some(&landlord_token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let messages: Vec<MessageInfo> = serde_json::from_slice(&body)?;
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].content, "The heating is still broken.");
    assert_eq!(messages[0].sender_id, tenant_id);
    assert_eq!(messages[0].sender.email, "tenant@example.com");
    assert_eq!(messages[1].sender.email, "landlord@example.com");
    assert_eq!(messages[2].content, "Thanks, I will be home.");
    assert!(messages.iter().all(|m| m.message_type == "text"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn blank_messages_are_rejected() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_user("tenant@example.com", "a-password-1", "tenant")
        .await?;
    let token = app
        .login_token("tenant@example.com", "a-password-1")
        .await?;
    let case = create_case(&app, &token).await?;

    let response = app
        .post_json(
            &format!("/api/cases/{}/messages", case.id),
            &json!({"content": "   "}),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn outsiders_cannot_read_or_post() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_user("tenant@example.com", "a-password-1", "tenant")
        .await?;
    app.insert_user("outsider@example.com", "a-password-1", "tenant")
        .await?;
    let tenant_token = app
        .login_token("tenant@example.com", "a-password-1")
        .await?;
    let outsider_token = app
        .login_token("outsider@example.com", "a-password-1")
        .await?;
    let case = create_case(&app, &tenant_token).await?;

    let response = app
        .get(&format!("/api/cases/{}/messages", case.id), Some(&outsider_token))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .post_json(
            &format!("/api/cases/{}/messages", case.id),
            &json!({"content": "let me in"}),
            Some(&outsider_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}
