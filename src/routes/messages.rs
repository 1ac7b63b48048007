use std::convert::Infallible;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use diesel::prelude::*;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::authz::require_case_access;
use crate::error::{AppError, AppResult};
use crate::models::{Message, NewMessage, MESSAGE_TYPE_TEXT};
use crate::realtime::CaseEvent;
use crate::routes::to_iso;
use crate::schema::{messages, profiles};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct SenderProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub case_id: Uuid,
    pub sender_id: Uuid,
    #[serde(rename = "type")]
    pub message_type: String,
    pub content: String,
    pub created_at: String,
    pub sender: SenderProfile,
}

fn to_message_response(message: Message, sender: SenderProfile) -> MessageResponse {
    MessageResponse {
        id: message.id,
        case_id: message.case_id,
        sender_id: message.sender_id,
        message_type: message.message_type,
        content: message.content,
        created_at: to_iso(message.created_at),
        sender,
    }
}

/// Full history, oldest first. Ties on `created_at` fall back to whatever
/// stable order Postgres gives; nothing stronger is promised.
pub async fn list_messages(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<Uuid>,
) -> AppResult<Json<Vec<MessageResponse>>> {
    let mut conn = state.db()?;
    require_case_access(&mut conn, case_id, &user)?;

    let rows: Vec<(Message, (Uuid, String, Option<String>))> = messages::table
        .inner_join(profiles::table)
        .filter(messages::case_id.eq(case_id))
        .order(messages::created_at.asc())
        .select((
            messages::all_columns,
            (profiles::id, profiles::email, profiles::full_name),
        ))
        .load(&mut conn)?;

    let response = rows
        .into_iter()
        .map(|(message, (id, email, full_name))| {
            to_message_response(
                message,
                SenderProfile {
                    id,
                    email,
                    full_name,
                },
            )
        })
        .collect();

    Ok(Json(response))
}

/// Clients only ever send text; system entries are synthesized server-side
/// (e.g. on document upload). The feed is append-only.
pub async fn send_message(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(AppError::bad_request("content must not be empty"));
    }

    let mut conn = state.db()?;
    require_case_access(&mut conn, case_id, &user)?;

    let new_message = NewMessage {
        id: Uuid::new_v4(),
        case_id,
        sender_id: user.user_id,
        message_type: MESSAGE_TYPE_TEXT.to_string(),
        content: content.to_string(),
    };

    diesel::insert_into(messages::table)
        .values(&new_message)
        .execute(&mut conn)?;

    let message: Message = messages::table.find(new_message.id).first(&mut conn)?;
    let sender: (Uuid, String, Option<String>) = profiles::table
        .find(user.user_id)
        .select((profiles::id, profiles::email, profiles::full_name))
        .first(&mut conn)?;

    state.events.publish(
        case_id,
        CaseEvent::MessageCreated {
            case_id,
            message_id: message.id,
        },
    );
    info!(case_id = %case_id, message_id = %message.id, "message sent");

    Ok((
        StatusCode::CREATED,
        Json(to_message_response(
            message,
            SenderProfile {
                id: sender.0,
                email: sender.1,
                full_name: sender.2,
            },
        )),
    ))
}

/// Per-case SSE stream of change notifications. The subscription lives
/// exactly as long as the response stream; consumers are expected to
/// re-fetch the ordered message list on every event rather than apply
/// deltas.
pub async fn case_events(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<Uuid>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    {
        let mut conn = state.db()?;
        require_case_access(&mut conn, case_id, &user)?;
    }

    let receiver = state.events.subscribe(case_id);
    let stream = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => match Event::default().json_data(&event) {
                    Ok(sse_event) => return Some((Ok(sse_event), receiver)),
                    Err(err) => {
                        warn!(error = %err, "failed to serialize case event");
                        continue;
                    }
                },
                // A lagged receiver missed events; the consumer re-fetches
                // the whole list anyway, so just keep going.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
