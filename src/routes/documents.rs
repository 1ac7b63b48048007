use std::time::Duration;

use axum::extract::{Json, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use diesel::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::authz::require_case_access;
use crate::error::{AppError, AppResult};
use crate::models::{Document, NewDocument, NewMessage, MESSAGE_TYPE_SYSTEM};
use crate::realtime::CaseEvent;
use crate::routes::to_iso;
use crate::schema::{documents, messages, profiles};
use crate::state::AppState;

#[derive(Serialize)]
pub struct UploaderProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
}

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub case_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub storage_path: String,
    pub size_bytes: i64,
    pub created_at: String,
    pub profile: UploaderProfile,
}

fn to_document_response(document: Document, profile: UploaderProfile) -> DocumentResponse {
    DocumentResponse {
        id: document.id,
        case_id: document.case_id,
        user_id: document.user_id,
        name: document.name,
        doc_type: document.doc_type,
        storage_path: document.storage_path,
        size_bytes: document.size_bytes,
        created_at: to_iso(document.created_at),
        profile,
    }
}

#[derive(Serialize)]
pub struct DocumentDownloadResponse {
    pub url: String,
    pub expires_in: u64,
    pub filename: String,
    pub size_bytes: i64,
}

pub async fn list_documents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<Uuid>,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db()?;
    require_case_access(&mut conn, case_id, &user)?;

    let rows: Vec<(Document, (Uuid, String, Option<String>))> = documents::table
        .inner_join(profiles::table)
        .filter(documents::case_id.eq(case_id))
        .order(documents::created_at.desc())
        .select((
            documents::all_columns,
            (profiles::id, profiles::email, profiles::full_name),
        ))
        .load(&mut conn)?;

    let response = rows
        .into_iter()
        .map(|(document, (id, email, full_name))| {
            to_document_response(
                document,
                UploaderProfile {
                    id,
                    email,
                    full_name,
                },
            )
        })
        .collect();

    Ok(Json(response))
}

/// Blob first, metadata second. The blob is removed again when the metadata
/// insert fails; a crash between the two steps leaves an orphaned blob,
/// never a dangling metadata row.
pub async fn upload_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    {
        let mut conn = state.db()?;
        require_case_access(&mut conn, case_id, &user)?;
    }

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut original_name: Option<String> = None;
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        if field.name() == Some("file") {
            original_name = field.file_name().map(|n| n.to_string());
            content_type = field.content_type().map(|mime| mime.to_string());
            let data = field.bytes().await.map_err(|err| {
                error!(error = %err, "failed to read file bytes");
                AppError::bad_request(format!("failed to read file bytes: {err}"))
            })?;
            file_bytes = Some(data.to_vec());
        }
    }

    let file_bytes = file_bytes.ok_or_else(|| AppError::bad_request("file field is required"))?;
    if file_bytes.is_empty() {
        return Err(AppError::bad_request("file field must not be empty"));
    }
    let original_name =
        original_name.ok_or_else(|| AppError::bad_request("filename is required"))?;

    let timestamp = Utc::now().timestamp_millis();
    let sanitized = sanitize_filename(&original_name);
    let storage_path = format!("{case_id}/{}/{timestamp}_{sanitized}", user.user_id);
    let size_bytes = file_bytes.len() as i64;

    state
        .storage
        .put_object(
            &storage_path,
            file_bytes,
            content_type,
            inline_content_disposition(&original_name),
        )
        .await
        .map_err(|err| {
            error!(error = %err, key = %storage_path, "failed to store document");
            AppError::internal(format!("failed to store document: {err}"))
        })?;

    let new_document = NewDocument {
        id: Uuid::new_v4(),
        case_id,
        user_id: user.user_id,
        name: original_name.clone(),
        doc_type: document_type_for(&original_name).to_string(),
        storage_path: storage_path.clone(),
        size_bytes,
    };

    let mut conn = state.db()?;
    let insert_result = diesel::insert_into(documents::table)
        .values(&new_document)
        .execute(&mut conn);

    if let Err(err) = insert_result {
        error!(error = %err, key = %storage_path, "metadata insert failed, rolling back blob");
        if let Err(cleanup_err) = state.storage.delete_object(&storage_path).await {
            warn!(error = %cleanup_err, key = %storage_path, "failed to remove orphaned blob");
        }
        return Err(AppError::from(err));
    }

    let document: Document = documents::table.find(new_document.id).first(&mut conn)?;

    // Feed entry about the upload is best effort; the document itself is
    // already durable.
    let system_message = NewMessage {
        id: Uuid::new_v4(),
        case_id,
        sender_id: user.user_id,
        message_type: MESSAGE_TYPE_SYSTEM.to_string(),
        content: format!("📎 {original_name} uploaded"),
    };
    match diesel::insert_into(messages::table)
        .values(&system_message)
        .execute(&mut conn)
    {
        Ok(_) => state.events.publish(
            case_id,
            CaseEvent::MessageCreated {
                case_id,
                message_id: system_message.id,
            },
        ),
        Err(err) => {
            warn!(error = %err, document_id = %document.id, "failed to record upload message")
        }
    }

    let uploader: (Uuid, String, Option<String>) = profiles::table
        .find(user.user_id)
        .select((profiles::id, profiles::email, profiles::full_name))
        .first(&mut conn)?;

    info!(document_id = %document.id, case_id = %case_id, size_bytes, "document uploaded");

    Ok((
        StatusCode::CREATED,
        Json(to_document_response(
            document,
            UploaderProfile {
                id: uploader.0,
                email: uploader.1,
                full_name: uploader.2,
            },
        )),
    ))
}

pub async fn download_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<DocumentDownloadResponse>> {
    let mut conn = state.db()?;
    let document: Document = documents::table
        .find(document_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;
    require_case_access(&mut conn, document.case_id, &user)?;
    drop(conn);

    let expires_in = state.config.download_url_expiry_seconds;
    let presigned_url = state
        .storage
        .presign_get_object(&document.storage_path, Duration::from_secs(expires_in))
        .await
        .map_err(|err| AppError::internal(format!("failed to generate download URL: {err}")))?;

    Ok(Json(DocumentDownloadResponse {
        url: presigned_url,
        expires_in,
        filename: document.name,
        size_bytes: document.size_bytes,
    }))
}

/// Uploader or admin only. The blob is deleted before the metadata row; if
/// the blob deletion fails the row is kept, preferring an orphaned blob
/// over a pointer at nothing.
pub async fn delete_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    let document: Document = documents::table
        .find(document_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;
    require_case_access(&mut conn, document.case_id, &user)?;

    if document.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::forbidden(
            "only the uploader or an admin can delete a document",
        ));
    }
    drop(conn);

    state
        .storage
        .delete_object(&document.storage_path)
        .await
        .map_err(|err| {
            error!(error = %err, key = %document.storage_path, "blob deletion failed, keeping metadata");
            AppError::internal(format!("failed to delete file from storage: {err}"))
        })?;

    let mut conn = state.db()?;
    diesel::delete(documents::table.find(document_id)).execute(&mut conn)?;

    info!(document_id = %document_id, deleted_by = %user.user_id, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Maps everything outside `[A-Za-z0-9.-]` to `_` so the storage key stays
/// safe for path-style object stores.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' => ch,
            _ => '_',
        })
        .collect()
}

fn document_type_for(filename: &str) -> &'static str {
    let lowered = filename.to_lowercase();
    let extension = match lowered.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_string(),
        _ => return "other",
    };

    match extension.as_str() {
        "pdf" | "doc" | "docx" | "txt" | "rtf" => "notice",
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" => "photo",
        "mp3" | "wav" | "m4a" | "aac" => "audio",
        "mp4" | "avi" | "mov" | "wmv" => "video",
        "eml" | "msg" => "email",
        "xls" | "xlsx" | "csv" => "invoice",
        _ => "other",
    }
}

fn inline_content_disposition(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    ))
}
