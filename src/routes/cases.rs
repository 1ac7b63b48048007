use std::collections::HashMap;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::authz::{can_manage_participants, require_case_access};
use crate::error::{AppError, AppResult};
use crate::models::{
    is_valid_case_status, is_valid_case_type, Case, NewCase, NewCaseParticipant,
    DEFAULT_CASE_STATUS, ROLE_TENANT,
};
use crate::routes::{parse_rfc3339, to_iso};
use crate::schema::{case_participants, cases, documents};
use crate::state::AppState;
use crate::utils::json::{classify_nullable, NullableValue};

#[derive(Deserialize)]
pub struct CreateCaseRequest {
    pub title: String,
    #[serde(rename = "type")]
    pub case_type: String,
    pub status: Option<String>,
    pub opposing_party_name: Option<String>,
    pub tal_dossier_number: Option<String>,
    pub next_hearing_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct CaseResponse {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub case_type: String,
    pub status: String,
    pub created_by: Uuid,
    pub opposing_party_name: Option<String>,
    pub tal_dossier_number: Option<String>,
    pub next_hearing_date: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

impl From<Case> for CaseResponse {
    fn from(case: Case) -> Self {
        Self {
            id: case.id,
            title: case.title,
            case_type: case.case_type,
            status: case.status,
            created_by: case.created_by,
            opposing_party_name: case.opposing_party_name,
            tal_dossier_number: case.tal_dossier_number,
            next_hearing_date: case.next_hearing_date.map(to_iso),
            notes: case.notes,
            created_at: to_iso(case.created_at),
        }
    }
}

#[derive(Serialize)]
pub struct CaseStatsResponse {
    pub total: usize,
    pub draft: usize,
    pub active: usize,
    pub closed: usize,
    pub archived: usize,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = cases)]
struct UpdateCaseChangeset<'a> {
    title: Option<&'a str>,
    case_type: Option<&'a str>,
    status: Option<&'a str>,
    opposing_party_name: Option<Option<&'a str>>,
    tal_dossier_number: Option<Option<&'a str>>,
    next_hearing_date: Option<Option<NaiveDateTime>>,
    notes: Option<Option<&'a str>>,
}

/// Inserts the case and its creator-participant row in one transaction.
/// The creator is always recorded with role "tenant", matching the product
/// behavior even when a landlord opens the case.
pub async fn create_case(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateCaseRequest>,
) -> AppResult<(StatusCode, Json<CaseResponse>)> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }
    if !is_valid_case_type(&payload.case_type) {
        return Err(AppError::bad_request(
            "type must be one of non_payment, repossession, renovation, rent_increase, repairs, other",
        ));
    }
    let status = payload
        .status
        .unwrap_or_else(|| DEFAULT_CASE_STATUS.to_string());
    if !is_valid_case_status(&status) {
        return Err(AppError::bad_request(
            "status must be one of draft, active, closed, archived",
        ));
    }
    let next_hearing_date = payload
        .next_hearing_date
        .as_deref()
        .map(|value| parse_rfc3339("next_hearing_date", value))
        .transpose()?;

    let new_case = NewCase {
        id: Uuid::new_v4(),
        title: title.to_string(),
        case_type: payload.case_type,
        status,
        created_by: user.user_id,
        opposing_party_name: payload.opposing_party_name,
        tal_dossier_number: payload.tal_dossier_number,
        next_hearing_date,
        notes: payload.notes,
    };

    let mut conn = state.db()?;
    let case: Case = conn.transaction(|conn| {
        diesel::insert_into(cases::table)
            .values(&new_case)
            .execute(conn)?;

        let creator_participant = NewCaseParticipant {
            case_id: new_case.id,
            user_id: user.user_id,
            role: ROLE_TENANT.to_string(),
            added_by: user.user_id,
        };
        diesel::insert_into(case_participants::table)
            .values(&creator_participant)
            .execute(conn)?;

        cases::table.find(new_case.id).first(conn)
    })?;

    info!(case_id = %case.id, created_by = %user.user_id, "case created");
    Ok((StatusCode::CREATED, Json(CaseResponse::from(case))))
}

pub async fn list_cases(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<CaseResponse>>> {
    let mut conn = state.db()?;
    let visible = load_visible_cases(&mut conn, &user)?;
    Ok(Json(visible.into_iter().map(CaseResponse::from).collect()))
}

pub async fn case_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<CaseStatsResponse>> {
    let mut conn = state.db()?;
    let visible = load_visible_cases(&mut conn, &user)?;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for case in &visible {
        *counts.entry(case.status.as_str()).or_default() += 1;
    }

    Ok(Json(CaseStatsResponse {
        total: visible.len(),
        draft: counts.get("draft").copied().unwrap_or(0),
        active: counts.get("active").copied().unwrap_or(0),
        closed: counts.get("closed").copied().unwrap_or(0),
        archived: counts.get("archived").copied().unwrap_or(0),
    }))
}

pub async fn get_case(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<Uuid>,
) -> AppResult<Json<CaseResponse>> {
    let mut conn = state.db()?;
    let case = require_case_access(&mut conn, case_id, &user)?;
    Ok(Json(CaseResponse::from(case)))
}

/// Any participant may update any field; there is no field-level permission
/// split (a tenant can edit a dossier number set by a landlord).
pub async fn update_case(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<CaseResponse>> {
    let mut conn = state.db()?;
    require_case_access(&mut conn, case_id, &user)?;

    let mut new_title: Option<String> = None;
    if let Some(value) = body.get("title") {
        let title = value
            .as_str()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::bad_request("title must be a non-empty string"))?;
        new_title = Some(title.to_string());
    }

    let mut new_type: Option<String> = None;
    if let Some(value) = body.get("type") {
        let case_type = value
            .as_str()
            .filter(|t| is_valid_case_type(t))
            .ok_or_else(|| AppError::bad_request("type is not a valid case type"))?;
        new_type = Some(case_type.to_string());
    }

    let mut new_status: Option<String> = None;
    if let Some(value) = body.get("status") {
        let status = value
            .as_str()
            .filter(|s| is_valid_case_status(s))
            .ok_or_else(|| AppError::bad_request("status is not a valid case status"))?;
        new_status = Some(status.to_string());
    }

    let opposing =
        classify_nullable(body.get("opposing_party_name")).map_err(AppError::bad_request)?;
    let dossier =
        classify_nullable(body.get("tal_dossier_number")).map_err(AppError::bad_request)?;
    let notes = classify_nullable(body.get("notes")).map_err(AppError::bad_request)?;
    let hearing =
        classify_nullable(body.get("next_hearing_date")).map_err(AppError::bad_request)?;

    let opposing_change = nullable_change(opposing);
    let dossier_change = nullable_change(dossier);
    let notes_change = nullable_change(notes);
    let hearing_change = match hearing {
        NullableValue::Omitted => None,
        NullableValue::Null => Some(None),
        NullableValue::String(value) => {
            Some(Some(parse_rfc3339("next_hearing_date", &value)?))
        }
    };

    if new_title.is_none()
        && new_type.is_none()
        && new_status.is_none()
        && opposing_change.is_none()
        && dossier_change.is_none()
        && notes_change.is_none()
        && hearing_change.is_none()
    {
        return Err(AppError::bad_request("no changes provided"));
    }

    let changeset = UpdateCaseChangeset {
        title: new_title.as_deref(),
        case_type: new_type.as_deref(),
        status: new_status.as_deref(),
        opposing_party_name: opposing_change
            .as_ref()
            .map(|opt| opt.as_ref().map(|value| value.as_str())),
        tal_dossier_number: dossier_change
            .as_ref()
            .map(|opt| opt.as_ref().map(|value| value.as_str())),
        next_hearing_date: hearing_change,
        notes: notes_change
            .as_ref()
            .map(|opt| opt.as_ref().map(|value| value.as_str())),
    };

    diesel::update(cases::table.find(case_id))
        .set(&changeset)
        .execute(&mut conn)?;

    let updated: Case = cases::table.find(case_id).first(&mut conn)?;
    Ok(Json(CaseResponse::from(updated)))
}

/// Deleting a case cascades to its child rows. Document blobs are swept
/// afterwards on a best-effort basis; a failed blob delete only leaves an
/// orphan in storage, never a dangling metadata row.
pub async fn delete_case(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    let case = require_case_access(&mut conn, case_id, &user)?;
    if !can_manage_participants(&case, &user) {
        return Err(AppError::forbidden(
            "only the case owner or an admin can delete a case",
        ));
    }

    let blob_keys: Vec<String> = documents::table
        .filter(documents::case_id.eq(case_id))
        .select(documents::storage_path)
        .load(&mut conn)?;

    diesel::delete(cases::table.find(case_id)).execute(&mut conn)?;
    drop(conn);

    for key in &blob_keys {
        if let Err(err) = state.storage.delete_object(key).await {
            warn!(error = %err, key = %key, "failed to sweep document blob");
        }
    }

    info!(case_id = %case_id, deleted_by = %user.user_id, "case deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn load_visible_cases(
    conn: &mut PgConnection,
    user: &AuthenticatedUser,
) -> AppResult<Vec<Case>> {
    let visible: Vec<Case> = if user.is_admin() {
        cases::table
            .order(cases::created_at.desc())
            .load(conn)?
    } else {
        cases::table
            .inner_join(case_participants::table)
            .filter(case_participants::user_id.eq(user.user_id))
            .select(cases::all_columns)
            .order(cases::created_at.desc())
            .load(conn)?
    };
    Ok(visible)
}

fn nullable_change(value: NullableValue) -> Option<Option<String>> {
    match value {
        NullableValue::Omitted => None,
        NullableValue::Null => Some(None),
        NullableValue::String(s) => Some(Some(s)),
    }
}
