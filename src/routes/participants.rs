use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::authz::{permissions_for, require_case_access, require_case_manager,
    ParticipantPermissions};
use crate::error::{AppError, AppResult};
use crate::models::{is_valid_participant_role, CaseParticipant, NewCaseParticipant, Profile};
use crate::routes::to_iso;
use crate::schema::{case_participants, profiles};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddParticipantRequest {
    pub email: String,
    pub role: String,
}

#[derive(Serialize)]
pub struct ParticipantProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Serialize)]
pub struct ParticipantResponse {
    pub case_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub added_by: Uuid,
    pub created_at: String,
    pub profile: ParticipantProfile,
}

fn to_participant_response(
    participant: CaseParticipant,
    profile: ParticipantProfile,
) -> ParticipantResponse {
    ParticipantResponse {
        case_id: participant.case_id,
        user_id: participant.user_id,
        role: participant.role,
        added_by: participant.added_by,
        created_at: to_iso(participant.created_at),
        profile,
    }
}

pub async fn list_participants(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<Uuid>,
) -> AppResult<Json<Vec<ParticipantResponse>>> {
    let mut conn = state.db()?;
    require_case_access(&mut conn, case_id, &user)?;

    let rows: Vec<(CaseParticipant, (Uuid, String, Option<String>, Option<String>))> =
        case_participants::table
            .inner_join(profiles::table.on(profiles::id.eq(case_participants::user_id)))
            .filter(case_participants::case_id.eq(case_id))
            .order(case_participants::created_at.asc())
            .select((
                case_participants::all_columns,
                (
                    profiles::id,
                    profiles::email,
                    profiles::full_name,
                    profiles::phone,
                ),
            ))
            .load(&mut conn)?;

    let response = rows
        .into_iter()
        .map(|(participant, (id, email, full_name, phone))| {
            to_participant_response(
                participant,
                ParticipantProfile {
                    id,
                    email,
                    full_name,
                    phone,
                },
            )
        })
        .collect();

    Ok(Json(response))
}

/// Adds an existing profile to the case by email. Never creates a profile:
/// unknown emails are pointed at the invitation flow instead.
pub async fn add_participant(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<Uuid>,
    Json(payload): Json<AddParticipantRequest>,
) -> AppResult<(StatusCode, Json<ParticipantResponse>)> {
    if !is_valid_participant_role(&payload.role) {
        return Err(AppError::bad_request(
            "role must be one of tenant, landlord, lawyer, admin",
        ));
    }

    let mut conn = state.db()?;
    require_case_manager(&mut conn, case_id, &user)?;

    let email = payload.email.trim().to_lowercase();
    let target: Option<Profile> = profiles::table
        .filter(profiles::email.eq(&email))
        .first(&mut conn)
        .optional()?;

    let target = target.ok_or_else(|| {
        AppError::bad_request(format!(
            "user with email {email} does not exist; send an invitation instead"
        ))
    })?;

    let new_participant = NewCaseParticipant {
        case_id,
        user_id: target.id,
        role: payload.role,
        added_by: user.user_id,
    };

    match diesel::insert_into(case_participants::table)
        .values(&new_participant)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict("user is already a participant"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let participant: CaseParticipant = case_participants::table
        .find((case_id, target.id))
        .first(&mut conn)?;

    info!(case_id = %case_id, user_id = %target.id, added_by = %user.user_id, "participant added");

    Ok((
        StatusCode::CREATED,
        Json(to_participant_response(
            participant,
            ParticipantProfile {
                id: target.id,
                email: target.email,
                full_name: target.full_name,
                phone: target.phone,
            },
        )),
    ))
}

/// Owner or admin only. Nothing stops the owner from removing themself;
/// management rights survive via `created_by`.
pub async fn remove_participant(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((case_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    require_case_manager(&mut conn, case_id, &user)?;

    let deleted = diesel::delete(
        case_participants::table
            .filter(case_participants::case_id.eq(case_id))
            .filter(case_participants::user_id.eq(user_id)),
    )
    .execute(&mut conn)?;

    if deleted == 0 {
        return Err(AppError::not_found());
    }

    info!(case_id = %case_id, user_id = %user_id, removed_by = %user.user_id, "participant removed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn participant_permissions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<Uuid>,
) -> AppResult<Json<ParticipantPermissions>> {
    let mut conn = state.db()?;
    let case = require_case_access(&mut conn, case_id, &user)?;
    Ok(Json(permissions_for(&case, &user)))
}
