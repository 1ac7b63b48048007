use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use chrono::{Duration as ChronoDuration, Utc};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::authz::require_case_manager;
use crate::error::{AppError, AppResult};
use crate::models::{is_valid_participant_role, CaseInvitation, NewCaseInvitation,
    NewCaseParticipant};
use crate::routes::to_iso;
use crate::schema::{case_invitations, case_participants};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateInvitationRequest {
    pub email: String,
    pub role: String,
}

#[derive(Serialize)]
pub struct InvitationResponse {
    pub id: Uuid,
    pub case_id: Uuid,
    pub email: String,
    pub role: String,
    pub invited_by: Uuid,
    pub expires_at: String,
    pub created_at: String,
    /// Shareable sign-up link; no email is dispatched by the server.
    pub invite_link: String,
}

#[derive(Deserialize)]
pub struct AcceptInvitationRequest {
    pub case_id: Uuid,
}

#[derive(Serialize)]
pub struct AcceptInvitationResponse {
    pub case_id: Uuid,
    pub role: String,
}

/// Inserts an invitation row with a 7-day expiry and surfaces a shareable
/// link. Inviting the same email twice creates two rows; the duplicate is
/// harmless and both are consumed at redemption.
pub async fn create_invitation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<Uuid>,
    Json(payload): Json<CreateInvitationRequest>,
) -> AppResult<(StatusCode, Json<InvitationResponse>)> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("a valid email is required"));
    }
    if !is_valid_participant_role(&payload.role) {
        return Err(AppError::bad_request(
            "role must be one of tenant, landlord, lawyer, admin",
        ));
    }

    let mut conn = state.db()?;
    require_case_manager(&mut conn, case_id, &user)?;

    let expires_at = Utc::now() + ChronoDuration::days(state.config.invitation_expiry_days);
    let new_invitation = NewCaseInvitation {
        id: Uuid::new_v4(),
        case_id,
        email: email.clone(),
        role: payload.role,
        invited_by: user.user_id,
        expires_at: expires_at.naive_utc(),
    };

    diesel::insert_into(case_invitations::table)
        .values(&new_invitation)
        .execute(&mut conn)?;

    let invitation: CaseInvitation = case_invitations::table
        .find(new_invitation.id)
        .first(&mut conn)?;

    info!(case_id = %case_id, invited_by = %user.user_id, "invitation created");

    let invite_link = build_invite_link(
        &state.config.invitation_base_url,
        case_id,
        &invitation.email,
        &invitation.role,
    );

    Ok((
        StatusCode::CREATED,
        Json(InvitationResponse {
            id: invitation.id,
            case_id: invitation.case_id,
            email: invitation.email,
            role: invitation.role,
            invited_by: invitation.invited_by,
            expires_at: to_iso(invitation.expires_at),
            created_at: to_iso(invitation.created_at),
            invite_link,
        }),
    ))
}

/// Redeems pending invitations matching the authenticated user's email.
/// Expiry is only enforced here; there is no background sweep.
pub async fn accept_invitation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<AcceptInvitationRequest>,
) -> AppResult<(StatusCode, Json<AcceptInvitationResponse>)> {
    let mut conn = state.db()?;
    let email = user.email.trim().to_lowercase();
    let now = Utc::now().naive_utc();

    let pending: Vec<CaseInvitation> = case_invitations::table
        .filter(case_invitations::case_id.eq(payload.case_id))
        .filter(case_invitations::email.eq(&email))
        .order(case_invitations::created_at.desc())
        .load(&mut conn)?;

    if pending.is_empty() {
        return Err(AppError::not_found());
    }

    let current = pending
        .iter()
        .find(|invitation| invitation.expires_at > now)
        .ok_or_else(|| AppError::bad_request("invitation has expired"))?;

    let role = current.role.clone();
    let case_id = current.case_id;

    let result = conn.transaction(|conn| {
        diesel::insert_into(case_participants::table)
            .values(&NewCaseParticipant {
                case_id,
                user_id: user.user_id,
                role: role.clone(),
                added_by: current.invited_by,
            })
            .execute(conn)?;

        diesel::delete(
            case_invitations::table
                .filter(case_invitations::case_id.eq(case_id))
                .filter(case_invitations::email.eq(&email)),
        )
        .execute(conn)?;

        Ok::<_, diesel::result::Error>(())
    });

    match result {
        Ok(()) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict("user is already a participant"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    info!(case_id = %case_id, user_id = %user.user_id, "invitation accepted");

    Ok((
        StatusCode::CREATED,
        Json(AcceptInvitationResponse { case_id, role }),
    ))
}

fn build_invite_link(base_url: &str, case_id: Uuid, email: &str, role: &str) -> String {
    let encoded_email = percent_encoding::utf8_percent_encode(
        email,
        percent_encoding::NON_ALPHANUMERIC,
    );
    format!("{base_url}/auth/sign-up?invite={case_id}&email={encoded_email}&role={role}")
}
