//! The participant-or-admin gate.
//!
//! Every case-scoped query goes through here before touching child tables.
//! Access failures surface as `not_found` so callers cannot probe which
//! case ids exist. Participant management (add/remove/invite) is gated
//! separately on `created_by` or an admin profile; a participant who can
//! see the case but not manage it gets a 403 with an explicit message.

use diesel::dsl::exists;
use diesel::{prelude::*, select, PgConnection};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::Case;
use crate::schema::{case_participants, cases};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParticipantPermissions {
    pub can_add: bool,
    pub can_remove: bool,
    pub can_invite: bool,
}

pub fn is_participant(
    conn: &mut PgConnection,
    case_id: Uuid,
    user_id: Uuid,
) -> AppResult<bool> {
    let present: bool = select(exists(
        case_participants::table
            .filter(case_participants::case_id.eq(case_id))
            .filter(case_participants::user_id.eq(user_id)),
    ))
    .get_result(conn)?;
    Ok(present)
}

/// Loads the case if the requester is a participant or an admin, otherwise
/// fails with `not_found` regardless of whether the case exists.
pub fn require_case_access(
    conn: &mut PgConnection,
    case_id: Uuid,
    user: &AuthenticatedUser,
) -> AppResult<Case> {
    let case: Case = cases::table
        .find(case_id)
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    if user.is_admin() || is_participant(conn, case_id, user.user_id)? {
        Ok(case)
    } else {
        Err(AppError::not_found())
    }
}

/// Access plus the owner-or-admin management right. Non-owners who can see
/// the case get a descriptive 403 here.
pub fn require_case_manager(
    conn: &mut PgConnection,
    case_id: Uuid,
    user: &AuthenticatedUser,
) -> AppResult<Case> {
    let case = require_case_access(conn, case_id, user)?;
    if can_manage_participants(&case, user) {
        Ok(case)
    } else {
        Err(AppError::forbidden(
            "only the case owner or an admin can manage participants",
        ))
    }
}

/// Owner-or-admin predicate. Keyed off `created_by`, not participant
/// membership, so the owner keeps management rights even after removing
/// themself from the participant list.
pub fn can_manage_participants(case: &Case, user: &AuthenticatedUser) -> bool {
    case.created_by == user.user_id || user.is_admin()
}

pub fn permissions_for(case: &Case, user: &AuthenticatedUser) -> ParticipantPermissions {
    let can_manage = can_manage_participants(case, user);
    ParticipantPermissions {
        can_add: can_manage,
        can_remove: can_manage,
        can_invite: can_manage,
    }
}
