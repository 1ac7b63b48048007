use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::authz::require_case_access;
use crate::error::{AppError, AppResult};
use crate::models::{Deadline, NewDeadline};
use crate::routes::{parse_rfc3339, to_iso};
use crate::schema::{case_participants, cases, deadlines, profiles};
use crate::state::AppState;

const DUE_SOON_WINDOW_HOURS: i64 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeadlineStatus {
    Completed,
    Overdue,
    DueSoon,
    Upcoming,
}

/// Pure function of `(due_date, is_done)` relative to `now`. Done wins over
/// everything; the due-soon window is inclusive at both ends.
pub fn deadline_status(due_date: NaiveDateTime, is_done: bool, now: NaiveDateTime) -> DeadlineStatus {
    if is_done {
        return DeadlineStatus::Completed;
    }
    if due_date < now {
        return DeadlineStatus::Overdue;
    }
    if due_date - now <= ChronoDuration::hours(DUE_SOON_WINDOW_HOURS) {
        return DeadlineStatus::DueSoon;
    }
    DeadlineStatus::Upcoming
}

#[derive(Deserialize)]
pub struct CreateDeadlineRequest {
    pub title: String,
    pub due_date: String,
}

#[derive(Deserialize)]
pub struct UpdateDeadlineRequest {
    pub title: Option<String>,
    pub due_date: Option<String>,
    pub is_done: Option<bool>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = deadlines)]
struct UpdateDeadlineChangeset<'a> {
    title: Option<&'a str>,
    due_date: Option<NaiveDateTime>,
    is_done: Option<bool>,
}

#[derive(Serialize)]
pub struct CreatorProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
}

#[derive(Serialize)]
pub struct DeadlineResponse {
    pub id: Uuid,
    pub case_id: Uuid,
    pub title: String,
    pub due_date: String,
    pub is_done: bool,
    pub status: DeadlineStatus,
    pub created_by: Uuid,
    pub created_at: String,
    pub profile: CreatorProfile,
}

#[derive(Serialize)]
pub struct CaseSummary {
    pub id: Uuid,
    pub title: String,
}

#[derive(Serialize)]
pub struct UpcomingDeadlineResponse {
    #[serde(flatten)]
    pub deadline: DeadlineResponse,
    pub case: CaseSummary,
}

fn to_deadline_response(
    deadline: Deadline,
    profile: CreatorProfile,
    now: NaiveDateTime,
) -> DeadlineResponse {
    DeadlineResponse {
        id: deadline.id,
        case_id: deadline.case_id,
        title: deadline.title,
        due_date: to_iso(deadline.due_date),
        is_done: deadline.is_done,
        status: deadline_status(deadline.due_date, deadline.is_done, now),
        created_by: deadline.created_by,
        created_at: to_iso(deadline.created_at),
        profile,
    }
}

/// Per-case list, due date ascending. Unlike the reminder banner this list
/// does show overdue items, tagged with their computed status.
pub async fn list_deadlines(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<Uuid>,
) -> AppResult<Json<Vec<DeadlineResponse>>> {
    let mut conn = state.db()?;
    require_case_access(&mut conn, case_id, &user)?;

    let rows: Vec<(Deadline, (Uuid, String, Option<String>))> = deadlines::table
        .inner_join(profiles::table.on(profiles::id.eq(deadlines::created_by)))
        .filter(deadlines::case_id.eq(case_id))
        .order(deadlines::due_date.asc())
        .select((
            deadlines::all_columns,
            (profiles::id, profiles::email, profiles::full_name),
        ))
        .load(&mut conn)?;

    let now = Utc::now().naive_utc();
    let response = rows
        .into_iter()
        .map(|(deadline, (id, email, full_name))| {
            to_deadline_response(
                deadline,
                CreatorProfile {
                    id,
                    email,
                    full_name,
                },
                now,
            )
        })
        .collect();

    Ok(Json(response))
}

pub async fn create_deadline(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<Uuid>,
    Json(payload): Json<CreateDeadlineRequest>,
) -> AppResult<(StatusCode, Json<DeadlineResponse>)> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }
    let due_date = parse_rfc3339("due_date", &payload.due_date)?;

    let mut conn = state.db()?;
    require_case_access(&mut conn, case_id, &user)?;

    let new_deadline = NewDeadline {
        id: Uuid::new_v4(),
        case_id,
        title: title.to_string(),
        due_date,
        is_done: false,
        created_by: user.user_id,
    };

    diesel::insert_into(deadlines::table)
        .values(&new_deadline)
        .execute(&mut conn)?;

    let deadline: Deadline = deadlines::table.find(new_deadline.id).first(&mut conn)?;
    let creator: (Uuid, String, Option<String>) = profiles::table
        .find(user.user_id)
        .select((profiles::id, profiles::email, profiles::full_name))
        .first(&mut conn)?;

    info!(case_id = %case_id, deadline_id = %deadline.id, "deadline created");

    Ok((
        StatusCode::CREATED,
        Json(to_deadline_response(
            deadline,
            CreatorProfile {
                id: creator.0,
                email: creator.1,
                full_name: creator.2,
            },
            Utc::now().naive_utc(),
        )),
    ))
}

/// Any participant may edit any deadline, not only its creator.
pub async fn update_deadline(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(deadline_id): Path<Uuid>,
    Json(payload): Json<UpdateDeadlineRequest>,
) -> AppResult<Json<DeadlineResponse>> {
    let mut conn = state.db()?;
    let existing: Deadline = deadlines::table
        .find(deadline_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;
    require_case_access(&mut conn, existing.case_id, &user)?;

    if payload.title.is_none() && payload.due_date.is_none() && payload.is_done.is_none() {
        return Err(AppError::bad_request("no changes provided"));
    }

    let new_title = match &payload.title {
        Some(title) => {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("title must not be empty"));
            }
            Some(trimmed.to_string())
        }
        None => None,
    };
    let new_due_date = payload
        .due_date
        .as_deref()
        .map(|value| parse_rfc3339("due_date", value))
        .transpose()?;

    let changeset = UpdateDeadlineChangeset {
        title: new_title.as_deref(),
        due_date: new_due_date,
        is_done: payload.is_done,
    };

    diesel::update(deadlines::table.find(deadline_id))
        .set(&changeset)
        .execute(&mut conn)?;

    let updated: Deadline = deadlines::table.find(deadline_id).first(&mut conn)?;
    let creator: (Uuid, String, Option<String>) = profiles::table
        .find(updated.created_by)
        .select((profiles::id, profiles::email, profiles::full_name))
        .first(&mut conn)?;

    Ok(Json(to_deadline_response(
        updated,
        CreatorProfile {
            id: creator.0,
            email: creator.1,
            full_name: creator.2,
        },
        Utc::now().naive_utc(),
    )))
}

pub async fn delete_deadline(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(deadline_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    let existing: Deadline = deadlines::table
        .find(deadline_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;
    require_case_access(&mut conn, existing.case_id, &user)?;

    diesel::delete(deadlines::table.find(deadline_id)).execute(&mut conn)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reminder banner across all of the requester's visible cases:
/// `is_done = false AND now <= due_date < now + 48h`. Already-overdue items
/// never show up here by construction; they only appear in the per-case
/// list, flagged as overdue.
pub async fn upcoming_deadlines(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<UpcomingDeadlineResponse>>> {
    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();
    let window_end = now + ChronoDuration::hours(DUE_SOON_WINDOW_HOURS);

    let mut query = deadlines::table
        .inner_join(cases::table)
        .inner_join(profiles::table.on(profiles::id.eq(deadlines::created_by)))
        .filter(deadlines::is_done.eq(false))
        .filter(deadlines::due_date.ge(now))
        .filter(deadlines::due_date.lt(window_end))
        .order(deadlines::due_date.asc())
        .select((
            deadlines::all_columns,
            (cases::id, cases::title),
            (profiles::id, profiles::email, profiles::full_name),
        ))
        .into_boxed();

    if !user.is_admin() {
        let participant_case_ids: Vec<Uuid> = case_participants::table
            .filter(case_participants::user_id.eq(user.user_id))
            .select(case_participants::case_id)
            .load(&mut conn)?;
        query = query.filter(deadlines::case_id.eq_any(participant_case_ids));
    }

    let rows: Vec<(
        Deadline,
        (Uuid, String),
        (Uuid, String, Option<String>),
    )> = query.load(&mut conn)?;

    let response = rows
        .into_iter()
        .map(|(deadline, (case_id, case_title), (id, email, full_name))| {
            UpcomingDeadlineResponse {
                deadline: to_deadline_response(
                    deadline,
                    CreatorProfile {
                        id,
                        email,
                        full_name,
                    },
                    now,
                ),
                case: CaseSummary {
                    id: case_id,
                    title: case_title,
                },
            }
        })
        .collect();

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> NaiveDateTime {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0)
            .unwrap()
            .naive_utc()
    }

    #[test]
    fn done_always_wins() {
        let now = at(12);
        // Even a past due date reads as completed once done.
        assert_eq!(deadline_status(at(1), true, now), DeadlineStatus::Completed);
        assert_eq!(deadline_status(at(20), true, now), DeadlineStatus::Completed);
    }

    #[test]
    fn past_due_is_overdue() {
        let now = at(12);
        assert_eq!(deadline_status(at(11), false, now), DeadlineStatus::Overdue);
    }

    #[test]
    fn within_48_hours_is_due_soon() {
        let now = at(12);
        assert_eq!(deadline_status(at(22), false, now), DeadlineStatus::DueSoon);
        // Exactly on the boundary still counts.
        let boundary = now + ChronoDuration::hours(48);
        assert_eq!(
            deadline_status(boundary, false, now),
            DeadlineStatus::DueSoon
        );
        assert_eq!(deadline_status(now, false, now), DeadlineStatus::DueSoon);
    }

    #[test]
    fn beyond_the_window_is_upcoming() {
        let now = at(12);
        let later = now + ChronoDuration::hours(49);
        assert_eq!(deadline_status(later, false, now), DeadlineStatus::Upcoming);
    }
}
