use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

pub const PARTICIPANT_ROLES: &[&str] = &["tenant", "landlord", "lawyer", "admin"];
pub const CASE_TYPES: &[&str] = &[
    "non_payment",
    "repossession",
    "renovation",
    "rent_increase",
    "repairs",
    "other",
];
pub const CASE_STATUSES: &[&str] = &["draft", "active", "closed", "archived"];

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_TENANT: &str = "tenant";

pub const MESSAGE_TYPE_TEXT: &str = "text";
pub const MESSAGE_TYPE_SYSTEM: &str = "system";

pub const DEFAULT_CASE_STATUS: &str = "draft";

pub fn is_valid_participant_role(role: &str) -> bool {
    PARTICIPANT_ROLES.iter().any(|allowed| *allowed == role)
}

pub fn is_valid_case_type(case_type: &str) -> bool {
    CASE_TYPES.iter().any(|allowed| *allowed == case_type)
}

pub fn is_valid_case_status(status: &str) -> bool {
    CASE_STATUSES.iter().any(|allowed| *allowed == status)
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = cases)]
pub struct Case {
    pub id: Uuid,
    pub title: String,
    pub case_type: String,
    pub status: String,
    pub created_by: Uuid,
    pub opposing_party_name: Option<String>,
    pub tal_dossier_number: Option<String>,
    pub next_hearing_date: Option<NaiveDateTime>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = cases)]
pub struct NewCase {
    pub id: Uuid,
    pub title: String,
    pub case_type: String,
    pub status: String,
    pub created_by: Uuid,
    pub opposing_party_name: Option<String>,
    pub tal_dossier_number: Option<String>,
    pub next_hearing_date: Option<NaiveDateTime>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = case_participants)]
#[diesel(primary_key(case_id, user_id))]
#[diesel(belongs_to(Case))]
pub struct CaseParticipant {
    pub case_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub added_by: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = case_participants)]
pub struct NewCaseParticipant {
    pub case_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub added_by: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = documents)]
#[diesel(belongs_to(Case))]
pub struct Document {
    pub id: Uuid,
    pub case_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub doc_type: String,
    pub storage_path: String,
    pub size_bytes: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub id: Uuid,
    pub case_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub doc_type: String,
    pub storage_path: String,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = messages)]
#[diesel(belongs_to(Case))]
pub struct Message {
    pub id: Uuid,
    pub case_id: Uuid,
    pub sender_id: Uuid,
    pub message_type: String,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage {
    pub id: Uuid,
    pub case_id: Uuid,
    pub sender_id: Uuid,
    pub message_type: String,
    pub content: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = deadlines)]
#[diesel(belongs_to(Case))]
pub struct Deadline {
    pub id: Uuid,
    pub case_id: Uuid,
    pub title: String,
    pub due_date: NaiveDateTime,
    pub is_done: bool,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = deadlines)]
pub struct NewDeadline {
    pub id: Uuid,
    pub case_id: Uuid,
    pub title: String,
    pub due_date: NaiveDateTime,
    pub is_done: bool,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = case_invitations)]
#[diesel(belongs_to(Case))]
pub struct CaseInvitation {
    pub id: Uuid,
    pub case_id: Uuid,
    pub email: String,
    pub role: String,
    pub invited_by: Uuid,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = case_invitations)]
pub struct NewCaseInvitation {
    pub id: Uuid,
    pub case_id: Uuid,
    pub email: String,
    pub role: String,
    pub invited_by: Uuid,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = refresh_tokens)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}
