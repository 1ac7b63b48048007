use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use axum_extra::{headers::Cookie, typed_header::TypedHeader};
use chrono::{Duration as ChronoDuration, Utc};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    models::{is_valid_participant_role, NewProfile, NewRefreshToken, Profile, RefreshToken,
        ROLE_ADMIN, ROLE_TENANT},
    routes::to_iso,
    schema::{profiles, profiles::dsl, refresh_tokens},
    state::AppState,
};

use crate::schema::refresh_tokens::dsl as refresh_dsl;

const REFRESH_COOKIE_NAME: &str = "refresh_token";
const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub created_at: String,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            role: profile.role,
            full_name: profile.full_name,
            phone: profile.phone,
            created_at: to_iso(profile.created_at),
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<LoginResponse>)> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("a valid email is required"));
    }
    if payload.password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let role = payload.role.unwrap_or_else(|| ROLE_TENANT.to_string());
    if !is_valid_participant_role(&role) || role == ROLE_ADMIN {
        // Admin profiles are provisioned out of band, never self-assigned.
        return Err(AppError::bad_request(
            "role must be one of tenant, landlord, lawyer",
        ));
    }

    let password_hash = password::hash_password(&payload.password)
        .map_err(|err| AppError::internal(format!("failed to hash password: {err}")))?;

    let new_profile = NewProfile {
        id: Uuid::new_v4(),
        email: email.clone(),
        password_hash,
        role,
        full_name: payload.full_name.map(|name| name.trim().to_string()),
        phone: payload.phone.map(|phone| phone.trim().to_string()),
    };

    let mut conn = state.db()?;
    match diesel::insert_into(profiles::table)
        .values(&new_profile)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict("email is already registered"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let profile: Profile = dsl::profiles.find(new_profile.id).first(&mut conn)?;
    info!(user_id = %profile.id, "profile registered");

    let (headers, response) = issue_session(&state, &mut conn, &profile)?;
    Ok((StatusCode::CREATED, headers, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let mut conn = state.db()?;

    let email = payload.email.trim().to_lowercase();
    let profile: Profile = dsl::profiles
        .filter(dsl::email.eq(&email))
        .first(&mut conn)
        .map_err(|_| AppError::unauthorized())?;

    let valid = password::verify_password(&payload.password, &profile.password_hash)
        .map_err(|_| AppError::unauthorized())?;

    if !valid {
        return Err(AppError::unauthorized());
    }

    let (headers, response) = issue_session(&state, &mut conn, &profile)?;
    Ok((headers, Json(response)))
}

pub async fn refresh(
    State(state): State<AppState>,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let cookies = jar.ok_or_else(AppError::unauthorized)?;
    let refresh_value = cookies
        .get(REFRESH_COOKIE_NAME)
        .ok_or_else(AppError::unauthorized)?;

    let hashed = hash_refresh_token(refresh_value);
    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();

    let token = match refresh_dsl::refresh_tokens
        .filter(refresh_dsl::token_hash.eq(&hashed))
        .filter(refresh_dsl::revoked_at.is_null())
        .filter(refresh_dsl::expires_at.gt(now))
        .first::<RefreshToken>(&mut conn)
    {
        Ok(token) => token,
        Err(diesel::result::Error::NotFound) => return Err(AppError::unauthorized()),
        Err(err) => return Err(AppError::from(err)),
    };

    diesel::update(refresh_dsl::refresh_tokens.filter(refresh_dsl::id.eq(token.id)))
        .set((
            refresh_dsl::revoked_at.eq(now),
            refresh_dsl::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    let profile: Profile = dsl::profiles.find(token.user_id).first(&mut conn)?;

    let (headers, response) = issue_session(&state, &mut conn, &profile)?;
    Ok((headers, Json(response)))
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, StatusCode)> {
    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();
    let mut rows_affected = 0;

    if let Some(cookies) = jar {
        if let Some(value) = cookies.get(REFRESH_COOKIE_NAME) {
            let hashed = hash_refresh_token(value);
            rows_affected = diesel::update(
                refresh_dsl::refresh_tokens
                    .filter(refresh_dsl::token_hash.eq(hashed))
                    .filter(refresh_dsl::user_id.eq(user.user_id))
                    .filter(refresh_dsl::revoked_at.is_null()),
            )
            .set((
                refresh_dsl::revoked_at.eq(now),
                refresh_dsl::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .unwrap_or(0);
        }
    }

    if rows_affected == 0 {
        let _ = diesel::update(
            refresh_dsl::refresh_tokens
                .filter(refresh_dsl::user_id.eq(user.user_id))
                .filter(refresh_dsl::revoked_at.is_null()),
        )
        .set((
            refresh_dsl::revoked_at.eq(now),
            refresh_dsl::updated_at.eq(now),
        ))
        .execute(&mut conn);
    }

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, build_clear_refresh_cookie(&state));
    Ok((headers, StatusCode::NO_CONTENT))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ProfileResponse>> {
    let mut conn = state.db()?;
    let profile: Profile = dsl::profiles.find(user.user_id).first(&mut conn)?;
    Ok(Json(ProfileResponse::from(profile)))
}

/// Onboarding-style update of the requester's own contact fields. Email and
/// role are not editable here.
pub async fn update_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ProfileResponse>> {
    if payload.full_name.is_none() && payload.phone.is_none() {
        return Err(AppError::bad_request("no changes provided"));
    }

    let mut conn = state.db()?;

    if let Some(full_name) = &payload.full_name {
        let trimmed = full_name.trim();
        if trimmed.is_empty() {
            return Err(AppError::bad_request("full_name must not be empty"));
        }
        diesel::update(dsl::profiles.find(user.user_id))
            .set(dsl::full_name.eq(trimmed))
            .execute(&mut conn)?;
    }

    if let Some(phone) = &payload.phone {
        let trimmed = phone.trim();
        if trimmed.is_empty() {
            return Err(AppError::bad_request("phone must not be empty"));
        }
        diesel::update(dsl::profiles.find(user.user_id))
            .set(dsl::phone.eq(trimmed))
            .execute(&mut conn)?;
    }

    let profile: Profile = dsl::profiles.find(user.user_id).first(&mut conn)?;
    Ok(Json(ProfileResponse::from(profile)))
}

fn issue_session(
    state: &AppState,
    conn: &mut PgConnection,
    profile: &Profile,
) -> AppResult<(HeaderMap, LoginResponse)> {
    let access_token = state
        .jwt
        .generate_token(profile.id, &profile.email, &profile.role)
        .map_err(AppError::from)?;

    let now = Utc::now();
    let refresh_value = generate_refresh_token();
    let refresh_hash = hash_refresh_token(&refresh_value);
    let refresh_expires_at = now + ChronoDuration::days(state.config.refresh_token_expiry_days);

    let new_refresh = NewRefreshToken {
        id: Uuid::new_v4(),
        user_id: profile.id,
        token_hash: refresh_hash,
        issued_at: now.naive_utc(),
        expires_at: refresh_expires_at.naive_utc(),
    };

    diesel::insert_into(refresh_tokens::table)
        .values(&new_refresh)
        .execute(conn)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        build_refresh_cookie(state, &refresh_value, refresh_expires_at),
    );

    Ok((
        headers,
        LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: state.config.jwt_expiry_minutes * 60,
        },
    ))
}

fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn build_refresh_cookie(
    state: &AppState,
    token: &str,
    expires_at: chrono::DateTime<Utc>,
) -> HeaderValue {
    let max_age = ChronoDuration::days(state.config.refresh_token_expiry_days).num_seconds();

    let mut parts = vec![format!("{}={}", REFRESH_COOKIE_NAME, token)];
    parts.push("Path=/".into());
    parts.push("HttpOnly".into());
    parts.push("SameSite=Strict".into());
    parts.push(format!("Max-Age={}", max_age));
    parts.push(format!("Expires={}", expires_at.to_rfc2822()));
    if state.config.refresh_cookie_secure {
        parts.push("Secure".into());
    }
    if let Some(domain) = &state.config.refresh_cookie_domain {
        parts.push(format!("Domain={}", domain));
    }

    HeaderValue::from_str(&parts.join("; ")).expect("valid refresh cookie")
}

fn build_clear_refresh_cookie(state: &AppState) -> HeaderValue {
    let mut parts = vec![format!("{}=", REFRESH_COOKIE_NAME)];
    parts.push("Path=/".into());
    parts.push("HttpOnly".into());
    parts.push("SameSite=Strict".into());
    parts.push("Max-Age=0".into());
    parts.push("Expires=Thu, 01 Jan 1970 00:00:00 GMT".into());
    if state.config.refresh_cookie_secure {
        parts.push("Secure".into());
    }
    if let Some(domain) = &state.config.refresh_cookie_domain {
        parts.push(format!("Domain={}", domain));
    }

    HeaderValue::from_str(&parts.join("; ")).expect("valid refresh cookie")
}
