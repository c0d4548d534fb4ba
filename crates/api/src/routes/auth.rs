//! Sign-in routes
//!
//! Three ways in: explicit registration, email login (passwordless in dev
//! deployments), and Google ID-token sign-in. All of them are idempotent by
//! email and guarantee the user has at least a free subscription row before a
//! token is issued.

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use cropsense_billing::SubscriptionSummary;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleSignInRequest {
    #[serde(rename = "idToken")]
    pub id_token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
    pub subscription: SubscriptionSummary,
}

fn validate_email(email: &str) -> ApiResult<&str> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::Validation("A valid email is required".to_string()));
    }
    Ok(email)
}

/// Insert-or-fetch a user by email. Name and google_sub only ever get filled
/// in, never cleared.
async fn upsert_user(
    state: &AppState,
    email: &str,
    name: Option<&str>,
    google_sub: Option<&str>,
) -> ApiResult<UserResponse> {
    let row = sqlx::query(
        r#"
        INSERT INTO users (email, name, google_sub)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE SET
            name = COALESCE(users.name, EXCLUDED.name),
            google_sub = COALESCE(users.google_sub, EXCLUDED.google_sub)
        RETURNING id, email, name
        "#,
    )
    .bind(email)
    .bind(name)
    .bind(google_sub)
    .fetch_one(&state.pool)
    .await?;

    Ok(UserResponse {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
    })
}

async fn auth_response(state: &AppState, user: UserResponse) -> ApiResult<AuthResponse> {
    state.subscriptions.ensure_free(user.id).await?;
    let subscription = state.quota.summary(user.id).await?;
    let token = state
        .jwt
        .create_token(user.id, &user.email)
        .map_err(|_| ApiError::Internal)?;

    Ok(AuthResponse {
        token,
        user,
        subscription,
    })
}

/// Register a new user (idempotent by email)
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = validate_email(&req.email)?;
    let user = upsert_user(&state, email, req.name.as_deref(), None).await?;
    tracing::info!(user_id = %user.id, "User registered");
    Ok(Json(auth_response(&state, user).await?))
}

/// Email login. With DEV_PASSWORDLESS enabled, unknown emails are created on
/// the fly; otherwise they are rejected.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = validate_email(&req.email)?;

    let existing = sqlx::query("SELECT id, email, name FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&state.pool)
        .await?;

    let user = match existing {
        Some(row) => UserResponse {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
        },
        None if state.config.dev_passwordless => upsert_user(&state, email, None, None).await?,
        None => return Err(ApiError::InvalidCredentials),
    };

    Ok(Json(auth_response(&state, user).await?))
}

#[derive(Debug, Deserialize)]
struct GoogleTokenInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    aud: Option<String>,
}

/// Google ID-token sign-in: the token is verified against Google's tokeninfo
/// endpoint, then the user is upserted by the verified email.
pub async fn google_sign_in(
    State(state): State<AppState>,
    Json(req): Json<GoogleSignInRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let response = state
        .http
        .get("https://oauth2.googleapis.com/tokeninfo")
        .query(&[("id_token", req.id_token.as_str())])
        .send()
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "Google tokeninfo request failed");
            ApiError::InvalidToken
        })?;

    if !response.status().is_success() {
        return Err(ApiError::InvalidToken);
    }

    let info: GoogleTokenInfo = response.json().await.map_err(|_| ApiError::InvalidToken)?;

    if let Some(expected) = &state.config.google_audience {
        if info.aud.as_deref() != Some(expected.as_str()) {
            tracing::warn!("Google ID token audience mismatch");
            return Err(ApiError::InvalidToken);
        }
    }

    let email = info.email.ok_or(ApiError::InvalidToken)?;
    let email = validate_email(&email)?;
    let user = upsert_user(&state, email, info.name.as_deref(), Some(&info.sub)).await?;
    tracing::info!(user_id = %user.id, "Google sign-in");
    Ok(Json(auth_response(&state, user).await?))
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: UserResponse,
    pub subscription: SubscriptionSummary,
}

/// Current user profile plus subscription summary
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<MeResponse>> {
    let row = sqlx::query("SELECT id, email, name FROM users WHERE id = $1")
        .bind(auth.user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    let user = UserResponse {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
    };
    let subscription = state.quota.summary(auth.user_id).await?;

    Ok(Json(MeResponse { user, subscription }))
}
