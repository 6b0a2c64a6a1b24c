use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::config::AuthConfig;
use crate::db::{
    DbPool, LoginRequest, LoginResponse, Member, MemberResponse, MembershipStatus, Session,
};
use crate::AppState;

use super::error::ApiError;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random session token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create a session for a member and return the opaque token
async fn create_session(pool: &DbPool, member_id: &str) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let token_hash = hash_token(&token);

    // Sessions are valid for 7 days
    let expires_at = (chrono::Utc::now() + chrono::Duration::days(7)).to_rfc3339();
    let session_id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO sessions (id, member_id, token_hash, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&session_id)
    .bind(member_id)
    .bind(&token_hash)
    .bind(&expires_at)
    .execute(pool)
    .await?;

    Ok(token)
}

/// Login endpoint
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let member: Option<Member> = sqlx::query_as("SELECT * FROM members WHERE email = ?")
        .bind(request.email.trim())
        .fetch_optional(&state.db)
        .await?;

    let member = member.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&request.password, &member.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    // Pending members may log in (the dashboard shows their approval
    // state); rejected members may not.
    if member.membership_status() == Some(MembershipStatus::Rejected) {
        return Err(ApiError::forbidden("Membership has been rejected"));
    }

    let token = create_session(&state.db, &member.id).await?;

    tracing::info!(member_id = %member.id, "Member logged in");

    Ok(Json(LoginResponse {
        token,
        member: MemberResponse::from(member),
    }))
}

/// Validate token endpoint
///
/// GET /api/auth/validate
pub async fn validate(State(state): State<Arc<AppState>>, request: Request<Body>) -> StatusCode {
    let token = match extract_token(request.headers()) {
        Some(t) => t,
        None => return StatusCode::UNAUTHORIZED,
    };

    match get_current_member(&state.db, &state.config.auth, &token).await {
        Ok(_) => StatusCode::OK,
        Err(status) => status,
    }
}

/// Current member profile
///
/// GET /api/auth/me
pub async fn me(member: Member) -> Json<MemberResponse> {
    Json(MemberResponse::from(member))
}

/// Auth middleware: any valid session (or the operator token) passes
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    get_current_member(&state.db, &state.config.auth, &token)
        .await
        .map_err(|_| ApiError::unauthorized("Invalid or expired session"))?;

    Ok(next.run(request).await)
}

/// Admin middleware: requires an admin role (or the operator token)
pub async fn admin_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let member = get_current_member(&state.db, &state.config.auth, &token)
        .await
        .map_err(|_| ApiError::unauthorized("Invalid or expired session"))?;

    if !member.is_admin() {
        return Err(ApiError::forbidden("Admin access required"));
    }

    Ok(next.run(request).await)
}

/// Extract the token from request headers
fn extract_token(headers: &axum::http::HeaderMap) -> Option<String> {
    // Try Authorization header first
    if let Some(auth_header) = headers.get("Authorization").and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    // Fall back to X-API-Key header
    headers
        .get("X-API-Key")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}

/// Get the current member from a token
pub async fn get_current_member(
    pool: &DbPool,
    auth: &AuthConfig,
    token: &str,
) -> Result<Member, StatusCode> {
    // Operator token gets a synthetic admin identity. Constant-time
    // comparison to prevent timing attacks.
    let api_token = auth.api_token.as_bytes();
    let provided = token.as_bytes();
    if api_token.len() == provided.len() && api_token.ct_eq(provided).into() {
        let now = chrono::Utc::now().to_rfc3339();
        return Ok(Member {
            id: "system".to_string(),
            name: "System Admin".to_string(),
            email: "system@rostr.local".to_string(),
            password_hash: String::new(),
            student_id: String::new(),
            semester: String::new(),
            year: None,
            phone: None,
            course: None,
            gender: None,
            address: None,
            date_of_birth: None,
            role: "admin".to_string(),
            status: "active".to_string(),
            joined_at: now.clone(),
            created_at: now.clone(),
            updated_at: now,
        });
    }

    let token_hash = hash_token(token);
    let session: Option<Session> = sqlx::query_as(
        "SELECT * FROM sessions WHERE token_hash = ? AND expires_at > datetime('now')",
    )
    .bind(&token_hash)
    .fetch_optional(pool)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let session = session.ok_or(StatusCode::UNAUTHORIZED)?;

    let member: Option<Member> = sqlx::query_as("SELECT * FROM members WHERE id = ?")
        .bind(&session.member_id)
        .fetch_optional(pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    member.ok_or(StatusCode::UNAUTHORIZED)
}

/// Extractor for the current authenticated member
#[async_trait]
impl FromRequestParts<Arc<AppState>> for Member {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication required").into_response())?;
        get_current_member(&state.db, &state.config.auth, &token)
            .await
            .map_err(|_| ApiError::unauthorized("Invalid or expired session").into_response())
    }
}

/// Ensure the bootstrap admin account exists (idempotent)
pub async fn ensure_admin_user(pool: &DbPool, auth: &AuthConfig) -> anyhow::Result<()> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM members WHERE role = 'admin' LIMIT 1")
            .fetch_optional(pool)
            .await?;

    if existing.is_some() {
        return Ok(());
    }

    let generated;
    let password = match &auth.admin_password {
        Some(p) => p.as_str(),
        None => {
            generated = uuid::Uuid::new_v4().to_string();
            tracing::info!(
                "Generated admin password for {}: {}",
                auth.admin_email,
                generated
            );
            generated.as_str()
        }
    };

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO members (id, name, email, password_hash, student_id, semester, role, status, joined_at, created_at, updated_at)
        VALUES (?, 'Administrator', ?, ?, 'admin', 'staff', 'admin', 'active', ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&auth.admin_email)
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!("Created bootstrap admin account: {}", auth.admin_email);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("hunter42").unwrap();
        assert_ne!(hash, "hunter42");
        assert!(verify_password("hunter42", &hash));
        assert!(!verify_password("hunter43", &hash));
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_token_hash_is_stable_and_opaque() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[tokio::test]
    async fn test_ensure_admin_user_is_idempotent() {
        let pool = crate::db::init_test().await;
        let auth = AuthConfig {
            api_token: "t".to_string(),
            admin_email: "admin@example.com".to_string(),
            admin_password: Some("bootstrap-pass".to_string()),
        };

        ensure_admin_user(&pool, &auth).await.unwrap();
        ensure_admin_user(&pool, &auth).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM members WHERE role = 'admin'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }
}
