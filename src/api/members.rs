use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    transitions, ApiMessage, Member, MemberResponse, MembershipStatus, NewMember, RegisterRequest,
    UpdateStatusRequest,
};
use crate::AppState;

use super::auth::hash_password;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    coerce_year, parse_date, validate_email, validate_name, validate_password, validate_phone,
    validate_semester, validate_student_id,
};

/// Normalize an optional form field: trimmed, empty collapses to absent.
fn normalize_optional(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Validate a registration form payload and produce the normalized
/// candidate.
///
/// Field checks run in declaration order and all failures accumulate;
/// the password-confirmation rule only fires once the password itself is
/// structurally valid, and its error lands on `confirmPassword`.
fn validate_register_request(req: &RegisterRequest) -> Result<NewMember, ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_name(&req.name) {
        errors.add("name", e);
    }

    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }

    if let Err(e) = validate_password(&req.password) {
        errors.add("password", e);
    }

    if !errors.has_error("password") && req.confirm_password != req.password {
        errors.add("confirmPassword", "Passwords do not match");
    }

    if let Err(e) = validate_student_id(&req.student_id) {
        errors.add("studentId", e);
    }

    if let Err(e) = validate_semester(&req.semester) {
        errors.add("semester", e);
    }

    let year = match coerce_year(&req.year) {
        Ok(y) => y,
        Err(e) => {
            errors.add("year", e);
            None
        }
    };

    if let Err(e) = validate_phone(&req.phone) {
        errors.add("phone", e);
    }

    let date_of_birth = match &req.date_of_birth {
        Some(s) if !s.trim().is_empty() => match parse_date(s) {
            Ok(d) => Some(d),
            Err(e) => {
                errors.add("dateOfBirth", e);
                None
            }
        },
        _ => None,
    };

    if !req.accept_terms {
        errors.add("acceptTerms", "You must accept the terms and conditions");
    }

    if !req.accept_physical_verification {
        errors.add(
            "acceptPhysicalVerification",
            "You must consent to physical verification",
        );
    }

    if !req.accept_association_rules {
        errors.add(
            "acceptAssociationRules",
            "You must accept the association rules",
        );
    }

    errors.finish("Invalid registration data")?;

    Ok(NewMember {
        name: req.name.trim().to_string(),
        email: req.email.trim().to_string(),
        password: req.password.clone(),
        student_id: req.student_id.trim().to_string(),
        semester: req.semester.trim().to_string(),
        year,
        phone: normalize_optional(&req.phone),
        course: normalize_optional(&req.course),
        gender: normalize_optional(&req.gender),
        address: normalize_optional(&req.address),
        date_of_birth,
    })
}

/// Public registration endpoint
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiMessage>), ApiError> {
    let candidate = validate_register_request(&req)?;

    // Fast-path conflict check. The UNIQUE columns on email/student_id
    // remain the hard guarantee under concurrent duplicate submissions.
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM members WHERE email = ? OR student_id = ?")
            .bind(&candidate.email)
            .bind(&candidate.student_id)
            .fetch_optional(&state.db)
            .await?;

    if existing.is_some() {
        return Err(ApiError::conflict("User already exists"));
    }

    let id = Uuid::new_v4().to_string();
    let password_hash = hash_password(&candidate.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal()
    })?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO members (id, name, email, password_hash, student_id, semester, year, phone, course, gender, address, date_of_birth, role, status, joined_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'member', 'pending', ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&candidate.name)
    .bind(&candidate.email)
    .bind(&password_hash)
    .bind(&candidate.student_id)
    .bind(&candidate.semester)
    .bind(candidate.year)
    .bind(&candidate.phone)
    .bind(&candidate.course)
    .bind(&candidate.gender)
    .bind(&candidate.address)
    .bind(candidate.date_of_birth.map(|d| d.to_string()))
    .bind(&now)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::conflict("User already exists")
        } else {
            tracing::error!("Failed to create member: {}", e);
            ApiError::database()
        }
    })?;

    tracing::info!(member_id = %id, email = %candidate.email, "Member registered, awaiting approval");

    if state.mailer.is_enabled() {
        let mailer = state.mailer.clone();
        let to = candidate.email.clone();
        let name = candidate.name.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_registration_received(&to, &name).await {
                tracing::warn!("Failed to send registration email: {}", e);
            }
        });
    }

    Ok((
        StatusCode::CREATED,
        Json(ApiMessage::ok(
            "Registration successful. Await admin approval.",
        )),
    ))
}

#[derive(Debug, Deserialize)]
pub struct MemberListQuery {
    pub status: Option<MembershipStatus>,
}

/// List members, optionally filtered by status
///
/// GET /api/members?status=pending
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MemberListQuery>,
) -> Result<Json<Vec<MemberResponse>>, ApiError> {
    let members: Vec<Member> = match query.status {
        Some(status) => {
            sqlx::query_as("SELECT * FROM members WHERE status = ? ORDER BY created_at DESC")
                .bind(status.as_str())
                .fetch_all(&state.db)
                .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM members ORDER BY created_at DESC")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(members.into_iter().map(MemberResponse::from).collect()))
}

/// Get a single member
///
/// GET /api/members/:id
pub async fn get_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MemberResponse>, ApiError> {
    let member: Member = sqlx::query_as("SELECT * FROM members WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Member not found"))?;

    Ok(Json(MemberResponse::from(member)))
}

/// Approve or reject a member
///
/// PUT /api/members/:id/status
pub async fn update_member_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<MemberResponse>, ApiError> {
    let transition = transitions::set_membership_status(&state.db, &id, req.status).await?;

    if transition.changed {
        tracing::info!(member_id = %id, status = %req.status, "Membership status updated");
    }

    if transition.changed && req.status == MembershipStatus::Active && state.mailer.is_enabled() {
        let mailer = state.mailer.clone();
        let to = transition.record.email.clone();
        let name = transition.record.name.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_membership_approved(&to, &name).await {
                tracing::warn!("Failed to send approval email: {}", e);
            }
        });
    }

    Ok(Json(MemberResponse::from(transition.record)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn valid_payload() -> serde_json::Value {
        serde_json::json!({
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "password": "secret1",
            "confirmPassword": "secret1",
            "studentId": "STU-1815",
            "semester": "2026/1",
            "year": "2026",
            "acceptTerms": true,
            "acceptPhysicalVerification": true,
            "acceptAssociationRules": true
        })
    }

    fn request_from(value: &serde_json::Value) -> RegisterRequest {
        serde_json::from_value(value.clone()).unwrap()
    }

    fn error_paths(err: ApiError) -> Vec<String> {
        err.field_errors().iter().map(|e| e.path.clone()).collect()
    }

    #[test]
    fn test_valid_registration_normalizes() {
        let candidate = validate_register_request(&request_from(&valid_payload())).unwrap();
        assert_eq!(candidate.name, "Ada Lovelace");
        assert_eq!(candidate.year, Some(2026));
        assert_eq!(candidate.phone, None);
        assert_eq!(candidate.date_of_birth, None);
    }

    #[test]
    fn test_missing_acknowledgement_flags_reported_individually() {
        for (key, path) in [
            ("acceptTerms", "acceptTerms"),
            ("acceptPhysicalVerification", "acceptPhysicalVerification"),
            ("acceptAssociationRules", "acceptAssociationRules"),
        ] {
            let mut payload = valid_payload();
            payload[key] = serde_json::json!(false);
            let err = validate_register_request(&request_from(&payload)).unwrap_err();
            assert_eq!(error_paths(err), vec![path.to_string()], "flag {}", key);
        }
    }

    #[test]
    fn test_password_mismatch_lands_on_confirmation_field() {
        let mut payload = valid_payload();
        payload["password"] = serde_json::json!("secret1");
        payload["confirmPassword"] = serde_json::json!("secret2");
        let err = validate_register_request(&request_from(&payload)).unwrap_err();
        assert_eq!(error_paths(err), vec!["confirmPassword".to_string()]);
    }

    #[test]
    fn test_short_password_skips_confirmation_rule() {
        let mut payload = valid_payload();
        payload["password"] = serde_json::json!("abc");
        payload["confirmPassword"] = serde_json::json!("xyz");
        let err = validate_register_request(&request_from(&payload)).unwrap_err();
        // Only the structural password error; the cross-field rule waits
        // for a structurally valid password.
        assert_eq!(error_paths(err), vec!["password".to_string()]);
    }

    #[test]
    fn test_unrelated_field_errors_accumulate() {
        let mut payload = valid_payload();
        payload["name"] = serde_json::json!("A");
        payload["email"] = serde_json::json!("not-an-email");
        payload["year"] = serde_json::json!("soon");
        let err = validate_register_request(&request_from(&payload)).unwrap_err();
        assert_eq!(
            error_paths(err),
            vec!["name".to_string(), "email".to_string(), "year".to_string()]
        );
    }

    #[test]
    fn test_absent_year_stays_absent() {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().remove("year");
        let candidate = validate_register_request(&request_from(&payload)).unwrap();
        assert_eq!(candidate.year, None);
    }

    #[test]
    fn test_date_of_birth_is_coerced() {
        let mut payload = valid_payload();
        payload["dateOfBirth"] = serde_json::json!("2004-03-17");
        let candidate = validate_register_request(&request_from(&payload)).unwrap();
        assert_eq!(
            candidate.date_of_birth,
            Some(chrono::NaiveDate::from_ymd_opt(2004, 3, 17).unwrap())
        );

        payload["dateOfBirth"] = serde_json::json!("17.03.2004");
        let err = validate_register_request(&request_from(&payload)).unwrap_err();
        assert_eq!(error_paths(err), vec!["dateOfBirth".to_string()]);
    }

    async fn test_app() -> axum::Router {
        let pool = crate::db::init_test().await;
        let mut config = Config::default();
        config.auth.api_token = "test-operator-token".to_string();
        create_router(Arc::new(AppState::new(config, pool)))
    }

    async fn post_json(app: &axum::Router, uri: &str, body: &serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_register_endpoint_success() {
        let app = test_app().await;
        let (status, body) = post_json(&app, "/api/auth/register", &valid_payload()).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], serde_json::json!(true));
        assert_eq!(
            body["message"],
            serde_json::json!("Registration successful. Await admin approval.")
        );
    }

    #[tokio::test]
    async fn test_register_endpoint_validation_failure() {
        let app = test_app().await;
        let mut payload = valid_payload();
        payload["acceptTerms"] = serde_json::json!(false);

        let (status, body) = post_json(&app, "/api/auth/register", &payload).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], serde_json::json!(false));
        assert_eq!(body["message"], serde_json::json!("Invalid registration data"));
        assert_eq!(body["errors"][0]["path"], serde_json::json!("acceptTerms"));
    }

    #[tokio::test]
    async fn test_register_endpoint_duplicate_student_id_conflicts() {
        let app = test_app().await;
        let (status, _) = post_json(&app, "/api/auth/register", &valid_payload()).await;
        assert_eq!(status, StatusCode::CREATED);

        // Same student id, different email, otherwise well-formed
        let mut payload = valid_payload();
        payload["email"] = serde_json::json!("someone.else@example.com");

        let (status, body) = post_json(&app, "/api/auth/register", &payload).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], serde_json::json!(false));
        assert_eq!(body["message"], serde_json::json!("User already exists"));
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let app = test_app().await;
        let (status, _) = post_json(&app, "/api/auth/register", &valid_payload()).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = post_json(
            &app,
            "/api/auth/login",
            &serde_json::json!({"email": "ada@example.com", "password": "wrong-password"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = post_json(
            &app,
            "/api/auth/login",
            &serde_json::json!({"email": "ada@example.com", "password": "secret1"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].as_str().unwrap().len() > 32);
        assert_eq!(body["member"]["status"], serde_json::json!("pending"));
    }
}
