use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    transitions, AttendancePreview, AttendancePreviewQuery, AttendanceRequest,
    CreateEventRegistrationRequest, CreateEventRequest, Event, EventListQuery, EventRegistration,
    Member, MembershipStatus, NewEvent, UpdateEventRequest,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    parse_datetime, run_refinements, validate_description, validate_identifier, validate_location,
    validate_message, validate_name, validate_phone, validate_title, EventDates, EVENT_DATE_RULES,
};

/// Parse the submitted date fields, reporting format problems on the
/// field they belong to. Empty strings count as not supplied.
fn parse_event_dates(
    event_date: &Option<String>,
    start_date: &Option<String>,
    end_date: &Option<String>,
    errors: &mut ValidationErrorBuilder,
) -> EventDates {
    let mut parse = |value: &Option<String>, path: &'static str| -> Option<DateTime<Utc>> {
        match value {
            Some(s) if !s.trim().is_empty() => match parse_datetime(s) {
                Ok(dt) => Some(dt),
                Err(e) => {
                    errors.add(path, e);
                    None
                }
            },
            _ => None,
        }
    };

    let event_date = parse(event_date, "eventDate");
    let start_date = parse(start_date, "startDate");
    let end_date = parse(end_date, "endDate");

    EventDates {
        event_date,
        start_date,
        end_date,
        now: Utc::now(),
    }
}

/// Validate a CreateEventRequest
fn validate_create_request(req: &CreateEventRequest) -> Result<NewEvent, ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_title(&req.title) {
        errors.add("title", e);
    }

    if let Err(e) = validate_description(&req.description) {
        errors.add("description", e);
    }

    if let Err(e) = validate_location(&req.location) {
        errors.add("location", e);
    }

    let dates = parse_event_dates(&req.event_date, &req.start_date, &req.end_date, &mut errors);
    run_refinements(&dates, EVENT_DATE_RULES, &mut errors);

    errors.finish("Invalid event data")?;

    Ok(NewEvent {
        title: req.title.trim().to_string(),
        description: req.description.clone().filter(|s| !s.is_empty()),
        location: req.location.clone().filter(|s| !s.is_empty()),
        event_date: dates.event_date,
        start_date: dates.start_date,
        end_date: dates.end_date,
    })
}

/// Validate an UpdateEventRequest (only validates provided fields; the
/// cross-field date rules see exactly what was submitted)
fn validate_update_request(req: &UpdateEventRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref title) = req.title {
        if let Err(e) = validate_title(title) {
            errors.add("title", e);
        }
    }

    if let Err(e) = validate_description(&req.description) {
        errors.add("description", e);
    }

    if let Err(e) = validate_location(&req.location) {
        errors.add("location", e);
    }

    let dates = parse_event_dates(&req.event_date, &req.start_date, &req.end_date, &mut errors);
    run_refinements(&dates, EVENT_DATE_RULES, &mut errors);

    errors.finish("Invalid event data")
}

/// Helper to merge optional string values
/// - None means "don't change" -> keep existing
/// - Some("") means "clear" -> set to None
/// - Some(value) means "set" -> use the value
fn merge_optional_string(new_val: &Option<String>, existing: &Option<String>) -> Option<String> {
    match new_val {
        Some(s) if s.is_empty() => None,
        Some(s) => Some(s.clone()),
        None => existing.clone(),
    }
}

/// Merge a date field, normalizing submitted values to RFC 3339
fn merge_date(new_val: &Option<String>, existing: &Option<String>) -> Option<String> {
    match new_val {
        Some(s) if s.trim().is_empty() => None,
        Some(s) => parse_datetime(s).ok().map(|dt| dt.to_rfc3339()),
        None => existing.clone(),
    }
}

/// List events
///
/// GET /api/events?upcoming=true
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventListQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let events: Vec<Event> = if query.upcoming {
        let now = Utc::now().to_rfc3339();
        sqlx::query_as(
            r#"
            SELECT * FROM events
            WHERE COALESCE(event_date, start_date) > ?
            ORDER BY COALESCE(event_date, start_date) ASC
            "#,
        )
        .bind(&now)
        .fetch_all(&state.db)
        .await?
    } else {
        sqlx::query_as("SELECT * FROM events ORDER BY COALESCE(event_date, start_date, created_at) ASC")
            .fetch_all(&state.db)
            .await?
    };

    Ok(Json(events))
}

/// Get a single event
///
/// GET /api/events/:id
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    let event: Event = sqlx::query_as("SELECT * FROM events WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;

    Ok(Json(event))
}

/// Create an event
///
/// POST /api/events
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    admin: Member,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let candidate = validate_create_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO events (id, title, description, location, event_date, start_date, end_date, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&candidate.title)
    .bind(&candidate.description)
    .bind(&candidate.location)
    .bind(candidate.event_date.map(|d| d.to_rfc3339()))
    .bind(candidate.start_date.map(|d| d.to_rfc3339()))
    .bind(candidate.end_date.map(|d| d.to_rfc3339()))
    .bind(&admin.id)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let event: Event = sqlx::query_as("SELECT * FROM events WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(event_id = %id, title = %event.title, "Event created");

    Ok((StatusCode::CREATED, Json(event)))
}

/// Update an event
///
/// PUT /api/events/:id
pub async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<Json<Event>, ApiError> {
    validate_update_request(&req)?;

    let existing: Event = sqlx::query_as("SELECT * FROM events WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;

    let title = req.title.clone().unwrap_or(existing.title.clone());
    let description = merge_optional_string(&req.description, &existing.description);
    let location = merge_optional_string(&req.location, &existing.location);
    let event_date = merge_date(&req.event_date, &existing.event_date);
    let start_date = merge_date(&req.start_date, &existing.start_date);
    let end_date = merge_date(&req.end_date, &existing.end_date);
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE events
        SET title = ?, description = ?, location = ?, event_date = ?, start_date = ?, end_date = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&title)
    .bind(&description)
    .bind(&location)
    .bind(&event_date)
    .bind(&start_date)
    .bind(&end_date)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let event: Event = sqlx::query_as("SELECT * FROM events WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(event))
}

/// Delete an event
///
/// DELETE /api/events/:id
pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Event not found"));
    }

    tracing::info!(event_id = %id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Validate an event signup payload
fn validate_registration_request(
    req: &CreateEventRegistrationRequest,
    event_id: &str,
    member_id: &str,
) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_name(&req.name) {
        errors.add("name", e);
    }

    if let Err(e) = validate_phone(&req.phone) {
        errors.add("phone", e);
    }

    if let Err(e) = validate_message(&req.message) {
        errors.add("message", e);
    }

    if let Err(e) = validate_identifier(event_id, "Event id") {
        errors.add("eventId", e);
    }

    if let Err(e) = validate_identifier(member_id, "User id") {
        errors.add("userId", e);
    }

    errors.finish("Invalid event registration data")
}

/// Register the current member for an event
///
/// POST /api/events/:id/register
pub async fn register_for_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    member: Member,
    Json(req): Json<CreateEventRegistrationRequest>,
) -> Result<(StatusCode, Json<EventRegistration>), ApiError> {
    if member.membership_status() != Some(MembershipStatus::Active) {
        return Err(ApiError::forbidden("Membership not yet approved"));
    }

    validate_registration_request(&req, &event_id, &member.id)?;

    let event: Option<(String,)> = sqlx::query_as("SELECT id FROM events WHERE id = ?")
        .bind(&event_id)
        .fetch_optional(&state.db)
        .await?;
    if event.is_none() {
        return Err(ApiError::not_found("Event not found"));
    }

    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM event_registrations WHERE event_id = ? AND member_id = ?")
            .bind(&event_id)
            .bind(&member.id)
            .fetch_optional(&state.db)
            .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("Already registered for this event"));
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO event_registrations (id, event_id, member_id, name, phone, message, attended, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&event_id)
    .bind(&member.id)
    .bind(req.name.trim())
    .bind(req.phone.as_deref().map(|s| s.trim()).filter(|s| !s.is_empty()))
    .bind(req.message.as_deref().filter(|s| !s.is_empty()))
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| {
        let msg = e.to_string();
        if msg.contains("UNIQUE constraint failed") {
            ApiError::conflict("Already registered for this event")
        } else if msg.contains("FOREIGN KEY constraint failed") {
            ApiError::bad_request("Referenced record does not exist")
        } else {
            tracing::error!("Failed to create event registration: {}", e);
            ApiError::database()
        }
    })?;

    let registration: EventRegistration =
        sqlx::query_as("SELECT * FROM event_registrations WHERE id = ?")
            .bind(&id)
            .fetch_one(&state.db)
            .await?;

    tracing::info!(event_id = %event_id, member_id = %member.id, "Event registration created");

    Ok((StatusCode::CREATED, Json(registration)))
}

/// The current member's own event registrations
///
/// GET /api/me/registrations
pub async fn my_registrations(
    State(state): State<Arc<AppState>>,
    member: Member,
) -> Result<Json<Vec<EventRegistration>>, ApiError> {
    let registrations: Vec<EventRegistration> =
        sqlx::query_as("SELECT * FROM event_registrations WHERE member_id = ? ORDER BY created_at DESC")
            .bind(&member.id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(registrations))
}

/// Attendance list for an event
///
/// GET /api/events/:id/registrations
pub async fn list_event_registrations(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> Result<Json<Vec<EventRegistration>>, ApiError> {
    let event: Option<(String,)> = sqlx::query_as("SELECT id FROM events WHERE id = ?")
        .bind(&event_id)
        .fetch_optional(&state.db)
        .await?;
    if event.is_none() {
        return Err(ApiError::not_found("Event not found"));
    }

    let registrations: Vec<EventRegistration> =
        sqlx::query_as("SELECT * FROM event_registrations WHERE event_id = ? ORDER BY created_at ASC")
            .bind(&event_id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(registrations))
}

/// Staged attendance confirmation: names the affected person and the
/// resulting state without mutating anything
///
/// GET /api/event-registrations/:id/attendance?attended=true
pub async fn attendance_preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<AttendancePreviewQuery>,
) -> Result<Json<AttendancePreview>, ApiError> {
    let registration: EventRegistration =
        sqlx::query_as("SELECT * FROM event_registrations WHERE id = ?")
            .bind(&id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| ApiError::not_found("Event registration not found"))?;

    Ok(Json(AttendancePreview {
        registrant: registration.name,
        resulting_label: crate::db::attendance_label(query.attended).to_string(),
    }))
}

/// Commit the staged attendance toggle
///
/// PUT /api/event-registrations/:id/attendance
pub async fn set_attendance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AttendanceRequest>,
) -> Result<Json<EventRegistration>, ApiError> {
    let transition = transitions::set_attendance(&state.db, &id, req.attended).await?;

    if transition.changed {
        tracing::info!(registration_id = %id, attended = req.attended, "Attendance updated");
    }

    Ok(Json(transition.record))
}
