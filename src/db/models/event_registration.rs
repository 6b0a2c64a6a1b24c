//! Event registration models and the attendance confirmation DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EventRegistration {
    pub id: String,
    pub event_id: String,
    pub member_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub attended: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Raw signup payload posted by a member for a specific event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRegistrationRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Commit body for the attendance toggle.
#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub attended: bool,
}

#[derive(Debug, Deserialize)]
pub struct AttendancePreviewQuery {
    pub attended: bool,
}

/// Staged confirmation shown to the admin before the toggle commits,
/// naming the affected person and the resulting state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendancePreview {
    pub registrant: String,
    pub resulting_label: String,
}

/// Human label for an attendance value.
pub fn attendance_label(attended: bool) -> &'static str {
    if attended {
        "Attended"
    } else {
        "Not Attended"
    }
}
