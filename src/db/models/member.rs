//! Member, session, and auth DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::MembershipStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub student_id: String,
    pub semester: String,
    pub year: Option<i32>,
    pub phone: Option<String>,
    pub course: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<String>,
    pub role: String,
    pub status: String,
    pub joined_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Member {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    pub fn membership_status(&self) -> Option<MembershipStatus> {
        self.status.parse().ok()
    }
}

/// Response DTO that excludes the credential hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub student_id: String,
    pub semester: String,
    pub year: Option<i32>,
    pub phone: Option<String>,
    pub course: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<String>,
    pub role: String,
    pub status: String,
    pub joined_at: String,
}

impl From<Member> for MemberResponse {
    fn from(member: Member) -> Self {
        Self {
            id: member.id,
            name: member.name,
            email: member.email,
            student_id: member.student_id,
            semester: member.semester,
            year: member.year,
            phone: member.phone,
            course: member.course,
            gender: member.gender,
            address: member.address,
            date_of_birth: member.date_of_birth,
            role: member.role,
            status: member.status,
            joined_at: member.joined_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub member_id: String,
    pub token_hash: String,
    pub expires_at: String,
    pub created_at: String,
}

/// Raw registration form payload.
///
/// Every field is defaulted so a missing or mistyped key surfaces as a
/// field-level validation error instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub semester: String,
    /// Arrives as a string from the form; coerced to an integer.
    #[serde(default)]
    pub year: Option<serde_json::Value>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub accept_terms: bool,
    #[serde(default)]
    pub accept_physical_verification: bool,
    #[serde(default)]
    pub accept_association_rules: bool,
}

/// Fully validated and normalized registration candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMember {
    pub name: String,
    pub email: String,
    pub password: String,
    pub student_id: String,
    pub semester: String,
    pub year: Option<i32>,
    pub phone: Option<String>,
    pub course: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<chrono::NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub member: MemberResponse,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: MembershipStatus,
}
