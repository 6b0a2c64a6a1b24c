//! Admin-driven state transitions on persisted records.
//!
//! Each transition is a single read-modify-write against the pool: look
//! the record up, no-op when the target equals the current state, update
//! otherwise. A missing record is a typed not-found so the API layer can
//! tell stale UI state apart from real failures.

use thiserror::Error;

use super::{DbPool, EventRegistration, Member, MembershipStatus};

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Result of a transition: the record in its final state, and whether
/// the call actually changed it.
#[derive(Debug)]
pub struct Transition<T> {
    pub record: T,
    pub changed: bool,
}

/// Move a membership record to `target`.
///
/// Idempotent: a target equal to the current status returns the record
/// unchanged. No other transition is restricted; approval happens
/// post-persistence and carries no further business rule.
pub async fn set_membership_status(
    pool: &DbPool,
    member_id: &str,
    target: MembershipStatus,
) -> Result<Transition<Member>, TransitionError> {
    let member: Member = sqlx::query_as("SELECT * FROM members WHERE id = ?")
        .bind(member_id)
        .fetch_optional(pool)
        .await?
        .ok_or(TransitionError::NotFound)?;

    if member.status == target.as_str() {
        return Ok(Transition {
            record: member,
            changed: false,
        });
    }

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("UPDATE members SET status = ?, updated_at = ? WHERE id = ?")
        .bind(target.as_str())
        .bind(&now)
        .bind(member_id)
        .execute(pool)
        .await?;

    let updated: Member = sqlx::query_as("SELECT * FROM members WHERE id = ?")
        .bind(member_id)
        .fetch_one(pool)
        .await?;

    Ok(Transition {
        record: updated,
        changed: true,
    })
}

/// Set an event registration's `attended` flag.
///
/// Both directions are permitted; setting the current value again is a
/// no-op.
pub async fn set_attendance(
    pool: &DbPool,
    registration_id: &str,
    attended: bool,
) -> Result<Transition<EventRegistration>, TransitionError> {
    let registration: EventRegistration =
        sqlx::query_as("SELECT * FROM event_registrations WHERE id = ?")
            .bind(registration_id)
            .fetch_optional(pool)
            .await?
            .ok_or(TransitionError::NotFound)?;

    if registration.attended == attended {
        return Ok(Transition {
            record: registration,
            changed: false,
        });
    }

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("UPDATE event_registrations SET attended = ?, updated_at = ? WHERE id = ?")
        .bind(attended)
        .bind(&now)
        .bind(registration_id)
        .execute(pool)
        .await?;

    let updated: EventRegistration =
        sqlx::query_as("SELECT * FROM event_registrations WHERE id = ?")
            .bind(registration_id)
            .fetch_one(pool)
            .await?;

    Ok(Transition {
        record: updated,
        changed: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn insert_member(pool: &DbPool, id: &str, email: &str, student_id: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO members (id, name, email, password_hash, student_id, semester, joined_at, created_at, updated_at)
            VALUES (?, ?, ?, 'x', ?, '2025/1', ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(format!("Member {}", id))
        .bind(email)
        .bind(student_id)
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn insert_registration(pool: &DbPool, id: &str, event_id: &str, member_id: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO events (id, title, created_at, updated_at) VALUES (?, 'Meetup', ?, ?)",
        )
        .bind(event_id)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            r#"
            INSERT INTO event_registrations (id, event_id, member_id, name, created_at, updated_at)
            VALUES (?, ?, ?, 'Someone', ?, ?)
            "#,
        )
        .bind(id)
        .bind(event_id)
        .bind(member_id)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_membership_not_found() {
        let pool = db::init_test().await;
        let err = set_membership_status(&pool, "missing", MembershipStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::NotFound));
    }

    #[tokio::test]
    async fn test_membership_approval() {
        let pool = db::init_test().await;
        insert_member(&pool, "m1", "a@example.com", "S-1").await;

        let t = set_membership_status(&pool, "m1", MembershipStatus::Active)
            .await
            .unwrap();
        assert!(t.changed);
        assert_eq!(t.record.status, "active");

        // Approving an already-active member is a no-op
        let t = set_membership_status(&pool, "m1", MembershipStatus::Active)
            .await
            .unwrap();
        assert!(!t.changed);
        assert_eq!(t.record.status, "active");
    }

    #[tokio::test]
    async fn test_membership_rejection() {
        let pool = db::init_test().await;
        insert_member(&pool, "m2", "b@example.com", "S-2").await;

        let t = set_membership_status(&pool, "m2", MembershipStatus::Rejected)
            .await
            .unwrap();
        assert!(t.changed);
        assert_eq!(t.record.status, "rejected");
    }

    #[tokio::test]
    async fn test_attendance_toggle_is_idempotent() {
        let pool = db::init_test().await;
        insert_member(&pool, "m3", "c@example.com", "S-3").await;
        insert_registration(&pool, "r1", "e1", "m3").await;

        let t = set_attendance(&pool, "r1", true).await.unwrap();
        assert!(t.changed);
        assert!(t.record.attended);

        let t = set_attendance(&pool, "r1", true).await.unwrap();
        assert!(!t.changed);
        assert!(t.record.attended);

        // And back again: the toggle is not one-way
        let t = set_attendance(&pool, "r1", false).await.unwrap();
        assert!(t.changed);
        assert!(!t.record.attended);
    }

    #[tokio::test]
    async fn test_attendance_not_found() {
        let pool = db::init_test().await;
        let err = set_attendance(&pool, "missing", true).await.unwrap_err();
        assert!(matches!(err, TransitionError::NotFound));
    }
}
