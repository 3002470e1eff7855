//! Shared fixtures for in-module tests

use crate::db::init::create_schema;
use chrono::Utc;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;

/// Identifiers of a seeded creator/certificate/subject chain
pub(crate) struct SubjectFixture {
    pub creator_id: Uuid,
    pub subject_id: Uuid,
}

/// Fresh in-memory database with the full schema
///
/// Single connection: an in-memory SQLite database is per-connection, so a
/// wider pool would hand out connections without the schema.
pub(crate) async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();

    create_schema(&pool).await.unwrap();
    pool
}

/// Seed a creator, a certificate, and one subject under it
pub(crate) async fn seed_subject(db: &SqlitePool, subject_name: &str) -> SubjectFixture {
    let creator_id = Uuid::new_v4();
    let certificate_id = Uuid::new_v4();
    let subject_id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query("INSERT INTO creators (id, email, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(creator_id.to_string())
        .bind(format!("{creator_id}@example.com"))
        .bind("Test Creator")
        .bind(now)
        .execute(db)
        .await
        .unwrap();

    sqlx::query("INSERT INTO certificates (id, creator_id, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(certificate_id.to_string())
        .bind(creator_id.to_string())
        .bind("Test Certificate")
        .bind(now)
        .execute(db)
        .await
        .unwrap();

    sqlx::query(
        "INSERT INTO subjects (id, certificate_id, name, order_index, created_at) VALUES (?, ?, ?, 0, ?)",
    )
    .bind(subject_id.to_string())
    .bind(certificate_id.to_string())
    .bind(subject_name)
    .bind(now)
    .execute(db)
    .await
    .unwrap();

    SubjectFixture {
        creator_id,
        subject_id,
    }
}

/// Seed a video under the given subject
pub(crate) async fn seed_video(db: &SqlitePool, subject_id: Uuid) -> Uuid {
    let video_id = Uuid::new_v4();
    sqlx::query("INSERT INTO videos (id, subject_id, title, created_at) VALUES (?, ?, ?, ?)")
        .bind(video_id.to_string())
        .bind(subject_id.to_string())
        .bind("Lecture 1")
        .bind(Utc::now())
        .execute(db)
        .await
        .unwrap();
    video_id
}
