//! Ownership guard
//!
//! Every content operation is scoped to a creator through the ownership
//! chain subject -> certificate -> creator. The guard resolves that chain in
//! a single join; a record that exists but belongs to another creator is
//! indistinguishable from a missing one.

use crate::db::models::{Chapter, Question, Subject};
use crate::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Verify that a subject exists and is owned by the requesting creator
pub async fn verify_subject_ownership(
    db: &SqlitePool,
    subject_id: Uuid,
    creator_id: Uuid,
) -> Result<Subject> {
    let row = sqlx::query(
        r#"
        SELECT s.id, s.certificate_id, s.name, s.order_index, s.created_at
        FROM subjects s
        JOIN certificates c ON s.certificate_id = c.id
        WHERE s.id = ? AND c.creator_id = ?
        "#,
    )
    .bind(subject_id.to_string())
    .bind(creator_id.to_string())
    .fetch_optional(db)
    .await?;

    match row {
        Some(row) => Subject::from_row(&row),
        None => Err(Error::NotFound("subject not found".to_string())),
    }
}

/// Fetch a chapter by id, scoped to the requesting creator
pub async fn get_chapter_for_creator(
    db: &SqlitePool,
    chapter_id: Uuid,
    creator_id: Uuid,
) -> Result<Option<Chapter>> {
    let row = sqlx::query(
        r#"
        SELECT ch.id, ch.subject_id, ch.parent_id, ch.title, ch.order_index,
               ch.depth, ch.textbook_page, ch.video_id, ch.video_start_seconds,
               ch.created_at
        FROM chapters ch
        JOIN subjects s ON ch.subject_id = s.id
        JOIN certificates c ON s.certificate_id = c.id
        WHERE ch.id = ? AND c.creator_id = ?
        "#,
    )
    .bind(chapter_id.to_string())
    .bind(creator_id.to_string())
    .fetch_optional(db)
    .await?;

    row.as_ref().map(Chapter::from_row).transpose()
}

/// Fetch a question by id, scoped to the requesting creator
pub async fn get_question_for_creator(
    db: &SqlitePool,
    question_id: Uuid,
    creator_id: Uuid,
) -> Result<Option<Question>> {
    let row = sqlx::query(
        r#"
        SELECT q.id, q.subject_id, q.chapter_id, q.content, q.options,
               q.correct_answer, q.explanation, q.textbook_page, q.order_index,
               q.created_at
        FROM questions q
        JOIN subjects s ON q.subject_id = s.id
        JOIN certificates c ON s.certificate_id = c.id
        WHERE q.id = ? AND c.creator_id = ?
        "#,
    )
    .bind(question_id.to_string())
    .bind(creator_id.to_string())
    .fetch_optional(db)
    .await?;

    row.as_ref().map(Question::from_row).transpose()
}
