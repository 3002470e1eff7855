//! Mapping manager
//!
//! Associates chapters and questions with textbook pages and video
//! timestamps. The bulk question variant is deliberately lenient: items whose
//! question id does not resolve, or whose question belongs to a different
//! subject, are skipped rather than failing the batch. Callers get the
//! updated count plus the skipped ids and must treat a reduced count as a
//! partial-success signal.

use crate::db::models::{Chapter, Question};
use crate::ownership::{
    get_chapter_for_creator, get_question_for_creator, verify_subject_ownership,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

/// Question mapping fields; both are written as given (None clears)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionMappingUpdate {
    #[serde(default)]
    pub textbook_page: Option<i64>,
    #[serde(default)]
    pub chapter_id: Option<Uuid>,
}

/// One item of a bulk question mapping request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionMappingItem {
    pub question_id: Uuid,
    #[serde(default)]
    pub textbook_page: Option<i64>,
    #[serde(default)]
    pub chapter_id: Option<Uuid>,
}

/// Outcome of a bulk question mapping request
#[derive(Debug, Clone, Serialize)]
pub struct BulkMappingResult {
    pub updated_count: usize,
    /// Ids that did not resolve or belonged to another subject
    pub skipped: Vec<Uuid>,
}

/// Mapping operations for one database
pub struct MappingService {
    db: SqlitePool,
}

impl MappingService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Set or clear the textbook page of a chapter
    ///
    /// The page is not checked against the textbook's page count.
    pub async fn update_chapter_textbook(
        &self,
        chapter_id: Uuid,
        textbook_page: Option<i64>,
        creator_id: Uuid,
    ) -> Result<Chapter> {
        let mut chapter = get_chapter_for_creator(&self.db, chapter_id, creator_id)
            .await?
            .ok_or_else(|| Error::NotFound("chapter not found".to_string()))?;

        chapter.textbook_page = textbook_page;
        sqlx::query("UPDATE chapters SET textbook_page = ? WHERE id = ?")
            .bind(chapter.textbook_page)
            .bind(chapter.id.to_string())
            .execute(&self.db)
            .await?;

        Ok(chapter)
    }

    /// Set or clear the video reference and start offset of a chapter
    ///
    /// Both fields are written together. The offset is stored as given;
    /// callers wanting a non-negative guarantee validate it themselves.
    pub async fn update_chapter_video(
        &self,
        chapter_id: Uuid,
        video_id: Option<Uuid>,
        video_start_seconds: Option<i64>,
        creator_id: Uuid,
    ) -> Result<Chapter> {
        let mut chapter = get_chapter_for_creator(&self.db, chapter_id, creator_id)
            .await?
            .ok_or_else(|| Error::NotFound("chapter not found".to_string()))?;

        chapter.video_id = video_id;
        chapter.video_start_seconds = video_start_seconds;
        sqlx::query("UPDATE chapters SET video_id = ?, video_start_seconds = ? WHERE id = ?")
            .bind(chapter.video_id.map(|id| id.to_string()))
            .bind(chapter.video_start_seconds)
            .bind(chapter.id.to_string())
            .execute(&self.db)
            .await?;

        Ok(chapter)
    }

    /// Set the textbook page and chapter reference of one question
    pub async fn update_question_mapping(
        &self,
        question_id: Uuid,
        data: QuestionMappingUpdate,
        creator_id: Uuid,
    ) -> Result<Question> {
        let mut question = get_question_for_creator(&self.db, question_id, creator_id)
            .await?
            .ok_or_else(|| Error::NotFound("question not found".to_string()))?;

        question.textbook_page = data.textbook_page;
        question.chapter_id = data.chapter_id;
        self.write_question_mapping(&question).await?;

        Ok(question)
    }

    /// Apply mapping items to many questions of one subject
    ///
    /// Each item is applied as its own mutation; there is no rollback if the
    /// gateway fails partway through.
    pub async fn bulk_update_question_mapping(
        &self,
        subject_id: Uuid,
        mappings: Vec<QuestionMappingItem>,
        creator_id: Uuid,
    ) -> Result<BulkMappingResult> {
        verify_subject_ownership(&self.db, subject_id, creator_id).await?;

        let mut updated_count = 0;
        let mut skipped = Vec::new();
        for item in mappings {
            let question = self.fetch_question(item.question_id).await?;
            match question {
                Some(mut question) if question.subject_id == subject_id => {
                    question.textbook_page = item.textbook_page;
                    question.chapter_id = item.chapter_id;
                    self.write_question_mapping(&question).await?;
                    updated_count += 1;
                }
                _ => {
                    warn!(question_id = %item.question_id, "skipped unresolvable mapping item");
                    skipped.push(item.question_id);
                }
            }
        }

        debug!(
            subject_id = %subject_id,
            updated_count,
            skipped = skipped.len(),
            "bulk question mapping applied"
        );
        Ok(BulkMappingResult {
            updated_count,
            skipped,
        })
    }

    async fn write_question_mapping(&self, question: &Question) -> Result<()> {
        sqlx::query("UPDATE questions SET textbook_page = ?, chapter_id = ? WHERE id = ?")
            .bind(question.textbook_page)
            .bind(question.chapter_id.map(|id| id.to_string()))
            .bind(question.id.to_string())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Fetch a question by id without creator scoping (bulk resolution)
    async fn fetch_question(&self, question_id: Uuid) -> Result<Option<Question>> {
        let row = sqlx::query(
            r#"
            SELECT id, subject_id, chapter_id, content, options, correct_answer,
                   explanation, textbook_page, order_index, created_at
            FROM questions
            WHERE id = ?
            "#,
        )
        .bind(question_id.to_string())
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(Question::from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::chapter_service::{ChapterCreate, ChapterService};
    use crate::services::question_service::{QuestionCreate, QuestionService};
    use crate::testing::{seed_subject, seed_video, setup_test_db};

    async fn seed_chapter(db: &SqlitePool, subject_id: Uuid, creator_id: Uuid) -> Chapter {
        ChapterService::new(db.clone())
            .create(
                subject_id,
                ChapterCreate {
                    title: "Chapter 1".to_string(),
                    parent_id: None,
                    order_index: 0,
                },
                creator_id,
            )
            .await
            .unwrap()
    }

    async fn seed_question(db: &SqlitePool, subject_id: Uuid, creator_id: Uuid) -> Question {
        QuestionService::new(db.clone())
            .create(
                subject_id,
                QuestionCreate {
                    content: "2 + 2 = ?".to_string(),
                    options: vec!["3".to_string(), "4".to_string()],
                    correct_answer: 1,
                    explanation: None,
                    chapter_id: None,
                    textbook_page: None,
                    order_index: None,
                },
                creator_id,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_chapter_textbook_set_and_clear() {
        let db = setup_test_db().await;
        let fx = seed_subject(&db, "Math").await;
        let chapter = seed_chapter(&db, fx.subject_id, fx.creator_id).await;
        let svc = MappingService::new(db);

        let mapped = svc
            .update_chapter_textbook(chapter.id, Some(42), fx.creator_id)
            .await
            .unwrap();
        assert_eq!(mapped.textbook_page, Some(42));

        let cleared = svc
            .update_chapter_textbook(chapter.id, None, fx.creator_id)
            .await
            .unwrap();
        assert_eq!(cleared.textbook_page, None);
    }

    #[tokio::test]
    async fn test_chapter_video_set_and_clear() {
        let db = setup_test_db().await;
        let fx = seed_subject(&db, "Math").await;
        let chapter = seed_chapter(&db, fx.subject_id, fx.creator_id).await;
        let video_id = seed_video(&db, fx.subject_id).await;
        let svc = MappingService::new(db);

        let mapped = svc
            .update_chapter_video(chapter.id, Some(video_id), Some(90), fx.creator_id)
            .await
            .unwrap();
        assert_eq!(mapped.video_id, Some(video_id));
        assert_eq!(mapped.video_start_seconds, Some(90));

        let cleared = svc
            .update_chapter_video(chapter.id, None, None, fx.creator_id)
            .await
            .unwrap();
        assert_eq!(cleared.video_id, None);
        assert_eq!(cleared.video_start_seconds, None);
    }

    #[tokio::test]
    async fn test_chapter_mapping_requires_ownership() {
        let db = setup_test_db().await;
        let fx = seed_subject(&db, "Math").await;
        let chapter = seed_chapter(&db, fx.subject_id, fx.creator_id).await;
        let svc = MappingService::new(db);

        let err = svc
            .update_chapter_textbook(chapter.id, Some(7), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_question_mapping_set_and_clear() {
        let db = setup_test_db().await;
        let fx = seed_subject(&db, "Math").await;
        let chapter = seed_chapter(&db, fx.subject_id, fx.creator_id).await;
        let question = seed_question(&db, fx.subject_id, fx.creator_id).await;
        let svc = MappingService::new(db);

        let mapped = svc
            .update_question_mapping(
                question.id,
                QuestionMappingUpdate {
                    textbook_page: Some(12),
                    chapter_id: Some(chapter.id),
                },
                fx.creator_id,
            )
            .await
            .unwrap();
        assert_eq!(mapped.textbook_page, Some(12));
        assert_eq!(mapped.chapter_id, Some(chapter.id));

        let cleared = svc
            .update_question_mapping(question.id, QuestionMappingUpdate::default(), fx.creator_id)
            .await
            .unwrap();
        assert_eq!(cleared.textbook_page, None);
        assert_eq!(cleared.chapter_id, None);
    }

    #[tokio::test]
    async fn test_bulk_mapping_skips_unresolvable_items() {
        let db = setup_test_db().await;
        let fx = seed_subject(&db, "Math").await;
        let fx_other = seed_subject(&db, "Physics").await;
        let question = seed_question(&db, fx.subject_id, fx.creator_id).await;
        let foreign = seed_question(&db, fx_other.subject_id, fx_other.creator_id).await;
        let svc = MappingService::new(db);

        let unknown_id = Uuid::new_v4();
        let result = svc
            .bulk_update_question_mapping(
                fx.subject_id,
                vec![
                    QuestionMappingItem {
                        question_id: question.id,
                        textbook_page: Some(5),
                        chapter_id: None,
                    },
                    QuestionMappingItem {
                        question_id: foreign.id,
                        textbook_page: Some(6),
                        chapter_id: None,
                    },
                    QuestionMappingItem {
                        question_id: unknown_id,
                        textbook_page: Some(7),
                        chapter_id: None,
                    },
                ],
                fx.creator_id,
            )
            .await
            .unwrap();

        assert_eq!(result.updated_count, 1);
        assert_eq!(result.skipped, vec![foreign.id, unknown_id]);

        // The cross-subject question was not touched
        let untouched = get_question_for_creator(&svc.db, foreign.id, fx_other.creator_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untouched.textbook_page, None);
    }

    #[tokio::test]
    async fn test_bulk_mapping_single_valid_and_single_cross_subject() {
        let db = setup_test_db().await;
        let fx = seed_subject(&db, "Math").await;
        let fx_other = seed_subject(&db, "Physics").await;
        let question = seed_question(&db, fx.subject_id, fx.creator_id).await;
        let foreign = seed_question(&db, fx_other.subject_id, fx_other.creator_id).await;
        let svc = MappingService::new(db);

        // One valid, one cross-subject: count reflects the partial success,
        // no error is raised.
        let result = svc
            .bulk_update_question_mapping(
                fx.subject_id,
                vec![
                    QuestionMappingItem {
                        question_id: question.id,
                        textbook_page: Some(9),
                        chapter_id: None,
                    },
                    QuestionMappingItem {
                        question_id: foreign.id,
                        textbook_page: Some(9),
                        chapter_id: None,
                    },
                ],
                fx.creator_id,
            )
            .await
            .unwrap();
        assert_eq!(result.updated_count, 1);
    }
}
