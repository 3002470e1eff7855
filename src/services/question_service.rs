//! Question management
//!
//! Multiple-choice questions carry 2-5 answer options and a zero-based
//! correct-answer index. The index is validated against the option list on
//! every write path, bulk items independently with their 1-based list
//! position in the error message, and always before anything is persisted.

use crate::db::models::Question;
use crate::ownership::{get_question_for_creator, verify_subject_ownership};
use crate::services::double_option;
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// Question creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionCreate {
    pub content: String,
    pub options: Vec<String>,
    pub correct_answer: i64,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub chapter_id: Option<Uuid>,
    #[serde(default)]
    pub textbook_page: Option<i64>,
    /// Defaults to 0 for single creates, to the batch position for bulk
    #[serde(default)]
    pub order_index: Option<i64>,
}

/// Partial question update; fields left absent are not touched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionPatch {
    pub content: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub explanation: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub chapter_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub textbook_page: Option<Option<i64>>,
    pub order_index: Option<i64>,
}

/// Per-subject question counts
#[derive(Debug, Clone, Serialize)]
pub struct QuestionStats {
    pub total_count: i64,
    /// Questions with a textbook page mapped
    pub mapped_count: i64,
    pub unmapped_count: i64,
}

/// Check the option-count bound and the correct-answer index
///
/// `position` is the item's 1-based position in a bulk request and prefixes
/// the error message when present.
fn validate_answer(options: &[String], correct_answer: i64, position: Option<usize>) -> Result<()> {
    let reject = |msg: &str| {
        Err(Error::InvalidInput(match position {
            Some(pos) => format!("question {pos}: {msg}"),
            None => msg.to_string(),
        }))
    };

    if options.len() < 2 || options.len() > 5 {
        return reject("a question requires between 2 and 5 options");
    }
    if correct_answer < 0 || correct_answer as usize >= options.len() {
        return reject("correct answer index out of range");
    }
    Ok(())
}

/// Question operations for one database
pub struct QuestionService {
    db: SqlitePool,
}

impl QuestionService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// All questions of a subject ordered by `order_index`
    ///
    /// `mapped_only` filters to questions with (true) or without (false) a
    /// textbook page; `None` returns everything.
    pub async fn get_all_by_subject(
        &self,
        subject_id: Uuid,
        creator_id: Uuid,
        mapped_only: Option<bool>,
    ) -> Result<Vec<Question>> {
        verify_subject_ownership(&self.db, subject_id, creator_id).await?;

        let filter = match mapped_only {
            Some(true) => "AND textbook_page IS NOT NULL",
            Some(false) => "AND textbook_page IS NULL",
            None => "",
        };
        let sql = format!(
            "SELECT id, subject_id, chapter_id, content, options, correct_answer, \
             explanation, textbook_page, order_index, created_at \
             FROM questions WHERE subject_id = ? {filter} ORDER BY order_index",
        );

        let rows = sqlx::query(&sql)
            .bind(subject_id.to_string())
            .fetch_all(&self.db)
            .await?;
        rows.iter().map(Question::from_row).collect()
    }

    /// Fetch one question scoped to the requesting creator
    pub async fn get_by_id(&self, question_id: Uuid, creator_id: Uuid) -> Result<Option<Question>> {
        get_question_for_creator(&self.db, question_id, creator_id).await
    }

    /// Create one question
    pub async fn create(
        &self,
        subject_id: Uuid,
        data: QuestionCreate,
        creator_id: Uuid,
    ) -> Result<Question> {
        verify_subject_ownership(&self.db, subject_id, creator_id).await?;
        validate_answer(&data.options, data.correct_answer, None)?;

        let order_index = data.order_index.unwrap_or(0);
        let question = self.insert(subject_id, &data, order_index).await?;
        debug!(question_id = %question.id, "created question");
        Ok(question)
    }

    /// Create an ordered batch of questions
    ///
    /// Every item is validated up front so a bad item aborts the batch before
    /// anything is written; the error names the offending item's 1-based
    /// position. Items without an `order_index` get their batch position.
    pub async fn bulk_create(
        &self,
        subject_id: Uuid,
        items: Vec<QuestionCreate>,
        creator_id: Uuid,
    ) -> Result<Vec<Question>> {
        verify_subject_ownership(&self.db, subject_id, creator_id).await?;

        for (idx, data) in items.iter().enumerate() {
            validate_answer(&data.options, data.correct_answer, Some(idx + 1))?;
        }

        let mut created = Vec::with_capacity(items.len());
        for (idx, data) in items.iter().enumerate() {
            let order_index = data.order_index.unwrap_or(idx as i64);
            created.push(self.insert(subject_id, data, order_index).await?);
        }
        debug!(subject_id = %subject_id, count = created.len(), "bulk created questions");
        Ok(created)
    }

    /// Apply a partial update to a question
    ///
    /// The correct-answer bound is re-checked against the post-patch option
    /// list, whichever of the two fields changed.
    pub async fn update(
        &self,
        question_id: Uuid,
        patch: QuestionPatch,
        creator_id: Uuid,
    ) -> Result<Question> {
        let mut question = get_question_for_creator(&self.db, question_id, creator_id)
            .await?
            .ok_or_else(|| Error::NotFound("question not found".to_string()))?;

        if let Some(content) = patch.content {
            question.content = content;
        }
        if let Some(options) = patch.options {
            question.options = options;
        }
        if let Some(correct_answer) = patch.correct_answer {
            question.correct_answer = correct_answer;
        }
        if let Some(explanation) = patch.explanation {
            question.explanation = explanation;
        }
        if let Some(chapter_id) = patch.chapter_id {
            question.chapter_id = chapter_id;
        }
        if let Some(textbook_page) = patch.textbook_page {
            question.textbook_page = textbook_page;
        }
        if let Some(order_index) = patch.order_index {
            question.order_index = order_index;
        }

        validate_answer(&question.options, question.correct_answer, None)?;

        sqlx::query(
            r#"
            UPDATE questions
            SET content = ?, options = ?, correct_answer = ?, explanation = ?,
                chapter_id = ?, textbook_page = ?, order_index = ?
            WHERE id = ?
            "#,
        )
        .bind(&question.content)
        .bind(serde_json::to_string(&question.options)?)
        .bind(question.correct_answer)
        .bind(&question.explanation)
        .bind(question.chapter_id.map(|id| id.to_string()))
        .bind(question.textbook_page)
        .bind(question.order_index)
        .bind(question.id.to_string())
        .execute(&self.db)
        .await?;

        Ok(question)
    }

    /// Delete one question (no cascade)
    pub async fn delete(&self, question_id: Uuid, creator_id: Uuid) -> Result<()> {
        let question = get_question_for_creator(&self.db, question_id, creator_id)
            .await?
            .ok_or_else(|| Error::NotFound("question not found".to_string()))?;

        sqlx::query("DELETE FROM questions WHERE id = ?")
            .bind(question.id.to_string())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Total/mapped/unmapped counts for a subject
    pub async fn get_stats(&self, subject_id: Uuid, creator_id: Uuid) -> Result<QuestionStats> {
        verify_subject_ownership(&self.db, subject_id, creator_id).await?;

        let total_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE subject_id = ?")
                .bind(subject_id.to_string())
                .fetch_one(&self.db)
                .await?;
        let mapped_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM questions WHERE subject_id = ? AND textbook_page IS NOT NULL",
        )
        .bind(subject_id.to_string())
        .fetch_one(&self.db)
        .await?;

        Ok(QuestionStats {
            total_count,
            mapped_count,
            unmapped_count: total_count - mapped_count,
        })
    }

    async fn insert(
        &self,
        subject_id: Uuid,
        data: &QuestionCreate,
        order_index: i64,
    ) -> Result<Question> {
        let question = Question {
            id: Uuid::new_v4(),
            subject_id,
            chapter_id: data.chapter_id,
            content: data.content.clone(),
            options: data.options.clone(),
            correct_answer: data.correct_answer,
            explanation: data.explanation.clone(),
            textbook_page: data.textbook_page,
            order_index,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO questions
                (id, subject_id, chapter_id, content, options, correct_answer,
                 explanation, textbook_page, order_index, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(question.id.to_string())
        .bind(question.subject_id.to_string())
        .bind(question.chapter_id.map(|id| id.to_string()))
        .bind(&question.content)
        .bind(serde_json::to_string(&question.options)?)
        .bind(question.correct_answer)
        .bind(&question.explanation)
        .bind(question.textbook_page)
        .bind(question.order_index)
        .bind(question.created_at)
        .execute(&self.db)
        .await?;

        Ok(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_subject, setup_test_db};

    fn spec(content: &str, options: &[&str], correct_answer: i64) -> QuestionCreate {
        QuestionCreate {
            content: content.to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer,
            explanation: None,
            chapter_id: None,
            textbook_page: None,
            order_index: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let db = setup_test_db().await;
        let fx = seed_subject(&db, "Math").await;
        let svc = QuestionService::new(db);

        let created = svc
            .create(fx.subject_id, spec("2 + 2 = ?", &["3", "4", "5"], 1), fx.creator_id)
            .await
            .unwrap();

        let loaded = svc
            .get_by_id(created.id, fx.creator_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.content, "2 + 2 = ?");
        assert_eq!(loaded.options, vec!["3", "4", "5"]);
        assert_eq!(loaded.correct_answer, 1);
    }

    #[tokio::test]
    async fn test_create_rejects_out_of_range_answer() {
        let db = setup_test_db().await;
        let fx = seed_subject(&db, "Math").await;
        let svc = QuestionService::new(db.clone());

        let err = svc
            .create(fx.subject_id, spec("2 + 2 = ?", &["3", "4"], 2), fx.creator_id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = svc
            .create(fx.subject_id, spec("2 + 2 = ?", &["3", "4"], -1), fx.creator_id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // Nothing persisted
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_create_enforces_option_count_bounds() {
        let db = setup_test_db().await;
        let fx = seed_subject(&db, "Math").await;
        let svc = QuestionService::new(db);

        let err = svc
            .create(fx.subject_id, spec("?", &["only"], 0), fx.creator_id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = svc
            .create(
                fx.subject_id,
                spec("?", &["a", "b", "c", "d", "e", "f"], 0),
                fx.creator_id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_update_revalidates_against_new_options() {
        let db = setup_test_db().await;
        let fx = seed_subject(&db, "Math").await;
        let svc = QuestionService::new(db);

        let question = svc
            .create(
                fx.subject_id,
                spec("pick", &["a", "b", "c", "d"], 3),
                fx.creator_id,
            )
            .await
            .unwrap();

        // Shrinking the option list below the current answer index must fail
        let patch = QuestionPatch {
            options: Some(vec!["a".to_string(), "b".to_string()]),
            ..Default::default()
        };
        let err = svc.update(question.id, patch, fx.creator_id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // Shrinking together with a compatible answer index is fine
        let patch = QuestionPatch {
            options: Some(vec!["a".to_string(), "b".to_string()]),
            correct_answer: Some(0),
            ..Default::default()
        };
        let updated = svc.update(question.id, patch, fx.creator_id).await.unwrap();
        assert_eq!(updated.correct_answer, 0);
        assert_eq!(updated.options.len(), 2);
    }

    #[tokio::test]
    async fn test_bulk_create_reports_one_based_position() {
        let db = setup_test_db().await;
        let fx = seed_subject(&db, "Math").await;
        let svc = QuestionService::new(db.clone());

        let err = svc
            .bulk_create(
                fx.subject_id,
                vec![
                    spec("q1", &["a", "b"], 0),
                    spec("q2", &["a", "b"], 5),
                ],
                fx.creator_id,
            )
            .await
            .unwrap_err();
        match err {
            Error::InvalidInput(msg) => assert!(msg.starts_with("question 2:"), "got: {msg}"),
            other => panic!("expected InvalidInput, got {other:?}"),
        }

        // Fail-fast: the valid first item was not persisted either
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_bulk_create_defaults_order_index_to_position() {
        let db = setup_test_db().await;
        let fx = seed_subject(&db, "Math").await;
        let svc = QuestionService::new(db);

        let created = svc
            .bulk_create(
                fx.subject_id,
                vec![
                    spec("q1", &["a", "b"], 0),
                    spec("q2", &["a", "b"], 1),
                    QuestionCreate {
                        order_index: Some(42),
                        ..spec("q3", &["a", "b"], 0)
                    },
                ],
                fx.creator_id,
            )
            .await
            .unwrap();
        assert_eq!(created[0].order_index, 0);
        assert_eq!(created[1].order_index, 1);
        assert_eq!(created[2].order_index, 42);
    }

    #[tokio::test]
    async fn test_mapped_only_filter() {
        let db = setup_test_db().await;
        let fx = seed_subject(&db, "Math").await;
        let svc = QuestionService::new(db);

        svc.create(
            fx.subject_id,
            QuestionCreate {
                textbook_page: Some(12),
                ..spec("mapped", &["a", "b"], 0)
            },
            fx.creator_id,
        )
        .await
        .unwrap();
        svc.create(fx.subject_id, spec("unmapped", &["a", "b"], 0), fx.creator_id)
            .await
            .unwrap();

        let mapped = svc
            .get_all_by_subject(fx.subject_id, fx.creator_id, Some(true))
            .await
            .unwrap();
        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped[0].content, "mapped");

        let unmapped = svc
            .get_all_by_subject(fx.subject_id, fx.creator_id, Some(false))
            .await
            .unwrap();
        assert_eq!(unmapped.len(), 1);
        assert_eq!(unmapped[0].content, "unmapped");

        let all = svc
            .get_all_by_subject(fx.subject_id, fx.creator_id, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_and_stats() {
        let db = setup_test_db().await;
        let fx = seed_subject(&db, "Math").await;
        let svc = QuestionService::new(db);

        let kept = svc
            .create(
                fx.subject_id,
                QuestionCreate {
                    textbook_page: Some(3),
                    ..spec("kept", &["a", "b"], 0)
                },
                fx.creator_id,
            )
            .await
            .unwrap();
        let dropped = svc
            .create(fx.subject_id, spec("dropped", &["a", "b"], 0), fx.creator_id)
            .await
            .unwrap();

        svc.delete(dropped.id, fx.creator_id).await.unwrap();
        assert!(svc.get_by_id(dropped.id, fx.creator_id).await.unwrap().is_none());
        assert!(svc.get_by_id(kept.id, fx.creator_id).await.unwrap().is_some());

        let stats = svc.get_stats(fx.subject_id, fx.creator_id).await.unwrap();
        assert_eq!(stats.total_count, 1);
        assert_eq!(stats.mapped_count, 1);
        assert_eq!(stats.unmapped_count, 0);
    }
}
