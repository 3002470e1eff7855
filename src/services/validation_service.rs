//! Validation engine
//!
//! Stateless coverage reporting over a subject's chapters and questions.
//! Nothing here is persisted: every report is recomputed from the current
//! records. A chapter is complete when both its textbook page and its video
//! reference are mapped; a question only has the textbook axis and therefore
//! never classifies as an error on its own.

use crate::db::models::{Chapter, Question};
use crate::ownership::verify_subject_ownership;
use crate::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Derived coverage classification, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Ok,
    Warning,
    Error,
}

/// Per-chapter coverage line
#[derive(Debug, Clone, Serialize)]
pub struct ChapterValidationItem {
    pub id: Uuid,
    pub title: String,
    pub depth: i64,
    pub has_textbook_mapping: bool,
    pub has_video_mapping: bool,
    pub textbook_page: Option<i64>,
    pub video_start_seconds: Option<i64>,
    pub status: ValidationStatus,
    pub message: Option<String>,
}

/// Per-question coverage line
#[derive(Debug, Clone, Serialize)]
pub struct QuestionValidationItem {
    pub id: Uuid,
    /// Content preview, truncated to 100 characters
    pub content: String,
    pub has_textbook_mapping: bool,
    pub textbook_page: Option<i64>,
    pub status: ValidationStatus,
    pub message: Option<String>,
}

/// Chapter-axis aggregate counts and percentages
#[derive(Debug, Clone, Serialize)]
pub struct ChapterValidationSummary {
    pub total: usize,
    pub with_textbook: usize,
    pub with_video: usize,
    pub ok: usize,
    pub warning: usize,
    pub error: usize,
    pub textbook_percentage: f64,
    pub video_percentage: f64,
}

/// Question-axis aggregate counts and percentages
#[derive(Debug, Clone, Serialize)]
pub struct QuestionValidationSummary {
    pub total: usize,
    pub with_textbook: usize,
    pub ok: usize,
    pub warning: usize,
    pub textbook_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChapterValidationReport {
    pub summary: ChapterValidationSummary,
    pub items: Vec<ChapterValidationItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionValidationReport {
    pub summary: QuestionValidationSummary,
    pub items: Vec<QuestionValidationItem>,
}

/// Combined coverage report for one subject
#[derive(Debug, Clone, Serialize)]
pub struct FullValidationReport {
    pub subject_id: Uuid,
    pub subject_name: String,
    pub chapter_validation: ChapterValidationReport,
    pub question_validation: QuestionValidationReport,
    pub overall_status: ValidationStatus,
    pub completion_percentage: f64,
}

/// Round to one decimal place, ties away from zero
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `round(count / total * 100, 1)`, defined as 0 for an empty total
fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(count as f64 / total as f64 * 100.0)
    }
}

/// Classify one chapter by its two mapping axes
pub fn classify_chapter(chapter: &Chapter) -> (ValidationStatus, Option<String>) {
    let has_textbook = chapter.textbook_page.is_some();
    let has_video = chapter.video_id.is_some();

    match (has_textbook, has_video) {
        (true, true) => (ValidationStatus::Ok, None),
        (false, true) => (
            ValidationStatus::Warning,
            Some("textbook mapping missing".to_string()),
        ),
        (true, false) => (
            ValidationStatus::Warning,
            Some("video mapping missing".to_string()),
        ),
        (false, false) => (
            ValidationStatus::Error,
            Some("both textbook and video mapping missing".to_string()),
        ),
    }
}

/// Classify one question; the textbook axis is the only one checked
pub fn classify_question(question: &Question) -> (ValidationStatus, Option<String>) {
    if question.textbook_page.is_some() {
        (ValidationStatus::Ok, None)
    } else {
        (
            ValidationStatus::Warning,
            Some("textbook mapping missing".to_string()),
        )
    }
}

/// Build the chapter-axis report from the current chapter rows
pub fn build_chapter_report(chapters: &[Chapter]) -> ChapterValidationReport {
    let mut summary = ChapterValidationSummary {
        total: chapters.len(),
        with_textbook: 0,
        with_video: 0,
        ok: 0,
        warning: 0,
        error: 0,
        textbook_percentage: 0.0,
        video_percentage: 0.0,
    };

    let items = chapters
        .iter()
        .map(|chapter| {
            let has_textbook = chapter.textbook_page.is_some();
            let has_video = chapter.video_id.is_some();
            if has_textbook {
                summary.with_textbook += 1;
            }
            if has_video {
                summary.with_video += 1;
            }

            let (status, message) = classify_chapter(chapter);
            match status {
                ValidationStatus::Ok => summary.ok += 1,
                ValidationStatus::Warning => summary.warning += 1,
                ValidationStatus::Error => summary.error += 1,
            }

            ChapterValidationItem {
                id: chapter.id,
                title: chapter.title.clone(),
                depth: chapter.depth,
                has_textbook_mapping: has_textbook,
                has_video_mapping: has_video,
                textbook_page: chapter.textbook_page,
                video_start_seconds: chapter.video_start_seconds,
                status,
                message,
            }
        })
        .collect();

    summary.textbook_percentage = percentage(summary.with_textbook, summary.total);
    summary.video_percentage = percentage(summary.with_video, summary.total);

    ChapterValidationReport { summary, items }
}

/// Build the question-axis report from the current question rows
pub fn build_question_report(questions: &[Question]) -> QuestionValidationReport {
    let mut summary = QuestionValidationSummary {
        total: questions.len(),
        with_textbook: 0,
        ok: 0,
        warning: 0,
        textbook_percentage: 0.0,
    };

    let items = questions
        .iter()
        .map(|question| {
            let has_textbook = question.textbook_page.is_some();
            if has_textbook {
                summary.with_textbook += 1;
            }

            let (status, message) = classify_question(question);
            match status {
                ValidationStatus::Ok => summary.ok += 1,
                _ => summary.warning += 1,
            }

            QuestionValidationItem {
                id: question.id,
                content: content_preview(&question.content),
                has_textbook_mapping: has_textbook,
                textbook_page: question.textbook_page,
                status,
                message,
            }
        })
        .collect();

    summary.textbook_percentage = percentage(summary.with_textbook, summary.total);

    QuestionValidationReport { summary, items }
}

/// Truncate question content to a 100-character preview
fn content_preview(content: &str) -> String {
    if content.chars().count() > 100 {
        let preview: String = content.chars().take(100).collect();
        format!("{preview}...")
    } else {
        content.to_string()
    }
}

/// Compute the overall subject status from the per-axis OK counts
///
/// An empty subject is never complete: 0 items classify as an error at 0%.
/// Otherwise completion >= 100 is ok, >= 50 a warning, anything below an
/// error. Questions never contribute errors of their own, so the aggregate
/// is weighted toward chapter completeness.
pub fn overall_status(total: usize, ok: usize) -> (ValidationStatus, f64) {
    if total == 0 {
        return (ValidationStatus::Error, 0.0);
    }
    let completion = percentage(ok, total);
    let status = if completion >= 100.0 {
        ValidationStatus::Ok
    } else if completion >= 50.0 {
        ValidationStatus::Warning
    } else {
        ValidationStatus::Error
    };
    (status, completion)
}

/// Coverage reporting for one database
pub struct ValidationService {
    db: SqlitePool,
}

impl ValidationService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Chapter-axis coverage report for a subject
    pub async fn validate_chapters(
        &self,
        subject_id: Uuid,
        creator_id: Uuid,
    ) -> Result<ChapterValidationReport> {
        verify_subject_ownership(&self.db, subject_id, creator_id).await?;
        let chapters = self.fetch_chapters(subject_id).await?;
        Ok(build_chapter_report(&chapters))
    }

    /// Question-axis coverage report for a subject
    pub async fn validate_questions(
        &self,
        subject_id: Uuid,
        creator_id: Uuid,
    ) -> Result<QuestionValidationReport> {
        verify_subject_ownership(&self.db, subject_id, creator_id).await?;
        let questions = self.fetch_questions(subject_id).await?;
        Ok(build_question_report(&questions))
    }

    /// Combined report with the overall completion status
    pub async fn validate_full(
        &self,
        subject_id: Uuid,
        creator_id: Uuid,
    ) -> Result<FullValidationReport> {
        let subject = verify_subject_ownership(&self.db, subject_id, creator_id).await?;

        let chapter_validation = self.validate_chapters(subject_id, creator_id).await?;
        let question_validation = self.validate_questions(subject_id, creator_id).await?;

        let total = chapter_validation.summary.total + question_validation.summary.total;
        let ok = chapter_validation.summary.ok + question_validation.summary.ok;
        let (overall, completion_percentage) = overall_status(total, ok);

        Ok(FullValidationReport {
            subject_id,
            subject_name: subject.name,
            chapter_validation,
            question_validation,
            overall_status: overall,
            completion_percentage,
        })
    }

    async fn fetch_chapters(&self, subject_id: Uuid) -> Result<Vec<Chapter>> {
        let rows = sqlx::query(
            r#"
            SELECT id, subject_id, parent_id, title, order_index, depth,
                   textbook_page, video_id, video_start_seconds, created_at
            FROM chapters
            WHERE subject_id = ?
            ORDER BY depth, order_index
            "#,
        )
        .bind(subject_id.to_string())
        .fetch_all(&self.db)
        .await?;
        rows.iter().map(Chapter::from_row).collect()
    }

    async fn fetch_questions(&self, subject_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query(
            r#"
            SELECT id, subject_id, chapter_id, content, options, correct_answer,
                   explanation, textbook_page, order_index, created_at
            FROM questions
            WHERE subject_id = ?
            ORDER BY order_index
            "#,
        )
        .bind(subject_id.to_string())
        .fetch_all(&self.db)
        .await?;
        rows.iter().map(Question::from_row).collect()
    }
}
