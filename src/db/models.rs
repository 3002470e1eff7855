//! Persisted record models
//!
//! Identifiers are stored as UUID text columns and parsed back on read, so
//! every model conversion goes through [`parse_uuid`]. Question options are a
//! JSON text column holding an array of 2-5 answer strings.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

/// Subject record (authorization root for all content operations)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub certificate_id: Uuid,
    pub name: String,
    pub order_index: i64,
    pub created_at: DateTime<Utc>,
}

/// Chapter record: one node of a subject's hierarchical table of contents
///
/// `depth` is derived from the parent chain and never set by a client:
/// `depth == 0` iff `parent_id` is absent, otherwise `parent.depth + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub title: String,
    pub order_index: i64,
    pub depth: i64,
    pub textbook_page: Option<i64>,
    pub video_id: Option<Uuid>,
    pub video_start_seconds: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Multiple-choice question record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub chapter_id: Option<Uuid>,
    pub content: String,
    /// Ordered answer options (2-5 entries)
    pub options: Vec<String>,
    /// Zero-based index into `options`
    pub correct_answer: i64,
    pub explanation: Option<String>,
    pub textbook_page: Option<i64>,
    pub order_index: i64,
    pub created_at: DateTime<Utc>,
}

/// Parse a UUID text column value
pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("invalid UUID in database: {e}")))
}

/// Parse an optional UUID text column value
pub(crate) fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
    s.as_deref().map(parse_uuid).transpose()
}

impl Subject {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&row.try_get::<String, _>("id")?)?,
            certificate_id: parse_uuid(&row.try_get::<String, _>("certificate_id")?)?,
            name: row.try_get("name")?,
            order_index: row.try_get("order_index")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl Chapter {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&row.try_get::<String, _>("id")?)?,
            subject_id: parse_uuid(&row.try_get::<String, _>("subject_id")?)?,
            parent_id: parse_opt_uuid(row.try_get("parent_id")?)?,
            title: row.try_get("title")?,
            order_index: row.try_get("order_index")?,
            depth: row.try_get("depth")?,
            textbook_page: row.try_get("textbook_page")?,
            video_id: parse_opt_uuid(row.try_get("video_id")?)?,
            video_start_seconds: row.try_get("video_start_seconds")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl Question {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        let options_json: String = row.try_get("options")?;
        Ok(Self {
            id: parse_uuid(&row.try_get::<String, _>("id")?)?,
            subject_id: parse_uuid(&row.try_get::<String, _>("subject_id")?)?,
            chapter_id: parse_opt_uuid(row.try_get("chapter_id")?)?,
            content: row.try_get("content")?,
            options: serde_json::from_str(&options_json)?,
            correct_answer: row.try_get("correct_answer")?,
            explanation: row.try_get("explanation")?,
            textbook_page: row.try_get("textbook_page")?,
            order_index: row.try_get("order_index")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
