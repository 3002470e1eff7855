//! Chapter tree engine
//!
//! Chapters form a tree per subject, persisted as parent references plus a
//! derived `depth` column. The tree shape is rebuilt on read: the flat
//! `(depth, order_index)` ordering feeds a two-pass index-then-link assembly,
//! and every level is sorted by `order_index`. Deletion is an explicit
//! depth-first cascade rather than a database-level one, so it stays portable
//! across storage choices.

use crate::db::models::{parse_uuid, Chapter};
use crate::ownership::{get_chapter_for_creator, verify_subject_ownership};
use crate::services::double_option;
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

/// Chapter creation request
///
/// Depth is always computed server-side from `parent_id`; there is no way
/// for a client to supply one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterCreate {
    pub title: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub order_index: i64,
}

/// Partial chapter update; fields left absent are not touched
///
/// `parent_id` is tri-state: absent keeps the current parent, an explicit
/// null moves the chapter to the top level, a value re-parents it. Whenever
/// it is present the depth is recomputed before the write.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChapterPatch {
    pub title: Option<String>,
    pub order_index: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<Uuid>>,
}

/// A chapter with its ordered children, as assembled by [`build_tree`]
#[derive(Debug, Clone, Serialize)]
pub struct ChapterTreeNode {
    #[serde(flatten)]
    pub chapter: Chapter,
    pub children: Vec<ChapterTreeNode>,
}

/// Convert a flat chapter list into a nested tree
///
/// Two passes: first index every node and attach it to its parent's child
/// list when the parent resolves within the input (nodes with a dangling
/// parent reference fall back to the root list), then sort the root list and
/// every child list by `order_index`. The two-pass shape is required because
/// a parent may appear before or after its children in the flat input.
pub fn build_tree(chapters: Vec<Chapter>) -> Vec<ChapterTreeNode> {
    let known_ids: HashSet<Uuid> = chapters.iter().map(|c| c.id).collect();

    let mut children_of: HashMap<Uuid, Vec<Chapter>> = HashMap::new();
    let mut roots: Vec<Chapter> = Vec::new();
    for chapter in chapters {
        match chapter.parent_id {
            Some(parent_id) if known_ids.contains(&parent_id) => {
                children_of.entry(parent_id).or_default().push(chapter);
            }
            _ => roots.push(chapter),
        }
    }

    fn attach(chapter: Chapter, children_of: &mut HashMap<Uuid, Vec<Chapter>>) -> ChapterTreeNode {
        let mut children: Vec<Chapter> = children_of.remove(&chapter.id).unwrap_or_default();
        children.sort_by_key(|c| c.order_index);
        let children = children
            .into_iter()
            .map(|c| attach(c, children_of))
            .collect();
        ChapterTreeNode { chapter, children }
    }

    roots.sort_by_key(|c| c.order_index);
    roots
        .into_iter()
        .map(|c| attach(c, &mut children_of))
        .collect()
}

/// Chapter tree operations for one database
pub struct ChapterService {
    db: SqlitePool,
}

impl ChapterService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// All chapters of a subject, ordered by `(depth, order_index)`
    pub async fn get_all_by_subject(
        &self,
        subject_id: Uuid,
        creator_id: Uuid,
    ) -> Result<Vec<Chapter>> {
        verify_subject_ownership(&self.db, subject_id, creator_id).await?;

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

    /// All chapters of a subject as a nested tree
    pub async fn get_tree_by_subject(
        &self,
        subject_id: Uuid,
        creator_id: Uuid,
    ) -> Result<Vec<ChapterTreeNode>> {
        let chapters = self.get_all_by_subject(subject_id, creator_id).await?;
        Ok(build_tree(chapters))
    }

    /// Fetch one chapter scoped to the requesting creator
    pub async fn get_by_id(&self, chapter_id: Uuid, creator_id: Uuid) -> Result<Option<Chapter>> {
        get_chapter_for_creator(&self.db, chapter_id, creator_id).await
    }

    /// Compute the depth a chapter gets under the given parent
    ///
    /// No parent means depth 0. An unresolved parent id also yields 0: this
    /// is a lenient fallback, callers needing strictness must pre-validate
    /// parent existence (as [`ChapterService::create`] does).
    pub async fn calculate_depth(&self, parent_id: Option<Uuid>) -> Result<i64> {
        let Some(parent_id) = parent_id else {
            return Ok(0);
        };
        match self.fetch_chapter(parent_id).await? {
            Some(parent) => Ok(parent.depth + 1),
            None => Ok(0),
        }
    }

    /// Create one chapter
    ///
    /// A supplied parent must exist and belong to the same subject, otherwise
    /// the request is rejected before anything is written.
    pub async fn create(
        &self,
        subject_id: Uuid,
        data: ChapterCreate,
        creator_id: Uuid,
    ) -> Result<Chapter> {
        verify_subject_ownership(&self.db, subject_id, creator_id).await?;

        if let Some(parent_id) = data.parent_id {
            self.check_parent(parent_id, subject_id).await?;
        }

        let depth = self.calculate_depth(data.parent_id).await?;
        let chapter = self.insert(subject_id, &data, depth).await?;
        debug!(chapter_id = %chapter.id, depth, "created chapter");
        Ok(chapter)
    }

    /// Create an ordered batch of chapters
    ///
    /// Items are inserted sequentially in list order with the depth computed
    /// per item at insert time. A parent reference into the same batch
    /// therefore only resolves when the parent precedes the child; otherwise
    /// the item lands at depth 0 like any other unresolved parent.
    pub async fn bulk_create(
        &self,
        subject_id: Uuid,
        items: Vec<ChapterCreate>,
        creator_id: Uuid,
    ) -> Result<Vec<Chapter>> {
        verify_subject_ownership(&self.db, subject_id, creator_id).await?;

        let mut created = Vec::with_capacity(items.len());
        for data in &items {
            let depth = self.calculate_depth(data.parent_id).await?;
            created.push(self.insert(subject_id, data, depth).await?);
        }
        debug!(subject_id = %subject_id, count = created.len(), "bulk created chapters");
        Ok(created)
    }

    /// Apply a partial update to a chapter
    ///
    /// A parent change recomputes the depth of this chapter only; descendant
    /// depths are left as stored until each is re-parented in turn.
    pub async fn update(
        &self,
        chapter_id: Uuid,
        patch: ChapterPatch,
        creator_id: Uuid,
    ) -> Result<Chapter> {
        let mut chapter = get_chapter_for_creator(&self.db, chapter_id, creator_id)
            .await?
            .ok_or_else(|| Error::NotFound("chapter not found".to_string()))?;

        if let Some(title) = patch.title {
            chapter.title = title;
        }
        if let Some(order_index) = patch.order_index {
            chapter.order_index = order_index;
        }
        if let Some(new_parent) = patch.parent_id {
            if let Some(parent_id) = new_parent {
                self.check_parent(parent_id, chapter.subject_id).await?;
            }
            chapter.depth = self.calculate_depth(new_parent).await?;
            chapter.parent_id = new_parent;
        }

        sqlx::query(
            "UPDATE chapters SET title = ?, order_index = ?, parent_id = ?, depth = ? WHERE id = ?",
        )
        .bind(&chapter.title)
        .bind(chapter.order_index)
        .bind(chapter.parent_id.map(|id| id.to_string()))
        .bind(chapter.depth)
        .bind(chapter.id.to_string())
        .execute(&self.db)
        .await?;

        Ok(chapter)
    }

    /// Delete a chapter together with its entire descendant subtree
    ///
    /// Descendants are removed depth-first, children before their parent.
    /// Each row is deleted with its own statement; a gateway fault mid-cascade
    /// leaves the already-deleted rows gone (no rollback).
    pub async fn delete(&self, chapter_id: Uuid, creator_id: Uuid) -> Result<()> {
        let chapter = get_chapter_for_creator(&self.db, chapter_id, creator_id)
            .await?
            .ok_or_else(|| Error::NotFound("chapter not found".to_string()))?;

        let subtree = self.collect_subtree(chapter.id).await?;
        for id in subtree.iter().rev() {
            sqlx::query("DELETE FROM chapters WHERE id = ?")
                .bind(id.to_string())
                .execute(&self.db)
                .await?;
        }

        debug!(chapter_id = %chapter.id, removed = subtree.len(), "deleted chapter subtree");
        Ok(())
    }

    /// Pre-order id list of a chapter and all its transitive descendants
    async fn collect_subtree(&self, root: Uuid) -> Result<Vec<Uuid>> {
        let mut stack = vec![root];
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        while let Some(id) = stack.pop() {
            // A cyclic parent reference must not keep the traversal alive
            if !seen.insert(id) {
                continue;
            }
            ordered.push(id);
            let children: Vec<String> =
                sqlx::query_scalar("SELECT id FROM chapters WHERE parent_id = ?")
                    .bind(id.to_string())
                    .fetch_all(&self.db)
                    .await?;
            for child in children {
                stack.push(parse_uuid(&child)?);
            }
        }
        Ok(ordered)
    }

    /// Reject a parent that does not exist or lives in another subject
    async fn check_parent(&self, parent_id: Uuid, subject_id: Uuid) -> Result<()> {
        match self.fetch_chapter(parent_id).await? {
            Some(parent) if parent.subject_id == subject_id => Ok(()),
            _ => Err(Error::InvalidInput("invalid parent chapter".to_string())),
        }
    }

    /// Fetch a chapter by id without creator scoping (internal lookups)
    async fn fetch_chapter(&self, chapter_id: Uuid) -> Result<Option<Chapter>> {
        let row = sqlx::query(
            r#"
            SELECT id, subject_id, parent_id, title, order_index, depth,
                   textbook_page, video_id, video_start_seconds, created_at
            FROM chapters
            WHERE id = ?
            "#,
        )
        .bind(chapter_id.to_string())
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(Chapter::from_row).transpose()
    }

    async fn insert(&self, subject_id: Uuid, data: &ChapterCreate, depth: i64) -> Result<Chapter> {
        let chapter = Chapter {
            id: Uuid::new_v4(),
            subject_id,
            parent_id: data.parent_id,
            title: data.title.clone(),
            order_index: data.order_index,
            depth,
            textbook_page: None,
            video_id: None,
            video_start_seconds: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO chapters
                (id, subject_id, parent_id, title, order_index, depth,
                 textbook_page, video_id, video_start_seconds, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(chapter.id.to_string())
        .bind(chapter.subject_id.to_string())
        .bind(chapter.parent_id.map(|id| id.to_string()))
        .bind(&chapter.title)
        .bind(chapter.order_index)
        .bind(chapter.depth)
        .bind(chapter.textbook_page)
        .bind(chapter.video_id.map(|id| id.to_string()))
        .bind(chapter.video_start_seconds)
        .bind(chapter.created_at)
        .execute(&self.db)
        .await?;

        Ok(chapter)
    }
}
