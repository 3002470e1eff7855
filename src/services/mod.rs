//! Content services
//!
//! Each service owns a handle to the SQLite pool and exposes the operations
//! for one slice of the content model. All subject-scoped operations verify
//! the creator's ownership chain before touching any record.

pub mod chapter_service;
pub mod mapping_service;
pub mod question_service;
pub mod validation_service;

pub use chapter_service::ChapterService;
pub use mapping_service::MappingService;
pub use question_service::QuestionService;
pub use validation_service::ValidationService;

use serde::{Deserialize, Deserializer};

/// Deserialize a patch field that distinguishes "absent" from "set to null":
/// absent stays `None`, `null` becomes `Some(None)`, a value `Some(Some(v))`.
/// Use together with `#[serde(default)]`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
