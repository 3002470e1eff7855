//! # Certforge Content Core
//!
//! Content-management core for a certification-exam learning platform:
//! - Hierarchical chapter trees per subject (derived depth, cascading delete)
//! - Multiple-choice question management with answer-index validation
//! - Textbook-page and video-timestamp mapping, single and bulk
//! - Coverage validation reports (per chapter, per question, per subject)
//!
//! Everything is creator-scoped through the ownership chain
//! subject -> certificate -> creator. The crate is an in-process library:
//! the HTTP layer, authentication, and file storage live elsewhere and call
//! into these services with a `sqlx::SqlitePool`.

pub mod config;
pub mod db;
pub mod error;
pub mod ownership;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
