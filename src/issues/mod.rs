//! Issue data consumed by the indexing and search pipeline.
//!
//! The tracker owns issues, users and permissions; this crate only reads them
//! through [`IssueSource`] and asks [`VisibilityOracle`] who may see what.

pub mod catalog;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use catalog::IssueCatalog;

pub type IssueId = u64;

/// Textual content of an issue, the input to fingerprinting and embedding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueContent {
    pub id: IssueId,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Journal notes in creation order
    #[serde(default)]
    pub comments: Vec<String>,
    /// Time entry comments in creation order
    #[serde(default)]
    pub time_entry_notes: Vec<String>,
}

impl IssueContent {
    /// Comment notes that carry text, in order.
    pub fn present_comments(&self) -> impl Iterator<Item = &str> {
        present(&self.comments)
    }

    /// Time entry notes that carry text, in order.
    pub fn present_time_entry_notes(&self) -> impl Iterator<Item = &str> {
        present(&self.time_entry_notes)
    }
}

fn present(notes: &[String]) -> impl Iterator<Item = &str> {
    notes
        .iter()
        .map(String::as_str)
        .filter(|note| !note.trim().is_empty())
}

/// Name parts of a user as stored by the tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserName {
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
}

/// Read-only display attributes joined into search results.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueSummary {
    pub id: IssueId,
    pub subject: String,
    pub description: Option<String>,
    pub project_name: String,
    pub tracker_id: u64,
    pub tracker_name: String,
    pub status_name: String,
    pub priority_name: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    pub author: UserName,
    pub assignee: Option<UserName>,
}

/// The user a search or sync is performed for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub login: String,
    #[serde(default)]
    pub admin: bool,
    /// Projects the principal is a member of
    #[serde(default)]
    pub projects: Vec<String>,
    /// Granted the "use semantic search" permission in some role
    #[serde(default)]
    pub use_semantic_search: bool,
}

/// Where issues come from.
pub trait IssueSource {
    /// Every issue id known to the tracker, ascending.
    fn issue_ids(&self) -> Result<Vec<IssueId>>;

    fn content(&self, id: IssueId) -> Result<Option<IssueContent>>;

    fn summary(&self, id: IssueId) -> Result<Option<IssueSummary>>;
}

/// Answers "which of these issues may this principal see".
pub trait VisibilityOracle {
    /// Returns the visible subset of `candidates`.
    fn visible_ids(&self, principal: &Principal, candidates: &[IssueId])
        -> Result<HashSet<IssueId>>;
}
