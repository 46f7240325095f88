use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{IssueContent, IssueId, IssueSource, IssueSummary, Principal, UserName, VisibilityOracle};
use crate::error::{Result, SemSearchError};

/// An issue as exported from the tracker into issues.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogIssue {
    pub id: IssueId,
    pub project: String,
    #[serde(default)]
    pub tracker_id: u64,
    pub tracker: String,
    pub status: String,
    pub priority: String,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    pub author: UserName,
    #[serde(default)]
    pub assignee: Option<UserName>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub time_entry_notes: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    issues: Vec<CatalogIssue>,
    #[serde(default)]
    principals: Vec<Principal>,
}

/// Read-only issue catalog backed by issues.json.
///
/// Stands in for the tracker: it is both the [`IssueSource`] for indexing
/// and the [`VisibilityOracle`] for search.
#[derive(Debug, Default)]
pub struct IssueCatalog {
    issues: BTreeMap<IssueId, CatalogIssue>,
    principals: Vec<Principal>,
}

impl IssueCatalog {
    /// Load from file if it exists, otherwise an empty catalog
    pub fn load_or_empty(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&content)?;
        Ok(Self::from_parts(file.issues, file.principals))
    }

    pub fn from_parts(issues: Vec<CatalogIssue>, principals: Vec<Principal>) -> Self {
        Self {
            issues: issues.into_iter().map(|issue| (issue.id, issue)).collect(),
            principals,
        }
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn principal(&self, login: &str) -> Result<&Principal> {
        self.principals
            .iter()
            .find(|p| p.login == login)
            .ok_or_else(|| SemSearchError::UnknownPrincipal(login.to_string()))
    }

    fn can_see(principal: &Principal, issue: &CatalogIssue) -> bool {
        if principal.admin {
            return true;
        }
        if !principal.projects.iter().any(|p| p == &issue.project) {
            return false;
        }
        if !issue.is_private {
            return true;
        }
        let is_login = |user: &UserName| user.login.as_deref() == Some(principal.login.as_str());
        is_login(&issue.author) || issue.assignee.as_ref().is_some_and(is_login)
    }
}

impl IssueSource for IssueCatalog {
    fn issue_ids(&self) -> Result<Vec<IssueId>> {
        Ok(self.issues.keys().copied().collect())
    }

    fn content(&self, id: IssueId) -> Result<Option<IssueContent>> {
        Ok(self.issues.get(&id).map(|issue| IssueContent {
            id: issue.id,
            subject: issue.subject.clone(),
            description: issue.description.clone(),
            comments: issue.comments.clone(),
            time_entry_notes: issue.time_entry_notes.clone(),
        }))
    }

    fn summary(&self, id: IssueId) -> Result<Option<IssueSummary>> {
        Ok(self.issues.get(&id).map(|issue| IssueSummary {
            id: issue.id,
            subject: issue.subject.clone(),
            description: issue.description.clone(),
            project_name: issue.project.clone(),
            tracker_id: issue.tracker_id,
            tracker_name: issue.tracker.clone(),
            status_name: issue.status.clone(),
            priority_name: issue.priority.clone(),
            created_on: issue.created_on,
            updated_on: issue.updated_on,
            author: issue.author.clone(),
            assignee: issue.assignee.clone(),
        }))
    }
}

impl VisibilityOracle for IssueCatalog {
    fn visible_ids(
        &self,
        principal: &Principal,
        candidates: &[IssueId],
    ) -> Result<HashSet<IssueId>> {
        Ok(candidates
            .iter()
            .filter_map(|id| self.issues.get(id))
            .filter(|issue| Self::can_see(principal, issue))
            .map(|issue| issue.id)
            .collect())
    }
}
