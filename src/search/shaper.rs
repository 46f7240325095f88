use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::issues::{IssueId, IssueSummary, Principal, VisibilityOracle};

/// One nearest-neighbour row with its joined display attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    pub issue_id: IssueId,
    pub subject: String,
    pub description: Option<String>,
    pub project_name: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    pub tracker_id: u64,
    pub tracker_name: String,
    pub status_name: String,
    pub priority_name: String,
    pub author_firstname: Option<String>,
    pub author_lastname: Option<String>,
    pub author_login: Option<String>,
    pub assigned_to_firstname: Option<String>,
    pub assigned_to_lastname: Option<String>,
    pub assigned_to_login: Option<String>,
    pub distance: f64,
}

impl RawResult {
    pub fn joined(summary: IssueSummary, distance: f64) -> Self {
        let assignee = summary.assignee.unwrap_or_default();
        Self {
            issue_id: summary.id,
            subject: summary.subject,
            description: summary.description,
            project_name: summary.project_name,
            created_on: summary.created_on,
            updated_on: summary.updated_on,
            tracker_id: summary.tracker_id,
            tracker_name: summary.tracker_name,
            status_name: summary.status_name,
            priority_name: summary.priority_name,
            author_firstname: summary.author.firstname,
            author_lastname: summary.author.lastname,
            author_login: summary.author.login,
            assigned_to_firstname: assignee.firstname,
            assigned_to_lastname: assignee.lastname,
            assigned_to_login: assignee.login,
            distance,
        }
    }
}

/// A search hit ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayResult {
    pub issue_id: IssueId,
    pub subject: String,
    pub description: Option<String>,
    pub project_name: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    pub tracker_id: u64,
    pub tracker_name: String,
    pub status_name: String,
    pub priority_name: String,
    pub author_name: String,
    /// `None` when the issue is unassigned
    pub assigned_to_name: Option<String>,
    pub similarity_score: f64,
}

fn full_name(first: Option<&str>, last: Option<&str>) -> String {
    format!("{} {}", first.unwrap_or(""), last.unwrap_or(""))
        .trim()
        .to_string()
}

/// "first last", or the login when both name parts are blank.
///
/// Every issue has an author, so this is never absent. An author with no name
/// parts and no login shapes to the empty string, which is what text and JSON
/// output show for it.
pub fn author_name(first: Option<&str>, last: Option<&str>, login: Option<&str>) -> String {
    let name = full_name(first, last);
    if name.is_empty() {
        login.unwrap_or_default().to_string()
    } else {
        name
    }
}

/// Like [`author_name`], but `None` when there is no assignee at all.
pub fn assignee_name(first: Option<&str>, last: Option<&str>, login: Option<&str>) -> Option<String> {
    if first.is_none() && last.is_none() && login.is_none() {
        return None;
    }
    let name = full_name(first, last);
    if name.is_empty() {
        login.map(str::to_string)
    } else {
        Some(name)
    }
}

/// Maps a distance in `[0, inf)` to a score in `(0, 1]`; distance 0 scores 1.
pub fn similarity_score(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

/// Shape a single row. Name parts and the raw distance do not survive.
pub fn shape_row(raw: RawResult) -> DisplayResult {
    DisplayResult {
        author_name: author_name(
            raw.author_firstname.as_deref(),
            raw.author_lastname.as_deref(),
            raw.author_login.as_deref(),
        ),
        assigned_to_name: assignee_name(
            raw.assigned_to_firstname.as_deref(),
            raw.assigned_to_lastname.as_deref(),
            raw.assigned_to_login.as_deref(),
        ),
        similarity_score: similarity_score(raw.distance),
        issue_id: raw.issue_id,
        subject: raw.subject,
        description: raw.description,
        project_name: raw.project_name,
        created_on: raw.created_on,
        updated_on: raw.updated_on,
        tracker_id: raw.tracker_id,
        tracker_name: raw.tracker_name,
        status_name: raw.status_name,
        priority_name: raw.priority_name,
    }
}

/// Shape every row and drop the ones `principal` may not see.
///
/// The oracle is asked about exactly the ids in `raw`. Input order is kept, so
/// results stay sorted by distance; a restrictive principal can get fewer
/// rows than were found.
pub fn shape<V>(raw: Vec<RawResult>, principal: &Principal, oracle: &V) -> Result<Vec<DisplayResult>>
where
    V: VisibilityOracle + ?Sized,
{
    let shaped: Vec<DisplayResult> = raw.into_iter().map(shape_row).collect();
    if shaped.is_empty() {
        return Ok(shaped);
    }

    let candidates: Vec<IssueId> = shaped.iter().map(|r| r.issue_id).collect();
    let visible = oracle.visible_ids(principal, &candidates)?;

    Ok(shaped
        .into_iter()
        .filter(|r| visible.contains(&r.issue_id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FixedOracle {
        visible: HashSet<IssueId>,
        asked: Mutex<Vec<Vec<IssueId>>>,
    }

    impl FixedOracle {
        fn new(visible: &[IssueId]) -> Self {
            Self {
                visible: visible.iter().copied().collect(),
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    impl VisibilityOracle for FixedOracle {
        fn visible_ids(
            &self,
            _principal: &Principal,
            candidates: &[IssueId],
        ) -> Result<HashSet<IssueId>> {
            self.asked.lock().unwrap().push(candidates.to_vec());
            Ok(candidates
                .iter()
                .filter(|id| self.visible.contains(id))
                .copied()
                .collect())
        }
    }

    fn principal() -> Principal {
        Principal {
            login: "bob".into(),
            admin: false,
            projects: vec!["web".into()],
            use_semantic_search: true,
        }
    }

    fn raw(issue_id: IssueId, distance: f64) -> RawResult {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        RawResult {
            issue_id,
            subject: format!("Issue {}", issue_id),
            description: None,
            project_name: "web".into(),
            created_on: ts,
            updated_on: ts,
            tracker_id: 1,
            tracker_name: "Bug".into(),
            status_name: "New".into(),
            priority_name: "Normal".into(),
            author_firstname: Some("Ada".into()),
            author_lastname: Some("Lovelace".into()),
            author_login: Some("ada".into()),
            assigned_to_firstname: None,
            assigned_to_lastname: None,
            assigned_to_login: None,
            distance,
        }
    }

    #[test]
    fn test_author_name_joins_parts() {
        assert_eq!(author_name(Some("Ada"), Some("Lovelace"), Some("ada")), "Ada Lovelace");
        assert_eq!(author_name(Some("Ada"), None, Some("ada")), "Ada");
        assert_eq!(author_name(Some(""), Some("Lovelace"), None), "Lovelace");
    }

    #[test]
    fn test_author_falls_back_to_login() {
        assert_eq!(author_name(Some(""), Some(""), Some("jdoe")), "jdoe");
        assert_eq!(author_name(None, Some("  "), Some("jdoe")), "jdoe");
    }

    #[test]
    fn test_author_without_name_or_login_is_empty_string() {
        assert_eq!(author_name(None, None, None), "");
        assert_eq!(author_name(Some(" "), None, None), "");

        let mut row = raw(1, 0.0);
        row.author_firstname = None;
        row.author_lastname = None;
        row.author_login = None;
        let shaped = shape_row(row);
        assert_eq!(shaped.author_name, "");
        assert_eq!(serde_json::to_value(&shaped).unwrap()["author_name"], "");
    }

    #[test]
    fn test_assignee_absent_is_none() {
        assert_eq!(assignee_name(None, None, None), None);
    }

    #[test]
    fn test_assignee_rules() {
        assert_eq!(
            assignee_name(Some("Grace"), Some("Hopper"), Some("grace")),
            Some("Grace Hopper".to_string())
        );
        assert_eq!(
            assignee_name(Some(""), None, Some("grace")),
            Some("grace".to_string())
        );
        // Present but nameless, no login
        assert_eq!(assignee_name(Some(""), Some(""), None), None);
    }

    #[test]
    fn test_similarity_score_range() {
        assert_eq!(similarity_score(0.0), 1.0);
        let mut previous = similarity_score(0.0);
        for d in [0.001, 0.5, 1.0, 3.0, 10.0, 1e6] {
            let score = similarity_score(d);
            assert!(score > 0.0 && score <= 1.0);
            assert!(score < previous);
            previous = score;
        }
        assert_eq!(similarity_score(1.0), 0.5);
    }

    #[test]
    fn test_shape_row_drops_temporary_fields() {
        let mut row = raw(4, 3.0);
        row.author_firstname = Some("".into());
        row.author_lastname = Some("".into());
        row.author_login = Some("jdoe".into());

        let shaped = shape_row(row);
        assert_eq!(shaped.author_name, "jdoe");
        assert_eq!(shaped.assigned_to_name, None);
        assert_eq!(shaped.similarity_score, 0.25);

        let json = serde_json::to_value(&shaped).unwrap();
        for removed in ["author_login", "author_firstname", "assigned_to_login", "distance"] {
            assert!(json.get(removed).is_none(), "{} should be gone", removed);
        }
        assert!(json.get("assigned_to_name").unwrap().is_null());
    }

    #[test]
    fn test_visibility_under_fill_keeps_distance_order() {
        let rows: Vec<RawResult> = (1..=10).map(|id| raw(id, id as f64 * 0.1)).collect();
        let oracle = FixedOracle::new(&[9, 2, 5]);

        let results = shape(rows, &principal(), &oracle).unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.issue_id).collect();
        assert_eq!(ids, vec![2, 5, 9]);
        assert!(results[0].similarity_score > results[1].similarity_score);
        assert!(results[1].similarity_score > results[2].similarity_score);
    }

    #[test]
    fn test_oracle_is_asked_about_exact_candidates() {
        let rows = vec![raw(8, 0.2), raw(3, 0.4), raw(11, 0.9)];
        let oracle = FixedOracle::new(&[3]);

        shape(rows, &principal(), &oracle).unwrap();
        assert_eq!(*oracle.asked.lock().unwrap(), vec![vec![8, 3, 11]]);
    }

    #[test]
    fn test_empty_input_skips_oracle() {
        let oracle = FixedOracle::new(&[]);
        assert!(shape(Vec::new(), &principal(), &oracle).unwrap().is_empty());
        assert!(oracle.asked.lock().unwrap().is_empty());
    }
}
