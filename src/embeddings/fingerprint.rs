use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::issues::IssueContent;

/// Lowercase hex SHA-256 of an issue's textual content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint an issue.
///
/// Fields are hashed in a fixed order: subject, description, present comment
/// notes joined by a space, present time entry notes joined by a space. Every
/// field keeps its slot even when blank.
pub fn fingerprint(content: &IssueContent) -> ContentFingerprint {
    let comments = content.present_comments().collect::<Vec<_>>().join(" ");
    let time_notes = content
        .present_time_entry_notes()
        .collect::<Vec<_>>()
        .join(" ");

    let joined = [
        content.subject.as_str(),
        content.description.as_deref().unwrap_or(""),
        comments.as_str(),
        time_notes.as_str(),
    ]
    .join(" ");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    ContentFingerprint(format!("{:x}", hasher.finalize()))
}

/// Text submitted to the embedding model for an issue.
pub fn embedding_text(content: &IssueContent) -> String {
    let comments = content
        .present_comments()
        .map(|note| format!("Comment: {}", note))
        .collect::<Vec<_>>()
        .join("\n");
    let time_notes = content
        .present_time_entry_notes()
        .map(|note| format!("Time entry note: {}", note))
        .collect::<Vec<_>>()
        .join("\n");

    [
        format!("Issue #{} - {}", content.id, content.subject),
        format!(
            "Description: {}",
            content.description.as_deref().unwrap_or("")
        ),
        comments,
        time_notes,
    ]
    .join("\n")
    .trim()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IssueContent {
        IssueContent {
            id: 42,
            subject: "Export crashes".into(),
            description: Some("CSV export throws on empty projects".into()),
            comments: vec![
                "".into(),
                "Reproduced on 5.1".into(),
                "Fixed upstream?".into(),
            ],
            time_entry_notes: vec!["Investigation".into(), "  ".into()],
        }
    }

    fn sha(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    #[test]
    fn test_fingerprint_is_sha256_of_joined_fields() {
        let expected = sha(
            "Export crashes CSV export throws on empty projects Reproduced on 5.1 Fixed upstream? Investigation",
        );
        assert_eq!(fingerprint(&sample()).as_str(), expected);
    }

    #[test]
    fn test_fingerprint_without_notes_keeps_empty_slots() {
        let content = IssueContent {
            id: 1,
            subject: "Subject".into(),
            description: Some("Body".into()),
            ..IssueContent::default()
        };
        assert_eq!(fingerprint(&content).as_str(), sha("Subject Body  "));
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(fingerprint(&sample()), fingerprint(&sample()));
        assert_eq!(fingerprint(&sample()).as_str().len(), 64);
    }

    #[test]
    fn test_any_field_change_changes_fingerprint() {
        let base = fingerprint(&sample());

        let mut changed = sample();
        changed.subject.push('!');
        assert_ne!(fingerprint(&changed), base);

        let mut changed = sample();
        changed.description = None;
        assert_ne!(fingerprint(&changed), base);

        let mut changed = sample();
        changed.comments[2] = "Fixed upstream.".into();
        assert_ne!(fingerprint(&changed), base);

        let mut changed = sample();
        changed.time_entry_notes.push("Review".into());
        assert_ne!(fingerprint(&changed), base);
    }

    #[test]
    fn test_issue_id_does_not_affect_fingerprint() {
        let mut other = sample();
        other.id = 43;
        assert_eq!(fingerprint(&other), fingerprint(&sample()));
    }

    #[test]
    fn test_embedding_text_layout() {
        let text = embedding_text(&sample());
        assert_eq!(
            text,
            "Issue #42 - Export crashes\n\
             Description: CSV export throws on empty projects\n\
             Comment: Reproduced on 5.1\n\
             Comment: Fixed upstream?\n\
             Time entry note: Investigation"
        );
    }

    #[test]
    fn test_embedding_text_trims_missing_notes() {
        let content = IssueContent {
            id: 3,
            subject: "Only subject".into(),
            ..IssueContent::default()
        };
        assert_eq!(
            embedding_text(&content),
            "Issue #3 - Only subject\nDescription:"
        );
    }
}
